pub mod builtin;
pub mod op;
pub mod shape;
pub mod types;

use std::collections::HashMap;

use tracing::debug;

pub use op::{GpuExecution, GpuKernelSource, HostKernel, LaunchExtent, OpDescriptor};
pub use shape::ShapeResolver;
pub use types::{OpError, TensorAny};

/// Register a built-in operation with the inventory system
#[macro_export]
macro_rules! register_op {
    ($builder:path) => {
        inventory::submit! {
            $crate::OpFactory { build: $builder }
        }
    };
}

/// Wrapper for op factory functions
pub struct OpFactory {
    pub build: fn() -> OpDescriptor,
}

// Collect all built-in ops
inventory::collect!(OpFactory);

/// Holds registered operations keyed by unique name.
///
/// An explicit object, owned by whichever execution context wants it — no
/// hidden process-global state, so tests can build isolated registries.
/// Registration is all-or-nothing and there is no unregistration path.
pub struct OpRegistry {
    map: HashMap<&'static str, OpDescriptor>,
}

impl OpRegistry {
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    /// Registry preloaded with the built-in operations.
    pub fn with_builtins() -> Result<Self, OpError> {
        let mut reg = Self::new();
        reg.collect_inventory()?;
        Ok(reg)
    }

    /// Register every op submitted through [`register_op!`].
    pub fn collect_inventory(&mut self) -> Result<(), OpError> {
        for factory in inventory::iter::<OpFactory> {
            self.register((factory.build)())?;
        }
        Ok(())
    }

    /// Register a new operation under its unique name.
    ///
    /// A duplicate name is a configuration error — the existing registration
    /// is left untouched, whatever backend capabilities either side carries.
    pub fn register(&mut self, desc: OpDescriptor) -> Result<(), OpError> {
        let name = desc.name();
        if self.map.contains_key(name) {
            return Err(OpError::Duplicate(name.to_string()));
        }
        debug!(op = name, "registered operation");
        self.map.insert(name, desc);
        Ok(())
    }

    /// Lookup by name; a miss is an `UnknownOp` error.
    pub fn get(&self, name: &str) -> Result<&OpDescriptor, OpError> {
        self.map
            .get(name)
            .ok_or_else(|| OpError::UnknownOp(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.map.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for OpRegistry {
    fn default() -> Self {
        Self::new()
    }
}
