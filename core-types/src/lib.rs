mod views;

use std::fmt;

include!("generated_data_types.rs");

pub use views::{HostBufferMut, HostBufferRef};

/// Type alias for a buffer identifier
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);
impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferId({})", self.0)
    }
}

/// Maximum number of dimensions for a view descriptor
pub const MAX_DIMS: usize = 8;

/// Descriptor for a view into a buffer
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq, Eq)]
pub struct ViewDescriptor {
    pub offset:  u32,
    pub ndim:    u32,
    pub shape:   [u32; MAX_DIMS],
    pub strides: [u32; MAX_DIMS],
}

/// Execution target for an operation's kernel
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Backend {
    Cpu,
    Gpu,
}
impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Cpu => write!(f, "cpu"),
            Backend::Gpu => write!(f, "gpu"),
        }
    }
}

/// Shape + element type of one tensor, as seen by shape resolvers.
///
/// Derived from the inputs of a pending invocation; resolvers work on these
/// signatures only, never on values, so resolution can run before any data
/// exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedShape {
    pub dtype: DataType,
    pub dims:  Vec<usize>,
}

impl TypedShape {
    pub fn new(dtype: DataType, dims: &[usize]) -> Self {
        Self { dtype, dims: dims.to_vec() }
    }

    /// Signature of a tensor holding elements of type `T`
    pub fn of<T: Element>(dims: &[usize]) -> Self {
        Self::new(T::DTYPE, dims)
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements
    pub fn elem_count(&self) -> usize {
        self.dims.iter().product()
    }

    /// Total size of the backing buffer, in bytes
    pub fn size_in_bytes(&self) -> usize {
        self.elem_count() * self.dtype.size_in_bytes()
    }
}

impl fmt::Display for TypedShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{:?}", self.dtype, self.dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_shape_counts() {
        let sig = TypedShape::of::<f32>(&[2, 3, 4]);
        assert_eq!(sig.dtype, DataType::F32);
        assert_eq!(sig.ndim(), 3);
        assert_eq!(sig.elem_count(), 24);
        assert_eq!(sig.size_in_bytes(), 96);

        // rank-0 signature is a single scalar
        let scalar = TypedShape::of::<u32>(&[]);
        assert_eq!(scalar.elem_count(), 1);
        assert_eq!(scalar.size_in_bytes(), 4);
    }

    #[test]
    fn dtype_sizes() {
        assert_eq!(DataType::F32.size_in_bytes(), 4);
        assert_eq!(DataType::I32.size_in_bytes(), 4);
        assert_eq!(DataType::U32.size_in_bytes(), 4);
    }
}
