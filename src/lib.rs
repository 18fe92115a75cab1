//! Umbrella crate re-exporting the neurop workspace: typed tensors, the
//! custom-operator registry and the eager execution engine.

pub use core_types;
pub use execution;
pub use memory;
pub use neurop_core;
pub use neurop_ops;
pub use tensor;

pub use core_types::{Backend, DataType, Element, TypedShape};
pub use execution::ExecutionEngine;
pub use neurop_ops::{
    GpuExecution, GpuKernelSource, HostKernel, LaunchExtent, OpDescriptor, OpError, OpRegistry,
    ShapeResolver, TensorAny,
};
pub use tensor::Tensor;
