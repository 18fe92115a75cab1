use anyhow::Result;
use core_types::{Backend, BufferId, DataType, TypedShape};
use derive_more::From;
use memory::MemoryManager;
use tensor::Tensor;
use thiserror::Error;

include!("generated_tensor_any.rs");

/// Errors raised synchronously at registration or dispatch.
///
/// There is no retry or recovery layer behind these; a kernel writing a
/// shape other than what its resolver declared is a caller contract bug and
/// surfaces as a panic in the buffer views, not as a variant here.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("unknown operation `{0}`")]
    UnknownOp(String),

    /// Re-registration under an existing name, regardless of whether the
    /// backend capability sets differ. Never merges, never overwrites.
    #[error("operation `{0}` is already registered")]
    Duplicate(String),

    #[error("shape resolver for operation `{op}` failed: {message}")]
    ShapeResolver { op: String, message: String },

    /// Capability error: the operation cannot run on the requested backend
    /// and has no fallback.
    #[error("operation `{op}` does not support the {backend} backend")]
    UnsupportedBackend { op: String, backend: Backend },

    #[error("operation `{op}` needs a GPU runtime, but none is configured")]
    GpuUnavailable { op: String },

    #[error("execution of operation `{op}` failed: {source}")]
    Execution {
        op: String,
        #[source]
        source: anyhow::Error,
    },
}
