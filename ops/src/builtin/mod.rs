//! Built-in operations, submitted through [`register_op!`](crate::register_op)
//! and collected by [`OpRegistry::with_builtins`](crate::OpRegistry::with_builtins).

pub mod accumulate;
pub mod add;
