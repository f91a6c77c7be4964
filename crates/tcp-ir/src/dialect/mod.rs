//! Dialect definitions.
//!
//! Every dialect module exposes a `DIALECT_NAME()` symbol, typed op
//! wrappers declared with [`define_op!`](crate::define_op), and constructor
//! functions that create detached operations in an [`IrContext`](crate::IrContext).

pub mod arith;
pub mod core;
pub mod func;
pub mod linalg;
pub mod memref;
pub mod scf;
pub mod shape;
pub mod tcp;
