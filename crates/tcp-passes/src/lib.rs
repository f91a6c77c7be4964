//! Bufferization of value-semantic `tcp` tensor operations.
//!
//! [`bufferize::bufferize_func`] rewrites `tcp.broadcast_to` and
//! `tcp.matmul` into `memref` buffers, `scf.for` loop nests and `linalg`
//! library calls. Result shapes come from a [`ShapeTransferRegistry`], and
//! every result gets a fresh `memref.alloc` sized by its runtime shape.

pub mod allocate;
pub mod bufferize;
pub mod error;
pub mod shape_transfer;
pub mod type_converter;

pub use allocate::{Allocation, allocate_results};
pub use bufferize::{
    BufferizeOptions, BufferizeReport, bufferize_func, bufferize_func_with_registry,
    bufferize_module, conversion_target, dependent_dialects,
};
pub use error::BufferizeError;
pub use shape_transfer::{ShapeTransfer, ShapeTransferRegistry};
pub use type_converter::bufferize_type_converter;
