//! Arena-based mutable IR for the tcp tensor compiler.
//!
//! Operations, values, blocks and regions live in `PrimaryMap`s owned by
//! [`IrContext`]. Dialects are thin typed wrappers over generic operations,
//! and rewrites go through the pattern infrastructure in [`rewrite`].

pub mod context;
pub mod dialect;
pub mod interp;
pub mod location;
pub mod ops;
pub mod printer;
pub mod refs;
pub mod registry;
pub mod rewrite;
pub mod symbol;
pub mod types;
pub mod walk;

pub use context::{
    BlockArgData, BlockData, IrContext, OperationData, OperationDataBuilder, RegionData, Use,
    ValueData,
};
pub use location::{Location, Span};
pub use ops::{ConversionError, DialectOp};
pub use refs::{BlockRef, OpRef, PathRef, RegionRef, TypeRef, ValueDef, ValueRef};
pub use registry::DialectRegistry;
pub use symbol::Symbol;
pub use types::{
    Attribute, Dim, PathInterner, ShapedKind, ShapedType, TypeData, TypeDataBuilder, TypeInterner,
};
pub use walk::WalkAction;

// Re-export smallvec for use in macros and downstream crates
pub use smallvec;
