//! Pattern-based rewriting.
//!
//! Patterns record what they build on a [`PatternRewriter`]; the
//! [`PatternApplicator`] commits those mutations between traversal steps, or
//! discards them when the pattern reports no match.

pub mod applicator;
pub mod conversion_target;
pub mod pattern;
pub mod rewriter;
pub mod type_converter;

pub use applicator::{ApplyResult, ConversionConfig, ConversionFailure, PatternApplicator};
pub use conversion_target::{ConversionMode, ConversionTarget, IllegalOp, LegalityCheck};
pub use pattern::RewritePattern;
pub use rewriter::PatternRewriter;
pub use type_converter::{MaterializeResult, TypeConverter};
