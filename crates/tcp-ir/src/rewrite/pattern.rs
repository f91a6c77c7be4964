//! Rewrite pattern trait.

use super::rewriter::PatternRewriter;
use crate::context::IrContext;
use crate::refs::OpRef;

/// A local rewrite bound to one kind of operation.
///
/// Return `true` after recording a replacement (`replace_op` or `erase_op`)
/// on the rewriter. Returning `false` rolls back every op recorded with
/// `insert_op`, so a pattern may bail out at any point once it has started
/// building. Ops that are created but never recorded are not rolled back.
pub trait RewritePattern {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter<'_>,
    ) -> bool;

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
