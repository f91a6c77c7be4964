//! `tcp.matmul` into `linalg.fill` + `linalg.matmul`.

use std::rc::Rc;

use tcp_ir::dialect::{arith, core, linalg, tcp};
use tcp_ir::rewrite::{PatternRewriter, RewritePattern};
use tcp_ir::{DialectOp, IrContext, OpRef, ShapedType, ValueRef};
use tracing::debug;

use crate::allocate::allocate_results;
use crate::shape_transfer::ShapeTransferRegistry;

/// Zero-fills a fresh result buffer, then accumulates the product into it.
pub struct BufferizeMatmul {
    registry: Rc<ShapeTransferRegistry>,
}

impl BufferizeMatmul {
    pub fn new(registry: Rc<ShapeTransferRegistry>) -> Self {
        Self { registry }
    }
}

impl RewritePattern for BufferizeMatmul {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter<'_>,
    ) -> bool {
        let Ok(matmul) = tcp::Matmul::from_op(ctx, op) else {
            return false;
        };
        let location = matmul.location(ctx);
        let (lhs, rhs) = (matmul.lhs(ctx), matmul.rhs(ctx));
        let rank2 = |v: ValueRef| {
            ShapedType::decode(&ctx.types, ctx.value_ty(v)).is_some_and(|shaped| shaped.rank() == 2)
        };
        if !(rank2(lhs) && rank2(rhs)) {
            debug!("matmul: operands must be rank-2");
            return false;
        }

        let Some(allocation) = allocate_results(ctx, op, &self.registry, rewriter) else {
            return false;
        };
        let result = allocation.buffers[0];
        let Some(element) = ShapedType::decode(&ctx.types, ctx.value_ty(result)).map(|s| s.element)
        else {
            return false;
        };
        let (Some(lhs), Some(rhs)) = (
            rewriter.materialize(ctx, location, lhs),
            rewriter.materialize(ctx, location, rhs),
        ) else {
            debug!("matmul: operand has no buffer materialization");
            return false;
        };

        let zero_attr = core::zero_attr(ctx, element);
        let zero = arith::constant(ctx, location, element, zero_attr);
        rewriter.insert_op(zero.op_ref());
        let zero = zero.result(ctx);
        let fill = linalg::fill(ctx, location, result, zero);
        rewriter.insert_op(fill.op_ref());
        let accumulate = linalg::matmul(ctx, location, lhs, rhs, result);
        rewriter.insert_op(accumulate.op_ref());

        rewriter.erase_op(vec![result]);
        true
    }

    fn name(&self) -> &'static str {
        "BufferizeMatmul"
    }
}
