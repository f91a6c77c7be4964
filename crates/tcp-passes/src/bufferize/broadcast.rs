//! `tcp.broadcast_to` into an `scf.for` nest of loads and stores.

use std::rc::Rc;

use smallvec::SmallVec;
use tcp_ir::dialect::{arith, memref, scf, shape, tcp};
use tcp_ir::rewrite::{PatternRewriter, RewritePattern};
use tcp_ir::{DialectOp, IrContext, Location, OpRef, ShapedType, ValueRef};
use tracing::debug;

use crate::allocate::allocate_results;
use crate::shape_transfer::ShapeTransferRegistry;

/// Lowers `%out = tcp.broadcast_to %in, %shape` to
///
/// ```text
/// %buf = memref.alloc %shape
/// scf.for %i0 = 0 to extent(%shape, 0) {
///   ...
///     %v = memref.load %in[idx...]
///     memref.store %v, %buf[%i0, ...]
/// }
/// ```
///
/// Input dimensions align with the trailing output dimensions. An input
/// dimension whose extent differs from the aligned output extent is read at
/// index 0.
pub struct LowerBroadcastToLoops {
    registry: Rc<ShapeTransferRegistry>,
}

impl LowerBroadcastToLoops {
    pub fn new(registry: Rc<ShapeTransferRegistry>) -> Self {
        Self { registry }
    }
}

/// Appends ops to the innermost loop body, or before the matched op while no
/// loop exists yet.
struct Emitter {
    innermost: Option<scf::For>,
}

impl Emitter {
    fn emit(&self, ctx: &mut IrContext, rewriter: &mut PatternRewriter<'_>, op: OpRef) {
        match self.innermost {
            Some(parent) => parent.push(ctx, op),
            None => rewriter.insert_op(op),
        }
    }

    fn index(
        &self,
        ctx: &mut IrContext,
        rewriter: &mut PatternRewriter<'_>,
        location: Location,
        value: i64,
    ) -> ValueRef {
        let c = arith::const_index(ctx, location, value);
        self.emit(ctx, rewriter, c.op_ref());
        c.result(ctx)
    }
}

impl RewritePattern for LowerBroadcastToLoops {
    fn match_and_rewrite(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter<'_>,
    ) -> bool {
        let Ok(broadcast) = tcp::BroadcastTo::from_op(ctx, op) else {
            return false;
        };
        let location = broadcast.location(ctx);
        let input = broadcast.operand(ctx);
        let Some(input_ty) = ShapedType::decode(&ctx.types, ctx.value_ty(input)) else {
            debug!("broadcast_to: operand is not shaped");
            return false;
        };
        let Some(output_ty) = ShapedType::decode(&ctx.types, ctx.value_ty(broadcast.result(ctx)))
        else {
            debug!("broadcast_to: result is not shaped");
            return false;
        };
        let (in_rank, out_rank) = (input_ty.rank(), output_ty.rank());
        let Some(rank_diff) = out_rank.checked_sub(in_rank) else {
            debug!(in_rank, out_rank, "broadcast_to: operand rank exceeds result rank");
            return false;
        };

        let Some(allocation) = allocate_results(ctx, op, &self.registry, rewriter) else {
            return false;
        };
        let (output, output_shape) = (allocation.buffers[0], allocation.shapes[0]);
        let Some(input) = rewriter.materialize(ctx, location, input) else {
            debug!("broadcast_to: operand has no buffer materialization");
            return false;
        };

        let mut emitter = Emitter { innermost: None };

        let mut out_extents: SmallVec<[ValueRef; 4]> = SmallVec::new();
        for i in 0..out_rank {
            let dim = emitter.index(ctx, rewriter, location, i as i64);
            let extent = shape::get_extent(ctx, location, output_shape, dim);
            emitter.emit(ctx, rewriter, extent.op_ref());
            out_extents.push(extent.result(ctx));
        }

        let mut clamp: SmallVec<[ValueRef; 4]> = SmallVec::new();
        for j in 0..in_rank {
            let in_extent = shape::dim(ctx, location, input, j as u64);
            emitter.emit(ctx, rewriter, in_extent.op_ref());
            let in_extent = in_extent.result(ctx);
            let differs = arith::cmp_ne(ctx, location, in_extent, out_extents[rank_diff + j]);
            emitter.emit(ctx, rewriter, differs.op_ref());
            clamp.push(differs.result(ctx));
        }

        let zero = emitter.index(ctx, rewriter, location, 0);
        let one = emitter.index(ctx, rewriter, location, 1);

        let mut ivs: SmallVec<[ValueRef; 4]> = SmallVec::new();
        for &extent in &out_extents {
            let for_op = scf::r#for(ctx, location, zero, extent, one);
            emitter.emit(ctx, rewriter, for_op.op_ref());
            ivs.push(for_op.induction_var(ctx));
            emitter.innermost = Some(for_op);
        }

        let mut in_indices: SmallVec<[ValueRef; 4]> = SmallVec::new();
        for (j, &clamped) in clamp.iter().enumerate() {
            let index = arith::select(ctx, location, clamped, zero, ivs[rank_diff + j]);
            emitter.emit(ctx, rewriter, index.op_ref());
            in_indices.push(index.result(ctx));
        }
        let load = memref::load(ctx, location, input, in_indices, input_ty.element);
        emitter.emit(ctx, rewriter, load.op_ref());
        let value = load.result(ctx);
        let store = memref::store(ctx, location, value, output, ivs);
        emitter.emit(ctx, rewriter, store.op_ref());

        rewriter.erase_op(vec![output]);
        true
    }

    fn name(&self) -> &'static str {
        "LowerBroadcastToLoops"
    }
}
