//! Result buffer allocation.

use smallvec::SmallVec;
use tcp_ir::dialect::memref;
use tcp_ir::ops::full_name;
use tcp_ir::rewrite::PatternRewriter;
use tcp_ir::{DialectOp, IrContext, OpRef, ShapedKind, ShapedType, ValueRef};
use tracing::debug;

use crate::shape_transfer::ShapeTransferRegistry;

/// Fresh result buffers of an op and the shapes that sized them, in result
/// order. Both are empty for an op without results.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Allocation {
    pub buffers: SmallVec<[ValueRef; 1]>,
    pub shapes: SmallVec<[ValueRef; 1]>,
}

/// Emit one `memref.alloc` per tensor result of `op`.
///
/// Returns `None` if a result is not a tensor, if `registry` has no
/// transfer function for `op`, or if it yields the wrong number of shapes.
/// Every op built here is recorded on `rewriter`.
pub fn allocate_results(
    ctx: &mut IrContext,
    op: OpRef,
    registry: &ShapeTransferRegistry,
    rewriter: &mut PatternRewriter<'_>,
) -> Option<Allocation> {
    let result_types = ctx.op_result_types(op).to_vec();
    if result_types.is_empty() {
        return Some(Allocation::default());
    }
    for &ty in &result_types {
        let is_tensor = ShapedType::decode(&ctx.types, ty)
            .is_some_and(|shaped| shaped.kind == ShapedKind::Tensor);
        if !is_tensor {
            debug!(op = %full_name(ctx, op), "result is not a ranked tensor");
            return None;
        }
    }

    let shapes = registry.shapes_of(ctx, op, rewriter)?;
    if shapes.len() != result_types.len() {
        debug!(
            op = %full_name(ctx, op),
            shapes = shapes.len(),
            results = result_types.len(),
            "shape transfer returned the wrong number of shapes"
        );
        return None;
    }

    let location = ctx.op(op).location;
    let converter = rewriter.type_converter();
    let mut buffers = SmallVec::new();
    for (&ty, &shape) in result_types.iter().zip(&shapes) {
        let buffer_ty = converter.convert_type(ctx, ty)?;
        let alloc = memref::alloc(ctx, location, shape, buffer_ty);
        rewriter.insert_op(alloc.op_ref());
        buffers.push(alloc.result(ctx));
    }
    Some(Allocation { buffers, shapes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bufferize_type_converter;
    use tcp_ir::dialect::{core, func, shape, tcp};
    use tcp_ir::{Dim, Symbol};

    #[test]
    fn allocates_memref_sized_by_transfer_shape() {
        let mut ctx = IrContext::new();
        let loc = ctx.file_location("file:///alloc.tcp");
        let f32 = core::f32(&mut ctx);
        let input_ty = core::tensor(&mut ctx, f32, &[Dim::Static(4)]);
        let output_ty = core::tensor(&mut ctx, f32, &[Dim::Dynamic, Dim::Static(4)]);
        let shape_ty = shape::shape_type(&mut ctx);
        let f = func::func(&mut ctx, loc, Symbol::new("f"), [input_ty, shape_ty]);
        let params = f.params(&ctx);
        let b = tcp::broadcast_to(&mut ctx, loc, params[0], params[1], output_ty);

        let converter = bufferize_type_converter();
        let mut rw = PatternRewriter::new(&converter);
        let registry = ShapeTransferRegistry::with_builtin();
        let allocation = allocate_results(&mut ctx, b.op_ref(), &registry, &mut rw).unwrap();

        assert_eq!(allocation.shapes.as_slice(), &[params[1]]);
        let alloc = memref::Alloc::from_op(&ctx, rw.recorded_ops().next().unwrap()).unwrap();
        assert_eq!(alloc.result(&ctx), allocation.buffers[0]);
        assert_eq!(alloc.shape(&ctx), params[1]);
        let expected = core::memref(&mut ctx, f32, &[Dim::Dynamic, Dim::Static(4)]);
        assert_eq!(ctx.value_ty(allocation.buffers[0]), expected);
    }

    #[test]
    fn no_results_is_empty_success() {
        let mut ctx = IrContext::new();
        let loc = ctx.file_location("file:///alloc.tcp");
        let ret = func::r#return(&mut ctx, loc, []);

        let converter = bufferize_type_converter();
        let mut rw = PatternRewriter::new(&converter);
        let registry = ShapeTransferRegistry::new();
        let allocation = allocate_results(&mut ctx, ret.op_ref(), &registry, &mut rw);
        assert_eq!(allocation, Some(Allocation::default()));
    }

    #[test]
    fn missing_transfer_allocates_nothing() {
        let mut ctx = IrContext::new();
        let loc = ctx.file_location("file:///alloc.tcp");
        let f32 = core::f32(&mut ctx);
        let t = core::tensor(&mut ctx, f32, &[Dim::Static(2), Dim::Static(2)]);
        let f = func::func(&mut ctx, loc, Symbol::new("f"), [t, t]);
        let params = f.params(&ctx);
        let mm = tcp::matmul(&mut ctx, loc, params[0], params[1], t);

        let converter = bufferize_type_converter();
        let mut rw = PatternRewriter::new(&converter);
        let registry = ShapeTransferRegistry::new();
        assert!(allocate_results(&mut ctx, mm.op_ref(), &registry, &mut rw).is_none());
        assert_eq!(rw.recorded_ops().count(), 0);
    }

    #[test]
    fn scalar_result_is_rejected() {
        let mut ctx = IrContext::new();
        let loc = ctx.file_location("file:///alloc.tcp");
        let f32 = core::f32(&mut ctx);
        let f = func::func(&mut ctx, loc, Symbol::new("f"), [f32, f32]);
        let params = f.params(&ctx);
        let mm = tcp::matmul(&mut ctx, loc, params[0], params[1], f32);

        let converter = bufferize_type_converter();
        let mut rw = PatternRewriter::new(&converter);
        let registry = ShapeTransferRegistry::with_builtin();
        assert!(allocate_results(&mut ctx, mm.op_ref(), &registry, &mut rw).is_none());
        assert_eq!(rw.recorded_ops().count(), 0);
    }
}
