//! Tensor to buffer type mapping.

use tcp_ir::dialect::memref;
use tcp_ir::rewrite::{MaterializeResult, TypeConverter};
use tcp_ir::{DialectOp, ShapedKind, ShapedType};

/// `tensor<dims x elem>` becomes `memref<dims x elem>`; a tensor value
/// consumed by a lowered op is reinterpreted through `memref.buffer_cast`.
pub fn bufferize_type_converter() -> TypeConverter {
    let mut converter = TypeConverter::new();
    converter.add_conversion(|ctx, ty| {
        let shaped = ShapedType::decode(&ctx.types, ty)?;
        if shaped.kind != ShapedKind::Tensor {
            return None;
        }
        Some(ShapedType::memref(shaped.element, shaped.dims).intern(&mut ctx.types))
    });
    converter.set_materializer(|ctx, location, value, from, to| {
        let is_tensor = ShapedType::decode(&ctx.types, from)?.kind == ShapedKind::Tensor;
        let is_buffer = ShapedType::decode(&ctx.types, to)?.kind == ShapedKind::MemRef;
        if !(is_tensor && is_buffer) {
            return None;
        }
        let cast = memref::buffer_cast(ctx, location, value, to);
        Some(MaterializeResult {
            value: cast.result(ctx),
            ops: vec![cast.op_ref()],
        })
    });
    converter
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcp_ir::dialect::core;
    use tcp_ir::{Dim, IrContext};

    #[test]
    fn tensor_converts_to_memref_with_same_dims() {
        let mut ctx = IrContext::new();
        let f32 = core::f32(&mut ctx);
        let tensor = core::tensor(&mut ctx, f32, &[Dim::Dynamic, Dim::Static(4)]);
        let expected = core::memref(&mut ctx, f32, &[Dim::Dynamic, Dim::Static(4)]);

        let converter = bufferize_type_converter();
        assert_eq!(converter.convert_type(&mut ctx, tensor), Some(expected));
        assert_eq!(converter.convert_type(&mut ctx, expected), None);
        assert_eq!(converter.convert_type(&mut ctx, f32), None);
    }

    #[test]
    fn materializes_buffer_cast() {
        let mut ctx = IrContext::new();
        let loc = ctx.file_location("file:///convert.tcp");
        let f32 = core::f32(&mut ctx);
        let tensor = core::tensor(&mut ctx, f32, &[Dim::Static(2)]);
        let buffer = core::memref(&mut ctx, f32, &[Dim::Static(2)]);
        let block = ctx.create_block_with_args(loc, [tensor]);
        let arg = ctx.block_arg(block, 0);

        let converter = bufferize_type_converter();
        let cast = converter
            .materialize(&mut ctx, loc, arg, tensor, buffer)
            .expect("tensor to memref materializes");
        assert_eq!(cast.ops.len(), 1);
        assert!(memref::BufferCast::matches(&ctx, cast.ops[0]));
        assert_eq!(ctx.value_ty(cast.value), buffer);
        assert!(converter.materialize(&mut ctx, loc, arg, buffer, tensor).is_none());
    }
}
