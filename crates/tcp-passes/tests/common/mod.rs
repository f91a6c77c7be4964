#![allow(dead_code)]

use tcp_ir::dialect::{core, func, shape, tcp};
use tcp_ir::interp::{Buffer, Interpreter, RtValue};
use tcp_ir::{DialectOp, Dim, IrContext, Symbol};

pub fn dims(rank: usize) -> Vec<Dim> {
    vec![Dim::Dynamic; rank]
}

/// `func @broadcast(%in: input, %shape: !shape.shape) { return broadcast_to(%in, %shape) }`
pub fn broadcast_func(ctx: &mut IrContext, input: &[Dim], output: &[Dim]) -> func::Func {
    let loc = ctx.file_location("file:///broadcast.tcp");
    let f32 = core::f32(ctx);
    let input_ty = core::tensor(ctx, f32, input);
    let output_ty = core::tensor(ctx, f32, output);
    let shape_ty = shape::shape_type(ctx);
    let f = func::func(ctx, loc, Symbol::new("broadcast"), [input_ty, shape_ty]);
    let params = f.params(ctx);
    let b = tcp::broadcast_to(ctx, loc, params[0], params[1], output_ty);
    let b_v = b.result(ctx);
    let ret = func::r#return(ctx, loc, [b_v]);
    f.push(ctx, b.op_ref());
    f.push(ctx, ret.op_ref());
    f
}

/// `func @matmul(%lhs, %rhs) { return matmul(%lhs, %rhs) }` over dynamic 2-D tensors.
pub fn matmul_func(ctx: &mut IrContext) -> func::Func {
    let loc = ctx.file_location("file:///matmul.tcp");
    let f32 = core::f32(ctx);
    let t = core::tensor(ctx, f32, &dims(2));
    let f = func::func(ctx, loc, Symbol::new("matmul"), [t, t]);
    let params = f.params(ctx);
    let mm = tcp::matmul(ctx, loc, params[0], params[1], t);
    let mm_v = mm.result(ctx);
    let ret = func::r#return(ctx, loc, [mm_v]);
    f.push(ctx, mm.op_ref());
    f.push(ctx, ret.op_ref());
    f
}

/// Row-major buffer holding `0, 1, 2, ...`.
pub fn iota(dims: &[usize]) -> Buffer {
    let len = dims.iter().product::<usize>();
    Buffer::new(dims.to_vec(), (0..len).map(|i| i as f64).collect())
}

/// Run `f` on `inputs` and return its first result.
pub fn run(ctx: &IrContext, f: func::Func, inputs: &[Buffer]) -> Buffer {
    call(ctx, f, inputs, None)
}

/// Like [`run`], passing `shape` as the trailing `!shape.shape` argument.
pub fn run_with_shape(
    ctx: &IrContext,
    f: func::Func,
    inputs: &[Buffer],
    shape: &[usize],
) -> Buffer {
    call(ctx, f, inputs, Some(shape))
}

fn call(ctx: &IrContext, f: func::Func, inputs: &[Buffer], shape: Option<&[usize]>) -> Buffer {
    let mut interp = Interpreter::new(ctx);
    let mut args: Vec<RtValue> = inputs.iter().map(|b| interp.add_buffer(b.clone())).collect();
    if let Some(shape) = shape {
        args.push(RtValue::Shape(shape.to_vec()));
    }
    let results = interp.call(f, args).expect("function executes");
    interp
        .buffer(&results[0])
        .expect("function returns a buffer")
        .clone()
}
