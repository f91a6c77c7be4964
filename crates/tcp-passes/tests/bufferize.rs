mod common;

use common::{broadcast_func, dims, iota, matmul_func, run, run_with_shape};
use insta::assert_snapshot;
use tcp_ir::dialect::{arith, core, func, linalg, memref, shape, tcp};
use tcp_ir::interp::Buffer;
use tcp_ir::printer::print_op;
use tcp_ir::rewrite::{ConversionFailure, ConversionMode, LegalityCheck};
use tcp_ir::walk::collect_ops;
use tcp_ir::{DialectOp, Dim, IrContext, OperationDataBuilder, Symbol};
use tcp_passes::{
    BufferizeError, BufferizeOptions, ShapeTransferRegistry, bufferize_func,
    bufferize_func_with_registry, bufferize_module,
};

fn lower(ctx: &mut IrContext, f: func::Func) -> tcp_passes::BufferizeReport {
    bufferize_func(ctx, f.op_ref(), &BufferizeOptions::default()).expect("bufferization succeeds")
}

fn op_names(ctx: &IrContext, f: func::Func) -> Vec<String> {
    collect_ops(ctx, f.body(ctx))
        .into_iter()
        .map(|op| tcp_ir::ops::full_name(ctx, op))
        .collect()
}

#[test]
fn broadcast_lowers_to_loop_nest() {
    let mut ctx = IrContext::new();
    let f = broadcast_func(&mut ctx, &[Dim::Static(1), Dim::Static(4)], &dims(2));
    let report = lower(&mut ctx, f);
    assert_eq!(report.rewrites, 1);
    assert_eq!(report.iterations, 2);

    assert_snapshot!(print_op(&ctx, f.op_ref()), @r"
    func.func @broadcast(%0: tensor<1x4xf32>, %1: !shape.shape) {
      %2 = memref.alloc %1 : memref<?x?xf32>
      %3 = memref.buffer_cast %0 : memref<1x4xf32>
      %4 = arith.constant {value = 0} : index
      %5 = shape.get_extent %1, %4 : index
      %6 = arith.constant {value = 1} : index
      %7 = shape.get_extent %1, %6 : index
      %8 = shape.dim %3 {index = 0} : index
      %9 = arith.cmp_ne %8, %5 : i1
      %10 = shape.dim %3 {index = 1} : index
      %11 = arith.cmp_ne %10, %7 : i1
      %12 = arith.constant {value = 0} : index
      %13 = arith.constant {value = 1} : index
      scf.for %12, %5, %13 {
      ^bb0(%14: index):
        scf.for %12, %7, %13 {
        ^bb0(%15: index):
          %16 = arith.select %9, %12, %14 : index
          %17 = arith.select %11, %12, %15 : index
          %18 = memref.load %3, %16, %17 : f32
          memref.store %18, %2, %14, %15
          scf.yield
        }
        scf.yield
      }
      func.return %2
    }
    ");
}

#[test]
fn matmul_lowers_to_fill_and_accumulate() {
    let mut ctx = IrContext::new();
    let f = matmul_func(&mut ctx);
    lower(&mut ctx, f);

    assert_snapshot!(print_op(&ctx, f.op_ref()), @r"
    func.func @matmul(%0: tensor<?x?xf32>, %1: tensor<?x?xf32>) {
      %2 = shape.dim %0 {index = 0} : index
      %3 = shape.dim %1 {index = 1} : index
      %4 = shape.from_extents %2, %3 : !shape.shape
      %5 = memref.alloc %4 : memref<?x?xf32>
      %6 = memref.buffer_cast %0 : memref<?x?xf32>
      %7 = memref.buffer_cast %1 : memref<?x?xf32>
      %8 = arith.constant {value = 0.0} : f32
      linalg.fill %5, %8
      linalg.matmul %6, %7, %5
      func.return %5
    }
    ");
}

#[test]
fn broadcast_output_shape_is_the_shape_operand() {
    for rank in 0..=3 {
        let mut ctx = IrContext::new();
        let f = broadcast_func(&mut ctx, &dims(0), &dims(rank));
        let shape_param = f.params(&ctx)[1];
        lower(&mut ctx, f);

        let allocs: Vec<_> = collect_ops(&ctx, f.body(&ctx))
            .into_iter()
            .filter_map(|op| memref::Alloc::from_op(&ctx, op).ok())
            .collect();
        assert_eq!(allocs.len(), 1, "rank {rank}");
        assert_eq!(allocs[0].shape(&ctx), shape_param, "rank {rank}");

        let extents = vec![2; rank];
        let out = run_with_shape(&ctx, f, &[Buffer::new(vec![], vec![1.5])], &extents);
        assert_eq!(out.dims, extents);
    }
}

#[test]
fn matmul_output_shape_is_rows_by_cols() {
    let mut ctx = IrContext::new();
    let f = matmul_func(&mut ctx);
    let params = f.params(&ctx);
    lower(&mut ctx, f);

    let alloc = collect_ops(&ctx, f.body(&ctx))
        .into_iter()
        .find_map(|op| memref::Alloc::from_op(&ctx, op).ok())
        .unwrap();
    let packed = ctx.defining_op(alloc.shape(&ctx)).unwrap();
    let packed = shape::FromExtents::from_op(&ctx, packed).unwrap();
    let sources: Vec<_> = packed
        .extents(&ctx)
        .iter()
        .map(|&e| {
            let dim = shape::Dim::from_op(&ctx, ctx.defining_op(e).unwrap()).unwrap();
            (dim.source(&ctx), dim.index(&ctx))
        })
        .collect();
    assert_eq!(sources, [(params[0], Some(0)), (params[1], Some(1))]);

    let out = run(&ctx, f, &[iota(&[3, 5]), iota(&[5, 2])]);
    assert_eq!(out.dims, &[3, 2]);
}

/// A mismatched inner dimension is not diagnosed by the lowering; it only
/// surfaces when the lowered code runs.
#[test]
fn matmul_inner_dimension_mismatch_is_unchecked() {
    let mut ctx = IrContext::new();
    let f = matmul_func(&mut ctx);
    lower(&mut ctx, f);

    let mut interp = tcp_ir::interp::Interpreter::new(&ctx);
    let lhs = interp.add_buffer(iota(&[2, 3]));
    let rhs = interp.add_buffer(iota(&[2, 2]));
    let err = interp.call(f, vec![lhs, rhs]).unwrap_err();
    assert!(matches!(err, tcp_ir::interp::InterpError::ShapeMismatch { .. }));
}

#[test]
fn broadcast_replicates_size_one_rows() {
    let mut ctx = IrContext::new();
    let f = broadcast_func(&mut ctx, &[Dim::Static(1), Dim::Static(4)], &dims(2));
    lower(&mut ctx, f);

    let input = Buffer::new(vec![1, 4], vec![1.0, 2.0, 3.0, 4.0]);
    let out = run_with_shape(&ctx, f, &[input.clone()], &[3, 4]);
    for i in 0..3 {
        for j in 0..4 {
            assert_eq!(out.get(&[i, j]), input.get(&[0, j]));
        }
    }
}

#[test]
fn broadcast_aligns_trailing_dimensions() {
    let mut ctx = IrContext::new();
    let f = broadcast_func(&mut ctx, &dims(1), &dims(3));
    lower(&mut ctx, f);

    let out = run_with_shape(&ctx, f, &[iota(&[3])], &[2, 2, 3]);
    assert_eq!(out.to_string(), "[[[0, 1, 2], [0, 1, 2]], [[0, 1, 2], [0, 1, 2]]]");
}

#[test]
fn rank_zero_broadcast_fills_every_position() {
    let mut ctx = IrContext::new();
    let f = broadcast_func(&mut ctx, &[], &[Dim::Static(2), Dim::Static(2)]);
    lower(&mut ctx, f);

    assert!(!op_names(&ctx, f).contains(&"arith.select".to_owned()));
    let out = run_with_shape(&ctx, f, &[Buffer::new(vec![], vec![7.0])], &[2, 2]);
    assert_eq!(out.data, vec![7.0; 4]);
}

#[test]
fn matmul_result_is_zero_filled_before_accumulation() {
    let mut ctx = IrContext::new();
    let f = matmul_func(&mut ctx);
    lower(&mut ctx, f);
    let lhs = Buffer::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]);
    let rhs = Buffer::new(vec![2, 2], vec![5.0, 6.0, 7.0, 8.0]);

    let out = run(&ctx, f, &[lhs.clone(), rhs.clone()]);
    assert_eq!(out.to_string(), "[[19, 22], [43, 50]]");

    // Without the accumulation step the fresh buffer must read as zeros,
    // not the NaN a bare allocation holds.
    let accumulate = collect_ops(&ctx, f.body(&ctx))
        .into_iter()
        .find(|&op| linalg::Matmul::matches(&ctx, op))
        .unwrap();
    ctx.detach_op(accumulate);
    let filled = run(&ctx, f, &[lhs, rhs]);
    assert_eq!(filled.data, vec![0.0; 4]);
}

#[test]
fn integer_matmul_fills_with_integer_zero() {
    let mut ctx = IrContext::new();
    let loc = ctx.file_location("file:///matmul.tcp");
    let i32 = core::i32(&mut ctx);
    let t = core::tensor(&mut ctx, i32, &dims(2));
    let f = func::func(&mut ctx, loc, Symbol::new("imatmul"), [t, t]);
    let params = f.params(&ctx);
    let mm = tcp::matmul(&mut ctx, loc, params[0], params[1], t);
    f.push(&mut ctx, mm.op_ref());
    lower(&mut ctx, f);

    let zero = collect_ops(&ctx, f.body(&ctx))
        .into_iter()
        .find_map(|op| arith::Constant::from_op(&ctx, op).ok())
        .unwrap();
    assert_eq!(zero.value(&ctx).as_i64(), Some(0));
    assert_eq!(ctx.value_ty(zero.result(&ctx)), i32);
}

#[test]
fn legal_input_is_left_byte_for_byte_unchanged() {
    let mut ctx = IrContext::new();
    let f = broadcast_func(&mut ctx, &dims(1), &dims(2));
    lower(&mut ctx, f);
    let once = print_op(&ctx, f.op_ref());

    let report = lower(&mut ctx, f);
    assert_eq!(report.rewrites, 0);
    assert_eq!(report.iterations, 1);
    assert_eq!(print_op(&ctx, f.op_ref()), once);
}

#[test]
fn missing_shape_transfer_fails_without_remnants() {
    let mut ctx = IrContext::new();
    let f = matmul_func(&mut ctx);
    let lhs = f.params(&ctx)[0];
    let before = print_op(&ctx, f.op_ref());

    let mut registry = ShapeTransferRegistry::new();
    registry.register::<tcp::BroadcastTo>();
    let err = bufferize_func_with_registry(
        &mut ctx,
        f.op_ref(),
        &BufferizeOptions::default(),
        registry,
    )
    .unwrap_err();

    let BufferizeError::ConversionFailed { func, source } = &err else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(*func, "matmul");
    let ConversionFailure::IllegalOpsRemain { ops } = source else {
        panic!("unexpected failure: {source}");
    };
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].name, "matmul");

    assert_eq!(print_op(&ctx, f.op_ref()), before);
    // Nothing but the matmul itself is left using %lhs.
    assert_eq!(ctx.uses(lhs).len(), 1);
}

/// An operand extent that is neither 1 nor the result extent is still read
/// at index 0 by the lowered loops, while the tensor-level op rejects it.
#[test]
fn mismatched_extent_is_clamped_to_zero() {
    let mut ctx = IrContext::new();
    let f = broadcast_func(&mut ctx, &dims(1), &dims(1));

    let mut interp = tcp_ir::interp::Interpreter::new(&ctx);
    let input = interp.add_buffer(iota(&[2]));
    let err = interp
        .call(f, vec![input, tcp_ir::interp::RtValue::Shape(vec![3])])
        .unwrap_err();
    assert!(matches!(err, tcp_ir::interp::InterpError::ShapeMismatch { .. }), "{err}");

    lower(&mut ctx, f);
    let out = run_with_shape(&ctx, f, &[iota(&[2])], &[3]);
    assert_eq!(out.to_string(), "[0, 0, 0]");
}

/// Asserts that bufferizing `f` fails on `op_name` and leaves `f` untouched.
fn assert_rejected(ctx: &mut IrContext, f: func::Func, op_name: &str) {
    let params = f.params(ctx);
    let uses_before: Vec<usize> = params.iter().map(|&p| ctx.uses(p).len()).collect();
    let before = print_op(ctx, f.op_ref());

    let err = bufferize_func(ctx, f.op_ref(), &BufferizeOptions::default()).unwrap_err();
    let BufferizeError::ConversionFailed {
        source: ConversionFailure::IllegalOpsRemain { ops },
        ..
    } = &err
    else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].name, op_name);

    assert_eq!(print_op(ctx, f.op_ref()), before);
    let uses_after: Vec<usize> = params.iter().map(|&p| ctx.uses(p).len()).collect();
    assert_eq!(uses_after, uses_before);
}

#[test]
fn broadcast_to_lower_rank_is_rejected() {
    let mut ctx = IrContext::new();
    let f = broadcast_func(&mut ctx, &[Dim::Static(2), Dim::Static(3)], &[Dim::Static(3)]);
    assert_rejected(&mut ctx, f, "broadcast_to");
}

#[test]
fn matmul_of_non_matrix_is_rejected() {
    let mut ctx = IrContext::new();
    let loc = ctx.file_location("file:///matmul.tcp");
    let f32 = core::f32(&mut ctx);
    let vector = core::tensor(&mut ctx, f32, &dims(1));
    let matrix = core::tensor(&mut ctx, f32, &dims(2));
    let f = func::func(&mut ctx, loc, Symbol::new("matvec"), [vector, matrix]);
    let params = f.params(&ctx);
    let mm = tcp::matmul(&mut ctx, loc, params[0], params[1], matrix);
    let mm_v = mm.result(&ctx);
    let ret = func::r#return(&mut ctx, loc, [mm_v]);
    f.push(&mut ctx, mm.op_ref());
    f.push(&mut ctx, ret.op_ref());
    assert_rejected(&mut ctx, f, "matmul");
}

#[test]
fn extra_illegal_op_without_pattern_fails() {
    let mut ctx = IrContext::new();
    let f = broadcast_func(&mut ctx, &dims(1), &dims(1));
    let loc = ctx.file_location("file:///relu.tcp");
    let ret = f.terminator(&ctx).unwrap();
    let value = ret.values(&ctx)[0];
    let ty = ctx.value_ty(value);
    let relu = OperationDataBuilder::new(loc, tcp::DIALECT_NAME(), Symbol::new("relu"))
        .operand(value)
        .result(ty)
        .create(&mut ctx);
    ctx.insert_op_before(f.entry_block(&ctx), ret.op_ref(), relu);

    let options = BufferizeOptions {
        extra_illegal_ops: vec![(tcp::DIALECT_NAME(), Symbol::new("relu"))],
        ..BufferizeOptions::default()
    };
    let err = bufferize_func(&mut ctx, f.op_ref(), &options).unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "failed to bufferize `broadcast`: 1 operation(s) failed to legalize: tcp.relu ({relu})"
        )
    );
    // The broadcast itself was committed before the failure surfaced.
    assert!(!op_names(&ctx, f).contains(&"tcp.broadcast_to".to_owned()));
    assert!(ctx.op(relu).parent_block.is_some());
}

#[test]
fn full_conversion_rejects_unknown_ops() {
    let build = |ctx: &mut IrContext| {
        let loc = ctx.file_location("file:///full.tcp");
        let f32 = core::f32(ctx);
        let input_ty = core::tensor(ctx, f32, &dims(1));
        let output_ty = core::tensor(ctx, f32, &dims(2));
        let f = func::func(ctx, loc, Symbol::new("const_target"), [input_ty]);
        let input = f.params(ctx)[0];
        let target = shape::const_shape(ctx, loc, &[2, 3]);
        let target_v = target.result(ctx);
        let b = tcp::broadcast_to(ctx, loc, input, target_v, output_ty);
        let b_v = b.result(ctx);
        let ret = func::r#return(ctx, loc, [b_v]);
        for op in [target.op_ref(), b.op_ref(), ret.op_ref()] {
            f.push(ctx, op);
        }
        f
    };

    let mut ctx = IrContext::new();
    let f = build(&mut ctx);
    assert!(bufferize_func(&mut ctx, f.op_ref(), &BufferizeOptions::default()).is_ok());

    let mut ctx = IrContext::new();
    let f = build(&mut ctx);
    let options = BufferizeOptions {
        mode: ConversionMode::Full,
        ..BufferizeOptions::default()
    };
    let err = bufferize_func(&mut ctx, f.op_ref(), &options).unwrap_err();
    let BufferizeError::ConversionFailed {
        source: ConversionFailure::IllegalOpsRemain { ops },
        ..
    } = err
    else {
        panic!("unexpected error: {err}");
    };
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].name, "const_shape");
    assert_eq!(ops[0].legality, LegalityCheck::Unknown);
}

#[test]
fn iteration_budget_of_zero_fails() {
    let mut ctx = IrContext::new();
    let f = matmul_func(&mut ctx);
    let options = BufferizeOptions {
        max_iterations: 0,
        ..BufferizeOptions::default()
    };
    let err = bufferize_func(&mut ctx, f.op_ref(), &options).unwrap_err();
    assert!(matches!(
        err,
        BufferizeError::ConversionFailed {
            source: ConversionFailure::IterationLimit { iterations: 0, .. },
            ..
        }
    ));
}

#[test]
fn broadcast_feeding_matmul_lowers_in_one_sweep() {
    let mut ctx = IrContext::new();
    let loc = ctx.file_location("file:///chain.tcp");
    let f32 = core::f32(&mut ctx);
    let row_ty = core::tensor(&mut ctx, f32, &[Dim::Static(1), Dim::Static(2)]);
    let square_ty = core::tensor(&mut ctx, f32, &dims(2));
    let shape_ty = shape::shape_type(&mut ctx);
    let f = func::func(&mut ctx, loc, Symbol::new("chain"), [row_ty, square_ty, shape_ty]);
    let params = f.params(&ctx);
    let b = tcp::broadcast_to(&mut ctx, loc, params[0], params[2], square_ty);
    let b_v = b.result(&ctx);
    let mm = tcp::matmul(&mut ctx, loc, b_v, params[1], square_ty);
    let mm_v = mm.result(&ctx);
    let ret = func::r#return(&mut ctx, loc, [mm_v]);
    for op in [b.op_ref(), mm.op_ref(), ret.op_ref()] {
        f.push(&mut ctx, op);
    }

    let row = Buffer::new(vec![1, 2], vec![1.0, 2.0]);
    let rhs = Buffer::new(vec![2, 2], vec![5.0, 6.0, 7.0, 8.0]);
    let mut interp = tcp_ir::interp::Interpreter::new(&ctx);
    let args = vec![
        interp.add_buffer(row.clone()),
        interp.add_buffer(rhs.clone()),
        tcp_ir::interp::RtValue::Shape(vec![2, 2]),
    ];
    let expected = interp.call(f, args).unwrap();
    let expected = interp.buffer(&expected[0]).unwrap().clone();

    let report = lower(&mut ctx, f);
    assert_eq!(report.rewrites, 2);
    assert_eq!(report.iterations, 2);
    // The matmul consumes the broadcast buffer directly, so only the
    // function parameters need casts.
    let casts = op_names(&ctx, f)
        .iter()
        .filter(|n| *n == "memref.buffer_cast")
        .count();
    assert_eq!(casts, 2);

    let out = run_with_shape(&ctx, f, &[row, rhs], &[2, 2]);
    assert_eq!(out, expected);
    assert_eq!(out.to_string(), "[[19, 22], [19, 22]]");
}

#[test]
fn module_bufferizes_every_function() {
    let mut ctx = IrContext::new();
    let loc = ctx.file_location("file:///module.tcp");
    let module = core::module(&mut ctx, loc, Symbol::new("kernels"));
    let b = broadcast_func(&mut ctx, &dims(1), &dims(2));
    let m = matmul_func(&mut ctx);
    module.push_func(&mut ctx, b);
    module.push_func(&mut ctx, m);

    let report =
        bufferize_module(&mut ctx, module.op_ref(), &BufferizeOptions::default()).unwrap();
    assert_eq!(report.rewrites, 2);
    for f in [b, m] {
        assert!(!op_names(&ctx, f).iter().any(|n| n.starts_with("tcp.")));
    }
}

#[test]
fn entry_points_reject_wrong_ops() {
    let mut ctx = IrContext::new();
    let f = matmul_func(&mut ctx);
    let err = bufferize_module(&mut ctx, f.op_ref(), &BufferizeOptions::default()).unwrap_err();
    assert_eq!(err.to_string(), "expected `core.module`, found `func.func`");

    let ret = f.terminator(&ctx).unwrap();
    let err = bufferize_func(&mut ctx, ret.op_ref(), &BufferizeOptions::default()).unwrap_err();
    assert!(matches!(err, BufferizeError::NotAFunction { ref op } if op == "func.return"));
}
