//! The bufferization pass.
//!
//! Rewrites `tcp.broadcast_to` and `tcp.matmul` into buffer-level ops with
//! the fixpoint driver from `tcp_ir::rewrite`, then checks that no tensor
//! op is left. A failure aborts the compilation unit; nothing is retried.

mod broadcast;
mod matmul;

use std::rc::Rc;

use tcp_ir::dialect::{arith, core, func, linalg, memref, scf, shape, tcp};
use tcp_ir::ops::full_name;
use tcp_ir::rewrite::{ConversionConfig, ConversionMode, ConversionTarget, PatternApplicator};
use tcp_ir::{DialectOp, DialectRegistry, IrContext, OpRef, Symbol};
use tracing::{debug, info};

pub use self::broadcast::LowerBroadcastToLoops;
pub use self::matmul::BufferizeMatmul;
use crate::error::BufferizeError;
use crate::shape_transfer::ShapeTransferRegistry;
use crate::type_converter::bufferize_type_converter;

/// Knobs of one pass run.
#[derive(Clone, Debug)]
pub struct BufferizeOptions {
    pub mode: ConversionMode,
    pub max_iterations: usize,
    /// Additional `(dialect, op)` pairs that must not survive.
    pub extra_illegal_ops: Vec<(Symbol, Symbol)>,
}

impl Default for BufferizeOptions {
    fn default() -> Self {
        Self {
            mode: ConversionMode::Partial,
            max_iterations: 10,
            extra_illegal_ops: Vec::new(),
        }
    }
}

/// What a successful run did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferizeReport {
    pub iterations: usize,
    pub rewrites: usize,
}

/// Dialects the lowering patterns may introduce.
pub fn dependent_dialects() -> DialectRegistry {
    [
        scf::DIALECT_NAME(),
        linalg::DIALECT_NAME(),
        shape::DIALECT_NAME(),
        memref::DIALECT_NAME(),
        arith::DIALECT_NAME(),
    ]
    .into_iter()
    .collect()
}

/// Legality rules of the pass under `options`.
pub fn conversion_target(options: &BufferizeOptions) -> ConversionTarget {
    let mut target = ConversionTarget::new();
    target
        .add_legal_dialect(scf::DIALECT_NAME())
        .add_legal_dialect(arith::DIALECT_NAME())
        .add_legal_dialect(linalg::DIALECT_NAME())
        .add_legal_dialect(memref::DIALECT_NAME())
        .add_legal_op(shape::DIALECT_NAME(), Symbol::new(shape::GetExtent::OP_NAME))
        .add_legal_op(shape::DIALECT_NAME(), Symbol::new(shape::Dim::OP_NAME))
        .add_legal_op(shape::DIALECT_NAME(), Symbol::new(shape::FromExtents::OP_NAME))
        .add_illegal_op(tcp::DIALECT_NAME(), Symbol::new(tcp::BroadcastTo::OP_NAME))
        .add_illegal_op(tcp::DIALECT_NAME(), Symbol::new(tcp::Matmul::OP_NAME));
    for &(dialect, name) in &options.extra_illegal_ops {
        target.add_illegal_op(dialect, name);
    }
    if options.mode == ConversionMode::Full {
        target
            .add_legal_op(func::DIALECT_NAME(), Symbol::new(func::Func::OP_NAME))
            .add_legal_op(func::DIALECT_NAME(), Symbol::new(func::Return::OP_NAME))
            .add_legal_op(core::DIALECT_NAME(), Symbol::new(core::Module::OP_NAME));
    }
    target
}

/// Bufferize one `func.func` with the builtin shape transfer functions.
pub fn bufferize_func(
    ctx: &mut IrContext,
    op: OpRef,
    options: &BufferizeOptions,
) -> Result<BufferizeReport, BufferizeError> {
    bufferize_func_with_registry(ctx, op, options, ShapeTransferRegistry::with_builtin())
}

/// Like [`bufferize_func`], with a caller-supplied shape transfer table.
pub fn bufferize_func_with_registry(
    ctx: &mut IrContext,
    op: OpRef,
    options: &BufferizeOptions,
    registry: ShapeTransferRegistry,
) -> Result<BufferizeReport, BufferizeError> {
    let func = func::Func::from_op(ctx, op).map_err(|_| BufferizeError::NotAFunction {
        op: full_name(ctx, op),
    })?;
    let name = func.name(ctx);

    let registry = Rc::new(registry);
    let applicator = PatternApplicator::new(bufferize_type_converter())
        .add_pattern(LowerBroadcastToLoops::new(registry.clone()))
        .add_pattern(BufferizeMatmul::new(registry));
    let config = ConversionConfig {
        dependent_dialects: dependent_dialects(),
        mode: options.mode,
        max_iterations: options.max_iterations,
    };

    let result = applicator
        .apply_conversion(ctx, func.op_ref(), &conversion_target(options), &config)
        .map_err(|source| BufferizeError::ConversionFailed { func: name, source })?;
    debug!(
        func = %name,
        iterations = result.iterations,
        rewrites = result.total_changes,
        "bufferized"
    );
    Ok(BufferizeReport {
        iterations: result.iterations,
        rewrites: result.total_changes,
    })
}

/// Bufferize every function of a `core.module`, stopping at the first failure.
pub fn bufferize_module(
    ctx: &mut IrContext,
    module: OpRef,
    options: &BufferizeOptions,
) -> Result<BufferizeReport, BufferizeError> {
    let module = core::Module::from_op(ctx, module).map_err(|_| BufferizeError::NotAModule {
        op: full_name(ctx, module),
    })?;
    let mut total = BufferizeReport::default();
    for f in module.funcs(ctx) {
        let report = bufferize_func(ctx, f.op_ref(), options)?;
        total.iterations = total.iterations.max(report.iterations);
        total.rewrites += report.rewrites;
    }
    info!(rewrites = total.rewrites, "module bufferized");
    Ok(total)
}
