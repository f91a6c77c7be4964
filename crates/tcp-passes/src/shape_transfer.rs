//! Runtime result shapes of tensor operations.
//!
//! The registry is a table from `(dialect, op)` to a transfer function.
//! A transfer function may build cheap `shape.*` ops; it records each of
//! them with the rewriter so that they disappear if the enclosing rewrite
//! is abandoned.

use std::collections::HashMap;

use smallvec::{SmallVec, smallvec};
use tcp_ir::dialect::{shape, tcp};
use tcp_ir::ops::full_name;
use tcp_ir::rewrite::PatternRewriter;
use tcp_ir::{DialectOp, IrContext, OpRef, Symbol, ValueRef};
use tracing::trace;

/// One `shape.shape` value per result.
pub type ResultShapes = SmallVec<[ValueRef; 1]>;

type TransferFn = fn(&mut IrContext, OpRef, &mut PatternRewriter<'_>) -> Option<ResultShapes>;

/// Shape transfer for one typed operation.
pub trait ShapeTransfer: DialectOp {
    fn result_shapes(
        self,
        ctx: &mut IrContext,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Option<ResultShapes>;
}

impl ShapeTransfer for tcp::BroadcastTo {
    /// The target shape is already an operand.
    fn result_shapes(
        self,
        ctx: &mut IrContext,
        _: &mut PatternRewriter<'_>,
    ) -> Option<ResultShapes> {
        Some(smallvec![self.shape(ctx)])
    }
}

impl ShapeTransfer for tcp::Matmul {
    /// `(rows, k) x (k, cols) -> (rows, cols)`, read from the operands at run time.
    fn result_shapes(
        self,
        ctx: &mut IrContext,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Option<ResultShapes> {
        let location = self.location(ctx);
        let (lhs, rhs) = (self.lhs(ctx), self.rhs(ctx));
        let rows = shape::dim(ctx, location, lhs, 0);
        rewriter.insert_op(rows.op_ref());
        let cols = shape::dim(ctx, location, rhs, 1);
        rewriter.insert_op(cols.op_ref());
        let extents = [rows.result(ctx), cols.result(ctx)];
        let result = shape::from_extents(ctx, location, extents);
        rewriter.insert_op(result.op_ref());
        Some(smallvec![result.result(ctx)])
    }
}

/// Shape transfer functions keyed by `(dialect, op)`.
#[derive(Clone, Default)]
pub struct ShapeTransferRegistry {
    table: HashMap<(Symbol, Symbol), TransferFn>,
}

impl ShapeTransferRegistry {
    /// An empty registry. Every lookup fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfer functions for `tcp.broadcast_to` and `tcp.matmul`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register::<tcp::BroadcastTo>()
            .register::<tcp::Matmul>();
        registry
    }

    /// Register `T`'s transfer function, replacing any earlier one.
    pub fn register<T: ShapeTransfer>(&mut self) -> &mut Self {
        let key = (Symbol::new(T::DIALECT_NAME), Symbol::new(T::OP_NAME));
        self.table.insert(key, |ctx, op, rewriter| {
            T::wrap_unchecked(op).result_shapes(ctx, rewriter)
        });
        self
    }

    /// Whether a transfer function is registered for `op`'s kind.
    pub fn supports(&self, ctx: &IrContext, op: OpRef) -> bool {
        let data = ctx.op(op);
        self.table.contains_key(&(data.dialect, data.name))
    }

    /// Shapes of `op`'s results, or `None` when no transfer is registered.
    pub fn shapes_of(
        &self,
        ctx: &mut IrContext,
        op: OpRef,
        rewriter: &mut PatternRewriter<'_>,
    ) -> Option<ResultShapes> {
        let data = ctx.op(op);
        let Some(transfer) = self.table.get(&(data.dialect, data.name)) else {
            trace!(op = %full_name(ctx, op), "no shape transfer registered");
            return None;
        };
        transfer(ctx, op, rewriter)
    }
}
