//! Value-semantic tensor operations.

use crate::context::{IrContext, OperationDataBuilder};
use crate::define_op;
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{TypeRef, ValueRef};
use crate::symbol::Symbol;

crate::symbols! {
    DIALECT_NAME => "tcp",
}

define_op! {
    /// Broadcast `operand` to the runtime shape `shape`, aligning trailing
    /// dimensions NumPy-style.
    pub struct BroadcastTo = "tcp"."broadcast_to";
}

define_op! {
    /// `(rows, k) x (k, cols) -> (rows, cols)` matrix product.
    pub struct Matmul = "tcp"."matmul";
}

pub fn broadcast_to(
    ctx: &mut IrContext,
    location: Location,
    operand: ValueRef,
    shape: ValueRef,
    result_ty: TypeRef,
) -> BroadcastTo {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("broadcast_to"))
        .operand(operand)
        .operand(shape)
        .result(result_ty)
        .create(ctx);
    BroadcastTo::wrap_unchecked(op)
}

pub fn matmul(
    ctx: &mut IrContext,
    location: Location,
    lhs: ValueRef,
    rhs: ValueRef,
    result_ty: TypeRef,
) -> Matmul {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("matmul"))
        .operand(lhs)
        .operand(rhs)
        .result(result_ty)
        .create(ctx);
    Matmul::wrap_unchecked(op)
}

impl BroadcastTo {
    pub fn operand(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn shape(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }
}

impl Matmul {
    pub fn lhs(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn rhs(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }
}
