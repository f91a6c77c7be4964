//! Library-call style buffer operations.

use crate::context::{IrContext, OperationDataBuilder};
use crate::define_op;
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::ValueRef;
use crate::symbol::Symbol;

crate::symbols! {
    DIALECT_NAME => "linalg",
}

define_op! {
    /// Write `value` into every element of `output`.
    pub struct Fill = "linalg"."fill";
}

define_op! {
    /// `output += lhs * rhs` on rank-2 buffers.
    pub struct Matmul = "linalg"."matmul";
}

pub fn fill(ctx: &mut IrContext, location: Location, output: ValueRef, value: ValueRef) -> Fill {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("fill"))
        .operand(output)
        .operand(value)
        .create(ctx);
    Fill::wrap_unchecked(op)
}

pub fn matmul(
    ctx: &mut IrContext,
    location: Location,
    lhs: ValueRef,
    rhs: ValueRef,
    output: ValueRef,
) -> Matmul {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("matmul"))
        .operand(lhs)
        .operand(rhs)
        .operand(output)
        .create(ctx);
    Matmul::wrap_unchecked(op)
}

impl Fill {
    pub fn output(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn value(self, ctx: &IrContext) -> ValueRef {
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

    pub fn output(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[2]
    }
}
