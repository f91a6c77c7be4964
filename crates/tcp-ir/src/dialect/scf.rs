//! Structured loops.

use crate::context::{IrContext, OperationDataBuilder};
use crate::define_op;
use crate::dialect::core;
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, ValueRef};
use crate::symbol::Symbol;

crate::symbols! {
    DIALECT_NAME => "scf",
}

define_op! {
    /// `for %iv = lower to upper step step { ... scf.yield }`
    pub struct For = "scf"."for";
}

define_op! {
    pub struct Yield = "scf"."yield";
}

/// Create a loop whose body holds only its `scf.yield` terminator.
pub fn r#for(
    ctx: &mut IrContext,
    location: Location,
    lower: ValueRef,
    upper: ValueRef,
    step: ValueRef,
) -> For {
    let index_ty = core::index(ctx);
    let body = ctx.create_block_with_args(location, [index_ty]);
    let terminator = r#yield(ctx, location);
    ctx.push_op(body, terminator.op_ref());
    let region = ctx.region_of_block(location, body);
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("for"))
        .operand(lower)
        .operand(upper)
        .operand(step)
        .region(region)
        .create(ctx);
    For::wrap_unchecked(op)
}

pub fn r#yield(ctx: &mut IrContext, location: Location) -> Yield {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("yield")).create(ctx);
    Yield::wrap_unchecked(op)
}

impl For {
    pub fn lower(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn upper(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }

    pub fn step(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[2]
    }

    pub fn body(self, ctx: &IrContext) -> BlockRef {
        ctx.region(ctx.op(self.0).regions[0]).blocks[0]
    }

    pub fn induction_var(self, ctx: &IrContext) -> ValueRef {
        ctx.block_arg(self.body(ctx), 0)
    }

    /// Insert `op` at the end of the body, before the terminator.
    pub fn push(self, ctx: &mut IrContext, op: OpRef) {
        let body = self.body(ctx);
        match ctx.block(body).ops.last().copied() {
            Some(term) if Yield::matches(ctx, term) => ctx.insert_op_before(body, term, op),
            _ => ctx.push_op(body, op),
        }
    }
}
