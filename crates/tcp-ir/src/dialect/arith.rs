//! Scalar constants, comparisons and selection.

use crate::context::{IrContext, OperationDataBuilder};
use crate::define_op;
use crate::dialect::core;
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

crate::symbols! {
    DIALECT_NAME => "arith",
    ATTR_VALUE => "value",
}

define_op! {
    pub struct Constant = "arith"."constant";
}

define_op! {
    pub struct CmpEq = "arith"."cmp_eq";
}

define_op! {
    pub struct CmpNe = "arith"."cmp_ne";
}

define_op! {
    /// `cond ? on_true : on_false`
    pub struct Select = "arith"."select";
}

pub fn constant(
    ctx: &mut IrContext,
    location: Location,
    ty: TypeRef,
    value: Attribute,
) -> Constant {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("constant"))
        .attr(ATTR_VALUE(), value)
        .result(ty)
        .create(ctx);
    Constant::wrap_unchecked(op)
}

pub fn const_index(ctx: &mut IrContext, location: Location, value: i64) -> Constant {
    let index_ty = core::index(ctx);
    constant(ctx, location, index_ty, Attribute::from(value))
}

fn compare(
    ctx: &mut IrContext,
    location: Location,
    name: &'static str,
    lhs: ValueRef,
    rhs: ValueRef,
) -> crate::OpRef {
    let i1 = core::i1(ctx);
    OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new(name))
        .operand(lhs)
        .operand(rhs)
        .result(i1)
        .create(ctx)
}

pub fn cmp_eq(ctx: &mut IrContext, location: Location, lhs: ValueRef, rhs: ValueRef) -> CmpEq {
    CmpEq::wrap_unchecked(compare(ctx, location, "cmp_eq", lhs, rhs))
}

pub fn cmp_ne(ctx: &mut IrContext, location: Location, lhs: ValueRef, rhs: ValueRef) -> CmpNe {
    CmpNe::wrap_unchecked(compare(ctx, location, "cmp_ne", lhs, rhs))
}

pub fn select(
    ctx: &mut IrContext,
    location: Location,
    cond: ValueRef,
    on_true: ValueRef,
    on_false: ValueRef,
) -> Select {
    let ty = ctx.value_ty(on_true);
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("select"))
        .operand(cond)
        .operand(on_true)
        .operand(on_false)
        .result(ty)
        .create(ctx);
    Select::wrap_unchecked(op)
}

impl Constant {
    pub fn value(self, ctx: &IrContext) -> Attribute {
        ctx.attr(self.0, ATTR_VALUE())
            .cloned()
            .unwrap_or(Attribute::Unit)
    }
}
