//! Functions and returns.

use smallvec::SmallVec;

use crate::context::{IrContext, OperationDataBuilder};
use crate::define_op;
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, OpRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::Attribute;

crate::symbols! {
    DIALECT_NAME => "func",
    ATTR_SYM_NAME => "sym_name",
}

define_op! {
    /// A function; parameters are the entry block's arguments.
    pub struct Func = "func"."func";
}

define_op! {
    pub struct Return = "func"."return";
}

/// Create a function with an empty entry block taking `params`.
pub fn func(
    ctx: &mut IrContext,
    location: Location,
    name: Symbol,
    params: impl IntoIterator<Item = TypeRef>,
) -> Func {
    let entry = ctx.create_block_with_args(location, params);
    let body = ctx.region_of_block(location, entry);
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("func"))
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(name))
        .region(body)
        .create(ctx);
    Func::wrap_unchecked(op)
}

pub fn r#return(
    ctx: &mut IrContext,
    location: Location,
    values: impl IntoIterator<Item = ValueRef>,
) -> Return {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("return"))
        .operands(values)
        .create(ctx);
    Return::wrap_unchecked(op)
}

impl Func {
    pub fn name(self, ctx: &IrContext) -> Symbol {
        match ctx.attr(self.0, ATTR_SYM_NAME()) {
            Some(Attribute::Symbol(s)) => *s,
            _ => Symbol::new("<anonymous>"),
        }
    }

    pub fn body(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    pub fn entry_block(self, ctx: &IrContext) -> BlockRef {
        ctx.region(self.body(ctx)).blocks[0]
    }

    pub fn params(self, ctx: &IrContext) -> SmallVec<[ValueRef; 4]> {
        ctx.block_args(self.entry_block(ctx)).into()
    }

    /// Append `op` to the entry block.
    pub fn push(self, ctx: &mut IrContext, op: OpRef) {
        let entry = self.entry_block(ctx);
        ctx.push_op(entry, op);
    }

    /// The terminating `func.return`, if the entry block has one.
    pub fn terminator(self, ctx: &IrContext) -> Option<Return> {
        let last = *ctx.block(self.entry_block(ctx)).ops.last()?;
        Return::from_op(ctx, last).ok()
    }
}

impl Return {
    pub fn values(self, ctx: &IrContext) -> &[ValueRef] {
        ctx.op_operands(self.0)
    }
}
