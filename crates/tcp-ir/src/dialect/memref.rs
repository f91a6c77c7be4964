//! Mutable buffers.

use crate::context::{IrContext, OperationDataBuilder};
use crate::define_op;
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{TypeRef, ValueRef};
use crate::symbol::Symbol;

crate::symbols! {
    DIALECT_NAME => "memref",
}

define_op! {
    /// Allocate a buffer whose extents come from a runtime shape value.
    pub struct Alloc = "memref"."alloc";
}

define_op! {
    pub struct Load = "memref"."load";
}

define_op! {
    pub struct Store = "memref"."store";
}

define_op! {
    /// View a tensor value as a buffer of the same element type and dims.
    pub struct BufferCast = "memref"."buffer_cast";
}

pub fn alloc(ctx: &mut IrContext, location: Location, shape: ValueRef, ty: TypeRef) -> Alloc {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("alloc"))
        .operand(shape)
        .result(ty)
        .create(ctx);
    Alloc::wrap_unchecked(op)
}

/// Load one element of type `element` from `buffer`.
pub fn load(
    ctx: &mut IrContext,
    location: Location,
    buffer: ValueRef,
    indices: impl IntoIterator<Item = ValueRef>,
    element: TypeRef,
) -> Load {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("load"))
        .operand(buffer)
        .operands(indices)
        .result(element)
        .create(ctx);
    Load::wrap_unchecked(op)
}

pub fn store(
    ctx: &mut IrContext,
    location: Location,
    value: ValueRef,
    buffer: ValueRef,
    indices: impl IntoIterator<Item = ValueRef>,
) -> Store {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("store"))
        .operand(value)
        .operand(buffer)
        .operands(indices)
        .create(ctx);
    Store::wrap_unchecked(op)
}

pub fn buffer_cast(
    ctx: &mut IrContext,
    location: Location,
    tensor: ValueRef,
    ty: TypeRef,
) -> BufferCast {
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("buffer_cast"))
        .operand(tensor)
        .result(ty)
        .create(ctx);
    BufferCast::wrap_unchecked(op)
}

impl Alloc {
    pub fn shape(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }
}

impl Load {
    pub fn buffer(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn indices(self, ctx: &IrContext) -> &[ValueRef] {
        &ctx.op_operands(self.0)[1..]
    }
}

impl Store {
    pub fn value(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn buffer(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }

    pub fn indices(self, ctx: &IrContext) -> &[ValueRef] {
        &ctx.op_operands(self.0)[2..]
    }
}

impl BufferCast {
    pub fn source(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }
}
