//! Runtime shape values and extent queries.

use crate::context::{IrContext, OperationDataBuilder};
use crate::define_op;
use crate::dialect::core;
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::{Attribute, TypeDataBuilder};

crate::symbols! {
    DIALECT_NAME => "shape",
    ATTR_INDEX => "index",
    ATTR_EXTENTS => "extents",
}

/// `shape.shape`: a runtime list of `index` extents.
pub fn shape_type(ctx: &mut IrContext) -> TypeRef {
    ctx.types
        .intern(TypeDataBuilder::new(DIALECT_NAME(), Symbol::new("shape")).build())
}

define_op! {
    /// Extent of dimension `index` of a tensor or buffer.
    pub struct Dim = "shape"."dim";
}

define_op! {
    /// Package `index` extents into a shape value.
    pub struct FromExtents = "shape"."from_extents";
}

define_op! {
    /// Shape with compile-time extents.
    pub struct ConstShape = "shape"."const_shape";
}

define_op! {
    /// Extent at a runtime dimension index of a shape value.
    pub struct GetExtent = "shape"."get_extent";
}

pub fn dim(ctx: &mut IrContext, location: Location, source: ValueRef, index: u64) -> Dim {
    let index_ty = core::index(ctx);
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("dim"))
        .operand(source)
        .attr(ATTR_INDEX(), Attribute::IntBits(index))
        .result(index_ty)
        .create(ctx);
    Dim::wrap_unchecked(op)
}

pub fn from_extents(
    ctx: &mut IrContext,
    location: Location,
    extents: impl IntoIterator<Item = ValueRef>,
) -> FromExtents {
    let shape_ty = shape_type(ctx);
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("from_extents"))
        .operands(extents)
        .result(shape_ty)
        .create(ctx);
    FromExtents::wrap_unchecked(op)
}

pub fn const_shape(ctx: &mut IrContext, location: Location, extents: &[u64]) -> ConstShape {
    let shape_ty = shape_type(ctx);
    let extents = extents.iter().map(|&e| Attribute::IntBits(e)).collect();
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("const_shape"))
        .attr(ATTR_EXTENTS(), Attribute::List(extents))
        .result(shape_ty)
        .create(ctx);
    ConstShape::wrap_unchecked(op)
}

pub fn get_extent(
    ctx: &mut IrContext,
    location: Location,
    shape: ValueRef,
    dim: ValueRef,
) -> GetExtent {
    let index_ty = core::index(ctx);
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("get_extent"))
        .operand(shape)
        .operand(dim)
        .result(index_ty)
        .create(ctx);
    GetExtent::wrap_unchecked(op)
}

impl Dim {
    pub fn source(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn index(self, ctx: &IrContext) -> Option<u64> {
        match ctx.attr(self.0, ATTR_INDEX()) {
            Some(Attribute::IntBits(i)) => Some(*i),
            _ => None,
        }
    }
}

impl FromExtents {
    pub fn extents(self, ctx: &IrContext) -> &[ValueRef] {
        ctx.op_operands(self.0)
    }
}

impl ConstShape {
    pub fn extents(self, ctx: &IrContext) -> Option<Vec<u64>> {
        match ctx.attr(self.0, ATTR_EXTENTS())? {
            Attribute::List(items) => items
                .iter()
                .map(|a| match a {
                    Attribute::IntBits(e) => Some(*e),
                    _ => None,
                })
                .collect(),
            _ => None,
        }
    }
}

impl GetExtent {
    pub fn shape(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[0]
    }

    pub fn dim(self, ctx: &IrContext) -> ValueRef {
        ctx.op_operands(self.0)[1]
    }
}
