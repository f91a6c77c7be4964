//! Builtin scalar and shaped types, and the `core.module` container.

use smallvec::SmallVec;

use crate::context::{IrContext, OperationDataBuilder};
use crate::define_op;
use crate::dialect::func;
use crate::location::Location;
use crate::ops::DialectOp;
use crate::refs::{BlockRef, RegionRef, TypeRef};
use crate::symbol::Symbol;
use crate::types::{Attribute, Dim, ShapedType, TypeDataBuilder};

crate::symbols! {
    DIALECT_NAME => "core",
    ATTR_SYM_NAME => "sym_name",
}

fn scalar(ctx: &mut IrContext, name: &'static str) -> TypeRef {
    ctx.types
        .intern(TypeDataBuilder::new(DIALECT_NAME(), Symbol::new(name)).build())
}

pub fn f32(ctx: &mut IrContext) -> TypeRef {
    scalar(ctx, "f32")
}

pub fn f64(ctx: &mut IrContext) -> TypeRef {
    scalar(ctx, "f64")
}

pub fn i32(ctx: &mut IrContext) -> TypeRef {
    scalar(ctx, "i32")
}

pub fn i1(ctx: &mut IrContext) -> TypeRef {
    scalar(ctx, "i1")
}

pub fn index(ctx: &mut IrContext) -> TypeRef {
    scalar(ctx, "index")
}

pub fn tensor(ctx: &mut IrContext, element: TypeRef, dims: &[Dim]) -> TypeRef {
    ShapedType::tensor(element, dims.iter().copied()).intern(&mut ctx.types)
}

pub fn memref(ctx: &mut IrContext, element: TypeRef, dims: &[Dim]) -> TypeRef {
    ShapedType::memref(element, dims.iter().copied()).intern(&mut ctx.types)
}

/// `core.f32` or `core.f64`.
pub fn is_float(ctx: &IrContext, ty: TypeRef) -> bool {
    let data = ctx.types.get(ty);
    data.dialect == DIALECT_NAME() && (data.name == "f32" || data.name == "f64")
}

/// Zero of a scalar element type, as a constant attribute.
pub fn zero_attr(ctx: &IrContext, ty: TypeRef) -> Attribute {
    if is_float(ctx, ty) {
        Attribute::float(0.0)
    } else {
        Attribute::IntBits(0)
    }
}

define_op! {
    /// Top-level container whose single block holds `func.func` ops.
    pub struct Module = "core"."module";
}

/// Create an empty module with one body block.
pub fn module(ctx: &mut IrContext, location: Location, name: Symbol) -> Module {
    let block = ctx.create_block_with_args(location, []);
    let region = ctx.region_of_block(location, block);
    let op = OperationDataBuilder::new(location, DIALECT_NAME(), Symbol::new("module"))
        .attr(ATTR_SYM_NAME(), Attribute::Symbol(name))
        .region(region)
        .create(ctx);
    Module::wrap_unchecked(op)
}

impl Module {
    pub fn body(self, ctx: &IrContext) -> RegionRef {
        ctx.op(self.0).regions[0]
    }

    pub fn block(self, ctx: &IrContext) -> BlockRef {
        ctx.region(self.body(ctx)).blocks[0]
    }

    pub fn name(self, ctx: &IrContext) -> Option<Symbol> {
        match ctx.attr(self.0, ATTR_SYM_NAME()) {
            Some(Attribute::Symbol(s)) => Some(*s),
            _ => None,
        }
    }

    /// Functions directly in the module body, in order.
    pub fn funcs(self, ctx: &IrContext) -> SmallVec<[func::Func; 4]> {
        ctx.block(self.block(ctx))
            .ops
            .iter()
            .filter_map(|&op| func::Func::from_op(ctx, op).ok())
            .collect()
    }

    pub fn push_func(self, ctx: &mut IrContext, f: func::Func) {
        let block = self.block(ctx);
        ctx.push_op(block, f.op_ref());
    }
}
