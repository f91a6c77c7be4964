//! Type mapping and cast materialization for dialect conversion.

use crate::context::IrContext;
use crate::location::Location;
use crate::refs::{OpRef, TypeRef, ValueRef};

/// A converted value plus the detached ops that produce it.
pub struct MaterializeResult {
    pub value: ValueRef,
    pub ops: Vec<OpRef>,
}

/// Conversions may intern the target type, hence `&mut`.
type ConversionFn = dyn Fn(&mut IrContext, TypeRef) -> Option<TypeRef>;

type MaterializerFn =
    dyn Fn(&mut IrContext, Location, ValueRef, TypeRef, TypeRef) -> Option<MaterializeResult>;

/// Maps source types to target types, and builds casts between them.
#[derive(Default)]
pub struct TypeConverter {
    conversions: Vec<Box<ConversionFn>>,
    materializer: Option<Box<MaterializerFn>>,
}

impl TypeConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_conversion(
        &mut self,
        f: impl Fn(&mut IrContext, TypeRef) -> Option<TypeRef> + 'static,
    ) {
        self.conversions.push(Box::new(f));
    }

    pub fn set_materializer(
        &mut self,
        f: impl Fn(&mut IrContext, Location, ValueRef, TypeRef, TypeRef) -> Option<MaterializeResult>
        + 'static,
    ) {
        self.materializer = Some(Box::new(f));
    }

    /// First conversion that applies, or `None` if `ty` is already legal.
    pub fn convert_type(&self, ctx: &mut IrContext, ty: TypeRef) -> Option<TypeRef> {
        for conv in &self.conversions {
            if let Some(converted) = conv(ctx, ty) {
                return Some(converted);
            }
        }
        None
    }

    pub fn materialize(
        &self,
        ctx: &mut IrContext,
        location: Location,
        value: ValueRef,
        from: TypeRef,
        to: TypeRef,
    ) -> Option<MaterializeResult> {
        self.materializer.as_ref()?(ctx, location, value, from, to)
    }
}
