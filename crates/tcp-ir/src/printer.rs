//! MLIR-flavoured text output.
//!
//! ```text
//! func.func @broadcast(%0: tensor<1x4xf32>, %1: !shape.shape) {
//!   %2 = tcp.broadcast_to %0, %1 : tensor<?x?xf32>
//!   func.return %2
//! }
//! ```
//!
//! Values are numbered in definition order, so two structurally equal
//! functions print identically.

use std::collections::HashMap;
use std::fmt::{self, Write};

use crate::context::IrContext;
use crate::refs::{OpRef, RegionRef, TypeRef, ValueRef};
use crate::symbol::Symbol;
use crate::types::{Attribute, ShapedKind, ShapedType};

struct Printer<'a> {
    ctx: &'a IrContext,
    names: HashMap<ValueRef, usize>,
}

impl<'a> Printer<'a> {
    fn new(ctx: &'a IrContext) -> Self {
        Self {
            ctx,
            names: HashMap::new(),
        }
    }

    fn define(&mut self, v: ValueRef) -> usize {
        let next = self.names.len();
        *self.names.entry(v).or_insert(next)
    }

    fn value(&self, f: &mut impl Write, v: ValueRef) -> fmt::Result {
        match self.names.get(&v) {
            Some(n) => write!(f, "%{n}"),
            None => f.write_str("%?"),
        }
    }

    fn op(&mut self, f: &mut impl Write, op: OpRef, indent: usize) -> fmt::Result {
        let ctx = self.ctx;
        let data = ctx.op(op);
        let pad = " ".repeat(indent);
        f.write_str(&pad)?;

        if data.dialect == "func" && data.name == "func" {
            return self.func(f, op, indent);
        }

        let results = ctx.op_results(op);
        if !results.is_empty() {
            for (i, &v) in results.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                let n = self.define(v);
                write!(f, "%{n}")?;
            }
            f.write_str(" = ")?;
        }
        write!(f, "{}.{}", data.dialect, data.name)?;

        for (i, &v) in ctx.op_operands(op).iter().enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            self.value(f, v)?;
        }

        if !data.attributes.is_empty() {
            f.write_str(" {")?;
            for (i, (key, val)) in data.attributes.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{key} = ")?;
                write_attribute(ctx, f, val)?;
            }
            f.write_char('}')?;
        }

        let types = ctx.op_result_types(op);
        if !types.is_empty() {
            f.write_str(" : ")?;
            for (i, &ty) in types.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_type(ctx, f, ty)?;
            }
        }

        for &region in &data.regions {
            f.write_str(" {\n")?;
            self.region(f, region, indent)?;
            write!(f, "{pad}}}")?;
        }
        f.write_char('\n')
    }

    fn func(&mut self, f: &mut impl Write, op: OpRef, indent: usize) -> fmt::Result {
        let ctx = self.ctx;
        let data = ctx.op(op);
        f.write_str("func.func")?;
        if let Some(Attribute::Symbol(name)) = data.attributes.get(&Symbol::new("sym_name")) {
            write!(f, " @{name}")?;
        }
        let Some(&body) = data.regions.first() else {
            return f.write_char('\n');
        };
        let entry = ctx.region(body).blocks[0];
        f.write_char('(')?;
        for (i, &arg) in ctx.block_args(entry).iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let n = self.define(arg);
            write!(f, "%{n}: ")?;
            write_type(ctx, f, ctx.value_ty(arg))?;
        }
        f.write_str(") {\n")?;
        for &inner in &ctx.block(entry).ops {
            self.op(f, inner, indent + 2)?;
        }
        writeln!(f, "{}}}", " ".repeat(indent))
    }

    fn region(&mut self, f: &mut impl Write, region: RegionRef, indent: usize) -> fmt::Result {
        let ctx = self.ctx;
        for (b, &block) in ctx.region(region).blocks.iter().enumerate() {
            let args = ctx.block_args(block);
            if !args.is_empty() {
                write!(f, "{}^bb{b}(", " ".repeat(indent))?;
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    let n = self.define(arg);
                    write!(f, "%{n}: ")?;
                    write_type(ctx, f, ctx.value_ty(arg))?;
                }
                f.write_str("):\n")?;
            }
            for &op in &ctx.block(block).ops {
                self.op(f, op, indent + 2)?;
            }
        }
        Ok(())
    }
}

/// Print an operation and everything nested in it.
pub fn print_op(ctx: &IrContext, op: OpRef) -> String {
    let mut out = String::new();
    Printer::new(ctx)
        .op(&mut out, op, 0)
        .expect("fmt::Write to String never fails");
    out
}

pub fn print_type(ctx: &IrContext, ty: TypeRef) -> String {
    let mut out = String::new();
    write_type(ctx, &mut out, ty).expect("fmt::Write to String never fails");
    out
}

fn write_type(ctx: &IrContext, f: &mut impl Write, ty: TypeRef) -> fmt::Result {
    if let Some(shaped) = ShapedType::decode(&ctx.types, ty) {
        f.write_str(match shaped.kind {
            ShapedKind::Tensor => "tensor<",
            ShapedKind::MemRef => "memref<",
        })?;
        for dim in &shaped.dims {
            write!(f, "{dim}x")?;
        }
        write_type(ctx, f, shaped.element)?;
        return f.write_char('>');
    }
    let data = ctx.types.get(ty);
    if data.dialect == "core" {
        write!(f, "{}", data.name)
    } else {
        write!(f, "!{}.{}", data.dialect, data.name)
    }
}

fn write_attribute(ctx: &IrContext, f: &mut impl Write, attr: &Attribute) -> fmt::Result {
    match attr {
        Attribute::Unit => f.write_str("unit"),
        Attribute::Bool(b) => write!(f, "{b}"),
        Attribute::IntBits(v) => write!(f, "{}", *v as i64),
        Attribute::FloatBits(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
        Attribute::String(s) => write!(f, "{s:?}"),
        Attribute::Type(ty) => write_type(ctx, f, *ty),
        Attribute::Symbol(sym) => write!(f, "@{sym}"),
        Attribute::List(items) => {
            f.write_char('[')?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_attribute(ctx, f, item)?;
            }
            f.write_char(']')
        }
        Attribute::Location(loc) => {
            write!(f, "loc({:?} {}:{})", ctx.paths.get(loc.path), loc.span.start, loc.span.end)
        }
    }
}
