//! Demo functions the CLI bufferizes.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use derive_more::{Display, Error};
use tcp_ir::dialect::{core, func, shape, tcp};
use tcp_ir::interp::Buffer;
use tcp_ir::{DialectOp, Dim, IrContext, Symbol};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DemoKind {
    /// `tcp.broadcast_to` of one operand to a runtime shape
    Broadcast,
    /// `tcp.matmul` of two 2-D operands
    Matmul,
}

/// Comma-separated dimension list. `?` marks a dynamic dimension and the
/// empty string is rank 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeSpec(pub Vec<Dim>);

#[derive(Clone, Debug, Display, Error, PartialEq, Eq)]
#[display("invalid dimension `{text}`: expected an extent or `?`")]
pub struct ShapeParseError {
    text: String,
}

impl FromStr for ShapeSpec {
    type Err = ShapeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(ShapeSpec(Vec::new()));
        }
        s.split(',')
            .map(|part| match part.trim() {
                "?" => Ok(Dim::Dynamic),
                text => text.parse().map(Dim::Static).map_err(|_| ShapeParseError {
                    text: text.to_owned(),
                }),
            })
            .collect::<Result<_, _>>()
            .map(ShapeSpec)
    }
}

impl fmt::Display for ShapeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, dim) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{dim}")?;
        }
        f.write_str("]")
    }
}

impl ShapeSpec {
    /// Concrete extents, or `None` if any dimension is dynamic.
    pub fn extents(&self) -> Option<Vec<usize>> {
        self.0
            .iter()
            .map(|dim| match dim {
                Dim::Static(n) => usize::try_from(*n).ok(),
                Dim::Dynamic => None,
            })
            .collect()
    }
}

/// A function to bufferize, described by its operand shapes.
#[derive(Clone, Debug, PartialEq, Eq, Display)]
pub enum Demo {
    #[display("broadcast {input} -> {output}")]
    Broadcast { input: ShapeSpec, output: ShapeSpec },
    #[display("matmul {lhs} x {rhs}")]
    Matmul { lhs: ShapeSpec, rhs: ShapeSpec },
}

/// Arguments for executing a built demo function.
#[derive(Clone, Debug, PartialEq)]
pub struct DemoInputs {
    pub buffers: Vec<Buffer>,
    /// Trailing `!shape.shape` argument, if the function takes one.
    pub shape: Option<Vec<usize>>,
}

impl Demo {
    /// Build the tensor-level function in `ctx`.
    pub fn build(&self, ctx: &mut IrContext) -> func::Func {
        let location = ctx.file_location("demo.tcp");
        let f32 = core::f32(ctx);
        match self {
            Demo::Broadcast { input, output } => {
                let input_ty = core::tensor(ctx, f32, &input.0);
                let output_ty = core::tensor(ctx, f32, &output.0);
                let shape_ty = shape::shape_type(ctx);
                let f = func::func(ctx, location, Symbol::new("broadcast"), [input_ty, shape_ty]);
                let params = f.params(ctx);
                let op = tcp::broadcast_to(ctx, location, params[0], params[1], output_ty);
                finish(ctx, f, op)
            }
            Demo::Matmul { lhs, rhs } => {
                let lhs_ty = core::tensor(ctx, f32, &lhs.0);
                let rhs_ty = core::tensor(ctx, f32, &rhs.0);
                let rows = lhs.0.first().copied().unwrap_or(Dim::Dynamic);
                let cols = rhs.0.get(1).copied().unwrap_or(Dim::Dynamic);
                let result_ty = core::tensor(ctx, f32, &[rows, cols]);
                let f = func::func(ctx, location, Symbol::new("matmul"), [lhs_ty, rhs_ty]);
                let params = f.params(ctx);
                let op = tcp::matmul(ctx, location, params[0], params[1], result_ty);
                finish(ctx, f, op)
            }
        }
    }

    /// Deterministic `0, 1, 2, ...` operands, or `None` when a shape is dynamic.
    pub fn inputs(&self) -> Option<DemoInputs> {
        match self {
            Demo::Broadcast { input, output } => Some(DemoInputs {
                buffers: vec![iota(input.extents()?)],
                shape: Some(output.extents()?),
            }),
            Demo::Matmul { lhs, rhs } => Some(DemoInputs {
                buffers: vec![iota(lhs.extents()?), iota(rhs.extents()?)],
                shape: None,
            }),
        }
    }
}

fn finish(ctx: &mut IrContext, f: func::Func, op: impl DialectOp) -> func::Func {
    let location = op.location(ctx);
    let value = op.result(ctx);
    let ret = func::r#return(ctx, location, [value]);
    f.push(ctx, op.op_ref());
    f.push(ctx, ret.op_ref());
    f
}

fn iota(dims: Vec<usize>) -> Buffer {
    let len = dims.iter().product::<usize>();
    Buffer::new(dims, (0..len).map(|i| i as f64).collect())
}
