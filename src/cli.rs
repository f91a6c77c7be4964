//! Command-line interface for `tcp-opt`.

use clap::{Args, Parser, Subcommand};
use tcp_ir::rewrite::ConversionMode;
use tcp_opt::{BufferizeRequest, Demo, DemoKind, ShapeSpec};
use tcp_passes::BufferizeOptions;

#[derive(Parser)]
#[command(name = "tcp-opt")]
#[command(about = "Lower tcp tensor operations to buffers and loops", long_about = None)]
pub struct Cli {
    /// Log every pattern application (`debug` level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Bufferize a demo function and print the IR before and after
    Bufferize(BufferizeArgs),
}

#[derive(Args)]
pub struct BufferizeArgs {
    #[arg(value_enum)]
    pub demo: DemoKind,

    /// Operand shape of `broadcast`, e.g. `1,4` or `?,4`
    #[arg(long, default_value = "1,4")]
    pub input_shape: ShapeSpec,

    /// Result shape of `broadcast`
    #[arg(long, default_value = "3,4")]
    pub output_shape: ShapeSpec,

    /// Left operand shape of `matmul`
    #[arg(long, default_value = "2,3")]
    pub lhs_shape: ShapeSpec,

    /// Right operand shape of `matmul`
    #[arg(long, default_value = "3,2")]
    pub rhs_shape: ShapeSpec,

    /// Fail on any op without a legality rule
    #[arg(long)]
    pub full: bool,

    #[arg(long, default_value_t = 10)]
    pub max_iterations: usize,

    /// Execute the lowered function on `0, 1, 2, ...` operands
    #[arg(long)]
    pub run: bool,
}

impl BufferizeArgs {
    pub fn into_request(self) -> BufferizeRequest {
        let demo = match self.demo {
            DemoKind::Broadcast => Demo::Broadcast {
                input: self.input_shape,
                output: self.output_shape,
            },
            DemoKind::Matmul => Demo::Matmul {
                lhs: self.lhs_shape,
                rhs: self.rhs_shape,
            },
        };
        let mode = if self.full {
            ConversionMode::Full
        } else {
            ConversionMode::Partial
        };
        BufferizeRequest {
            demo,
            options: BufferizeOptions {
                mode,
                max_iterations: self.max_iterations,
                ..BufferizeOptions::default()
            },
            run: self.run,
        }
    }
}
