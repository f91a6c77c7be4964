//! The `bufferize` driver behind the CLI.
//!
//! ```text
//! Demo::build ─► print ─► bufferize_func ─► print ─► [--run] Interpreter::call
//! ```

use std::io::Write;

use derive_more::{Display, Error, From};
use tcp_ir::interp::{InterpError, Interpreter, RtValue};
use tcp_ir::printer::print_op;
use tcp_ir::{DialectOp, IrContext};
use tcp_passes::{BufferizeError, BufferizeOptions, BufferizeReport, bufferize_func};

use crate::demo::Demo;

/// One `tcp-opt bufferize` invocation.
#[derive(Clone, Debug)]
pub struct BufferizeRequest {
    pub demo: Demo,
    pub options: BufferizeOptions,
    /// Execute the lowered function and print its result.
    pub run: bool,
}

#[derive(Debug, Display, Error, From)]
pub enum PipelineError {
    #[display("I/O error: {_0}")]
    Io(std::io::Error),

    #[display("{_0}")]
    Bufferize(BufferizeError),

    #[display("execution failed: {_0}")]
    Execute(InterpError),

    /// `--run` needs concrete operand data.
    #[from(ignore)]
    #[display("cannot execute `{_0}`: every dimension must be static")]
    DynamicShape(#[error(not(source))] String),
}

/// Build the requested demo, bufferize it, and write the IR before and after
/// (and the execution result, if asked) to `out`.
pub fn run_bufferize(
    request: &BufferizeRequest,
    out: &mut impl Write,
) -> Result<BufferizeReport, PipelineError> {
    let inputs = if request.run {
        let inputs = request
            .demo
            .inputs()
            .ok_or_else(|| PipelineError::DynamicShape(request.demo.to_string()))?;
        Some(inputs)
    } else {
        None
    };

    let mut ctx = IrContext::new();
    let f = request.demo.build(&mut ctx);
    writeln!(out, "// ----- before -----")?;
    write!(out, "{}", print_op(&ctx, f.op_ref()))?;

    let report = bufferize_func(&mut ctx, f.op_ref(), &request.options)?;
    writeln!(
        out,
        "// ----- after: {} rewrite(s) in {} iteration(s) -----",
        report.rewrites, report.iterations
    )?;
    write!(out, "{}", print_op(&ctx, f.op_ref()))?;

    if let Some(inputs) = inputs {
        let mut interp = Interpreter::new(&ctx);
        let mut args: Vec<RtValue> = inputs
            .buffers
            .into_iter()
            .map(|buffer| interp.add_buffer(buffer))
            .collect();
        args.extend(inputs.shape.map(RtValue::Shape));
        for value in interp.call(f, args)? {
            match interp.buffer(&value) {
                Some(buffer) => writeln!(out, "// result: {buffer}")?,
                None => writeln!(out, "// result: {value:?}")?,
            }
        }
    }
    Ok(report)
}
