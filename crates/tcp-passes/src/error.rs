use derive_more::{Display, Error};
use tcp_ir::Symbol;
use tcp_ir::rewrite::ConversionFailure;

/// Fatal failure of the bufferization pass for one compilation unit.
#[derive(Debug, Display, Error)]
pub enum BufferizeError {
    #[display("failed to bufferize `{func}`: {source}")]
    ConversionFailed {
        func: Symbol,
        source: ConversionFailure,
    },
    #[display("expected `func.func`, found `{op}`")]
    NotAFunction { op: String },
    #[display("expected `core.module`, found `{op}`")]
    NotAModule { op: String },
}
