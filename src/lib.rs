pub mod demo;
pub mod pipeline;

pub use crate::demo::{Demo, DemoKind, ShapeSpec};
pub use crate::pipeline::{BufferizeRequest, PipelineError, run_bufferize};
