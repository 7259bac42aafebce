mod action;
mod chunk;
mod pipeline;
mod sink;
mod stats;
mod transform;

pub use action::{Action, ActionResult, EXCEPTION_RESULT, Operation};
pub use chunk::{Chunk, Chunker};
pub use pipeline::{BoundedPipeline, PipelineConfig, PipelineState};
pub use sink::BulkSink;
pub use stats::{StatsReporter, format_stats, group_thousands};
pub use transform::{RecordTransformer, TransformConfig};
