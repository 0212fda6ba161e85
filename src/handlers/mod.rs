pub mod pipeline;

pub use pipeline::{LogProgressSink, PipelineOrchestrator, Preview, ProgressSink, RunOutcome};
