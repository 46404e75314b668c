//! Concurrent conversion of a record stream into a container.

pub mod orchestrator;
pub mod queue;
pub mod source;

pub use orchestrator::{Pipeline, PipelineReport, PipelineState};
pub use queue::{QueueReader, QueueWriter, RecordQueue};
pub use source::{IterSource, RecordSource, SourceDescriptor};
