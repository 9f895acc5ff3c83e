//! Background consumer for captured audio
//!
//! Periodically drains the capture buffer and broadcasts decoded frames.

mod realtime;

pub use realtime::{FrameBatch, FramePipeline, PipelineConfig, PipelineError, PipelineStatus};
