//! tewn - microphone capture for a chromatic tuner
//!
//! Captures raw integer samples from the default input device and exposes
//! them as decoded frames for downstream analysis.

pub mod audio;
pub mod cli;
pub mod pipeline;
