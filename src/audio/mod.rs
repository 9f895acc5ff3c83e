//! Audio capture module
//!
//! Handles the default microphone and the buffering between the audio
//! callback and the application.

mod backend;
mod buffer;
mod cpal_backend;
mod fake;
mod format;
mod microphone;

pub use backend::{AudioBackend, CallbackFlow, CaptureStream, DeviceInfo, InputCallback, StreamState};
pub use buffer::{capture_buffer, CaptureBuffer, CaptureProducer};
pub use cpal_backend::{CpalBackend, CpalStream};
pub use fake::{FakeBackend, FakeDevice, FakeStream};
pub use format::SampleFormat;
pub use microphone::{CaptureConfig, Microphone, MicrophoneError};
