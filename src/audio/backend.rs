//! Audio subsystem abstraction
//!
//! The microphone is written against these two traits so the hardware
//! backend (cpal) and the deterministic fake used by tests are
//! interchangeable.

use std::fmt;

use super::microphone::{CaptureConfig, MicrophoneError};

/// Default input device resolved at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Human readable device name
    pub name: String,
    /// Native sample rate in Hz
    pub sample_rate: u32,
    /// Opaque platform index used to open a stream on this device
    pub index: usize,
}

/// What the input callback tells the backend after each buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackFlow {
    /// Keep delivering buffers
    Continue,
    /// Stop delivering buffers
    Complete,
}

/// Handler invoked on the audio thread with the raw bytes of each buffer.
pub type InputCallback = Box<dyn FnMut(&[u8]) -> CallbackFlow + Send + 'static>;

/// Lifecycle of a stream handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Opened, callback not running yet
    Created,
    /// Callback armed
    Running,
    /// Paused, can be restarted
    Stopped,
    /// Released, terminal
    Closed,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Platform audio subsystem.
#[cfg_attr(test, mockall::automock(type Stream = MockCaptureStream;))]
pub trait AudioBackend {
    /// Stream handle produced by [`open_stream`](Self::open_stream)
    type Stream: CaptureStream;

    /// Resolves the system default input device.
    ///
    /// Fails with [`MicrophoneError::NoInputDevice`] when there is none.
    fn default_input_device(&self) -> Result<DeviceInfo, MicrophoneError>;

    /// Opens a stopped input stream on `device`.
    ///
    /// `callback` runs on the audio thread for every hardware buffer.
    fn open_stream(
        &self,
        device: &DeviceInfo,
        config: &CaptureConfig,
        callback: InputCallback,
    ) -> Result<Self::Stream, MicrophoneError>;
}

/// Hardware stream control.
#[cfg_attr(test, mockall::automock)]
pub trait CaptureStream {
    /// Arms the callback.
    fn start(&mut self) -> Result<(), MicrophoneError>;

    /// Pauses the callback.
    fn stop(&mut self) -> Result<(), MicrophoneError>;

    /// Releases the stream.
    ///
    /// Must not return while a callback invocation is still running.
    fn close(&mut self) -> Result<(), MicrophoneError>;
}
