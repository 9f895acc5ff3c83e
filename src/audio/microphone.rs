//! Capture from the default microphone
//!
//! `Microphone` owns the audio backend and the single input stream opened on
//! the default device. The stream callback only appends raw bytes to the
//! capture buffer; decoding happens on the consumer side.

use std::fmt;
use thiserror::Error;

use super::backend::{AudioBackend, CallbackFlow, CaptureStream, DeviceInfo, StreamState};
use super::buffer::{capture_buffer, CaptureBuffer};
use super::cpal_backend::CpalBackend;
use super::format::SampleFormat;

/// Audio configuration for capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample encoding requested from the device
    pub format: SampleFormat,
    /// Number of channels (1 = mono)
    pub channels: u16,
    /// Frames delivered per callback invocation
    pub frames_per_buffer: u32,
    /// Capacity of the capture ring in bytes
    pub buffer_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            format: SampleFormat::Int32,
            channels: 1,
            frames_per_buffer: 1024,
            buffer_capacity: 1 << 20, // ~6s of i32 mono at 44.1kHz
        }
    }
}

/// Microphone capture errors
#[derive(Error, Debug)]
pub enum MicrophoneError {
    #[error("Couldn't get default input device info.")]
    NoInputDevice,

    #[error("Couldn't query input device configuration: {0}")]
    DeviceConfig(String),

    #[error("Couldn't open input stream: {0}")]
    StreamOpen(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Cannot {operation} while the stream is {state}")]
    InvalidState {
        operation: &'static str,
        state: StreamState,
    },
}

/// Default input device together with its capture stream
pub struct Microphone<B: AudioBackend = CpalBackend> {
    device: DeviceInfo,
    config: CaptureConfig,
    buffer: CaptureBuffer,
    stream: Option<B::Stream>,
    state: StreamState,
    // Declared last: the stream is always released before the subsystem.
    backend: Option<B>,
}

impl Microphone<CpalBackend> {
    /// Opens the default input device of the default host
    pub fn new() -> Result<Self, MicrophoneError> {
        Self::with_backend(CpalBackend::new(), CaptureConfig::default())
    }
}

impl<B: AudioBackend> Microphone<B> {
    /// Resolves the default device of `backend` and opens a stopped stream on it.
    ///
    /// On error the backend is dropped and nothing stays open.
    pub fn with_backend(backend: B, config: CaptureConfig) -> Result<Self, MicrophoneError> {
        let device = backend.default_input_device()?;

        tracing::info!(
            device = %device.name,
            sample_rate = device.sample_rate,
            format = %config.format,
            "Input device resolved"
        );

        let (mut producer, buffer) = capture_buffer(config.format, config.buffer_capacity);

        let stream = backend.open_stream(
            &device,
            &config,
            Box::new(move |bytes: &[u8]| {
                producer.append(bytes);
                CallbackFlow::Continue
            }),
        )?;

        Ok(Self {
            device,
            config,
            buffer,
            stream: Some(stream),
            state: StreamState::Created,
            backend: Some(backend),
        })
    }

    /// Starts receiving data from the input
    pub fn start_listening(&mut self) -> Result<(), MicrophoneError> {
        match self.state {
            StreamState::Created | StreamState::Stopped => {}
            state => {
                return Err(MicrophoneError::InvalidState {
                    operation: "start listening",
                    state,
                })
            }
        }

        self.stream_mut("start listening")?.start()?;
        self.state = StreamState::Running;
        tracing::info!(device = %self.device.name, "Capture started");
        Ok(())
    }

    /// Pauses capture without releasing the stream
    pub fn pause(&mut self) -> Result<(), MicrophoneError> {
        if self.state != StreamState::Running {
            return Err(MicrophoneError::InvalidState {
                operation: "pause",
                state: self.state,
            });
        }

        self.stream_mut("pause")?.stop()?;
        self.state = StreamState::Stopped;
        tracing::info!("Capture paused");
        Ok(())
    }

    /// Stops the stream, closes it and releases the audio subsystem.
    ///
    /// The microphone is closed afterwards even if a step failed; the first
    /// error is returned.
    pub fn stop_and_release(&mut self) -> Result<(), MicrophoneError> {
        if self.state == StreamState::Closed {
            return Err(MicrophoneError::InvalidState {
                operation: "release",
                state: self.state,
            });
        }

        let result = self.release();
        tracing::info!("Capture stopped and released");
        result
    }

    fn release(&mut self) -> Result<(), MicrophoneError> {
        let mut result = Ok(());

        if let Some(mut stream) = self.stream.take() {
            if self.state == StreamState::Running {
                result = stream.stop();
            }
            let closed = stream.close();
            if result.is_ok() {
                result = closed;
            }
        }

        self.backend = None;
        self.state = StreamState::Closed;
        result
    }

    fn stream_mut(&mut self, operation: &'static str) -> Result<&mut B::Stream, MicrophoneError> {
        let state = self.state;
        self.stream
            .as_mut()
            .ok_or(MicrophoneError::InvalidState { operation, state })
    }

    /// Decodes and clears the samples received so far
    pub fn frames(&self) -> Vec<i32> {
        self.buffer.drain_frames()
    }

    /// Consumer handle on the capture buffer, usable from another thread
    pub fn buffer(&self) -> CaptureBuffer {
        self.buffer.clone()
    }

    /// Resolved input device
    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    /// Name of the default device
    pub fn device_name(&self) -> &str {
        &self.device.name
    }

    /// Native sample rate of the device in Hz
    pub fn sample_rate(&self) -> u32 {
        self.device.sample_rate
    }

    /// Size of one sample in bytes
    pub fn sample_size(&self) -> usize {
        self.config.format.sample_size()
    }

    /// Current stream state
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Capture configuration in use
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Short description for diagnostics
    pub fn device_label(&self) -> String {
        format!("{} at {} Hz", self.device.name, self.device.sample_rate)
    }
}

impl<B: AudioBackend> fmt::Display for Microphone<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Microphone: {}>", self.device_label())
    }
}

impl<B: AudioBackend> fmt::Debug for Microphone<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Microphone")
            .field("device", &self.device)
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<B: AudioBackend> Drop for Microphone<B> {
    fn drop(&mut self) {
        if self.state != StreamState::Closed {
            if let Err(e) = self.release() {
                tracing::error!("Failed to release microphone: {}", e);
            }
        }
    }
}
