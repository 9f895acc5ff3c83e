//! Deterministic in-memory audio backend
//!
//! Lets tests and headless runs drive the capture callback by hand. The
//! "audio thread" is whoever calls [`FakeDevice::emit`].

use std::sync::{Arc, Mutex, MutexGuard};

use super::backend::{AudioBackend, CallbackFlow, CaptureStream, DeviceInfo, InputCallback, StreamState};
use super::microphone::{CaptureConfig, MicrophoneError};

#[derive(Default)]
struct Slot {
    callback: Option<InputCallback>,
    state: Option<StreamState>,
}

#[derive(Default)]
struct Shared {
    slot: Mutex<Slot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Backend with a scripted default device
pub struct FakeBackend {
    device: Option<DeviceInfo>,
    open_error: Option<String>,
    shared: Arc<Shared>,
}

impl FakeBackend {
    /// Backend whose default input is `device`
    pub fn new(device: DeviceInfo) -> Self {
        Self {
            device: Some(device),
            open_error: None,
            shared: Arc::default(),
        }
    }

    /// Backend reporting no input device at all
    pub fn without_device() -> Self {
        Self {
            device: None,
            open_error: None,
            shared: Arc::default(),
        }
    }

    /// Makes `open_stream` fail with `reason`
    pub fn failing_open(mut self, reason: impl Into<String>) -> Self {
        self.open_error = Some(reason.into());
        self
    }

    /// Handle used to feed audio and inspect the stream
    pub fn handle(&self) -> FakeDevice {
        FakeDevice {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl AudioBackend for FakeBackend {
    type Stream = FakeStream;

    fn default_input_device(&self) -> Result<DeviceInfo, MicrophoneError> {
        self.device.clone().ok_or(MicrophoneError::NoInputDevice)
    }

    fn open_stream(
        &self,
        _device: &DeviceInfo,
        _config: &CaptureConfig,
        callback: InputCallback,
    ) -> Result<FakeStream, MicrophoneError> {
        if let Some(reason) = &self.open_error {
            return Err(MicrophoneError::StreamOpen(reason.clone()));
        }

        let mut slot = self.shared.lock();
        if matches!(slot.state, Some(state) if state != StreamState::Closed) {
            return Err(MicrophoneError::StreamOpen("device busy".into()));
        }
        slot.callback = Some(callback);
        slot.state = Some(StreamState::Created);

        Ok(FakeStream {
            shared: Arc::clone(&self.shared),
        })
    }
}

/// Stream opened by [`FakeBackend`]
pub struct FakeStream {
    shared: Arc<Shared>,
}

impl FakeStream {
    fn transition(
        &self,
        operation: &'static str,
        from: &[StreamState],
        to: StreamState,
    ) -> Result<(), MicrophoneError> {
        let mut slot = self.shared.lock();
        let state = slot.state.unwrap_or(StreamState::Closed);
        if !from.contains(&state) {
            return Err(MicrophoneError::InvalidState { operation, state });
        }
        slot.state = Some(to);
        Ok(())
    }
}

impl CaptureStream for FakeStream {
    fn start(&mut self) -> Result<(), MicrophoneError> {
        self.transition(
            "start",
            &[StreamState::Created, StreamState::Stopped],
            StreamState::Running,
        )
    }

    fn stop(&mut self) -> Result<(), MicrophoneError> {
        self.transition("stop", &[StreamState::Running], StreamState::Stopped)
    }

    fn close(&mut self) -> Result<(), MicrophoneError> {
        // Taking the lock waits for an in-flight emit.
        let mut slot = self.shared.lock();
        slot.callback = None;
        slot.state = Some(StreamState::Closed);
        Ok(())
    }
}

/// Test-side view of the fake hardware
#[derive(Clone)]
pub struct FakeDevice {
    shared: Arc<Shared>,
}

impl FakeDevice {
    /// Delivers one hardware buffer to the callback.
    ///
    /// Returns `false` when nothing was delivered because the stream is not
    /// running or the callback asked to complete.
    pub fn emit(&self, bytes: &[u8]) -> bool {
        let mut slot = self.shared.lock();
        if slot.state != Some(StreamState::Running) {
            return false;
        }
        let Some(callback) = slot.callback.as_mut() else {
            return false;
        };
        if callback(bytes) == CallbackFlow::Complete {
            slot.callback = None;
        }
        true
    }

    /// Delivers `samples` encoded as native-endian `i32`
    pub fn emit_samples(&self, samples: &[i32]) -> bool {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_ne_bytes()).collect();
        self.emit(&bytes)
    }

    /// State of the stream, `None` if it was never opened
    pub fn state(&self) -> Option<StreamState> {
        self.shared.lock().state
    }

    /// Whether the stream was closed and its callback dropped
    pub fn is_released(&self) -> bool {
        let slot = self.shared.lock();
        slot.state == Some(StreamState::Closed) && slot.callback.is_none()
    }
}
