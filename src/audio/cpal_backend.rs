//! Hardware backend built on cpal
//!
//! Opens input streams on the default device of the default host, in a
//! sample format, channel count and buffer size the device supports. cpal
//! does not convert, so the callback takes the first channel, scales it to
//! the configured integer format and hands native-endian bytes to the
//! capture callback.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, Host, SampleFormat as NativeFormat, SampleRate, SizedSample, Stream,
    StreamConfig, SupportedBufferSize,
};

use super::backend::{AudioBackend, CallbackFlow, CaptureStream, DeviceInfo, InputCallback};
use super::format::SampleFormat;
use super::microphone::{CaptureConfig, MicrophoneError};

/// Audio backend for the platform's default host
pub struct CpalBackend {
    host: Host,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// List available input devices
    pub fn list_devices(&self) -> Vec<String> {
        self.host
            .input_devices()
            .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
            .unwrap_or_default()
    }

    /// Finds the device a `DeviceInfo` was resolved from
    fn find_device(&self, info: &DeviceInfo) -> Option<Device> {
        let by_index = self
            .host
            .input_devices()
            .ok()
            .and_then(|mut devices| devices.nth(info.index))
            .filter(|d| d.name().map(|n| n == info.name).unwrap_or(false));

        by_index.or_else(|| {
            self.host
                .default_input_device()
                .filter(|d| d.name().map(|n| n == info.name).unwrap_or(false))
        })
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    type Stream = CpalStream;

    fn default_input_device(&self) -> Result<DeviceInfo, MicrophoneError> {
        let device = self
            .host
            .default_input_device()
            .ok_or(MicrophoneError::NoInputDevice)?;

        let name = device.name().map_err(|_| MicrophoneError::NoInputDevice)?;

        let sample_rate = device
            .default_input_config()
            .map_err(|e| MicrophoneError::DeviceConfig(e.to_string()))?
            .sample_rate()
            .0;

        let index = self
            .host
            .input_devices()
            .ok()
            .and_then(|mut devices| {
                devices.position(|d| d.name().map(|n| n == name).unwrap_or(false))
            })
            .unwrap_or(0);

        tracing::debug!(host = ?self.host.id(), index, "Default input device found");

        Ok(DeviceInfo {
            name,
            sample_rate,
            index,
        })
    }

    fn open_stream(
        &self,
        device: &DeviceInfo,
        config: &CaptureConfig,
        callback: InputCallback,
    ) -> Result<CpalStream, MicrophoneError> {
        let cpal_device = self.find_device(device).ok_or_else(|| {
            MicrophoneError::StreamOpen(format!("input device {} is gone", device.name))
        })?;

        let plan = plan_stream(&cpal_device, device, config)?;

        tracing::info!(
            native_format = ?plan.native,
            channels = plan.stream_config.channels,
            buffer_size = ?plan.stream_config.buffer_size,
            "Opening input stream -> {} mono",
            config.format
        );

        let scratch_len = config.frames_per_buffer as usize * config.format.sample_size();
        let channels = plan.stream_config.channels as usize;

        let stream = match plan.native {
            NativeFormat::I16 => build_stream::<i16>(
                &cpal_device,
                &plan.stream_config,
                callback,
                scratch_len,
                channels,
                config.format,
            ),
            NativeFormat::I32 => build_stream::<i32>(
                &cpal_device,
                &plan.stream_config,
                callback,
                scratch_len,
                channels,
                config.format,
            ),
            NativeFormat::F32 => build_stream::<f32>(
                &cpal_device,
                &plan.stream_config,
                callback,
                scratch_len,
                channels,
                config.format,
            ),
            other => Err(MicrophoneError::StreamOpen(format!(
                "unsupported native sample format {:?}",
                other
            ))),
        }?;

        // Some hosts start streams as soon as they are built.
        if let Err(e) = stream.pause() {
            tracing::debug!("Could not pause new stream: {}", e);
        }

        Ok(CpalStream {
            stream: Some(stream),
        })
    }
}

/// Stream shape the device actually accepts
struct StreamPlan {
    native: NativeFormat,
    stream_config: StreamConfig,
}

fn requested_native(format: SampleFormat) -> NativeFormat {
    match format {
        SampleFormat::Int16 => NativeFormat::I16,
        SampleFormat::Int32 => NativeFormat::I32,
    }
}

/// Prefers a supported range matching the requested format, channel count
/// and native rate; otherwise falls back to the device default.
fn plan_stream(
    device: &Device,
    info: &DeviceInfo,
    config: &CaptureConfig,
) -> Result<StreamPlan, MicrophoneError> {
    let rate = SampleRate(info.sample_rate);
    let wanted = requested_native(config.format);

    let exact = device.supported_input_configs().ok().and_then(|mut ranges| {
        ranges.find(|r| {
            r.sample_format() == wanted
                && r.channels() == config.channels
                && r.min_sample_rate() <= rate
                && rate <= r.max_sample_rate()
        })
    });

    let (native, channels, supported_size) = match exact {
        Some(range) => (range.sample_format(), range.channels(), range.buffer_size().clone()),
        None => {
            let default = device
                .default_input_config()
                .map_err(|e| MicrophoneError::DeviceConfig(e.to_string()))?;
            (
                default.sample_format(),
                default.channels(),
                default.buffer_size().clone(),
            )
        }
    };

    Ok(StreamPlan {
        native,
        stream_config: StreamConfig {
            channels,
            sample_rate: rate,
            buffer_size: buffer_size_for(&supported_size, config.frames_per_buffer),
        },
    })
}

/// `Fixed(frames)` when the device advertises it, the host default otherwise.
fn buffer_size_for(supported: &SupportedBufferSize, frames: u32) -> BufferSize {
    match supported {
        SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&frames) => {
            BufferSize::Fixed(frames)
        }
        _ => BufferSize::Default,
    }
}

/// Device sample types the backend can open
trait NativeSample: SizedSample {
    /// Value scaled to the full `i32` range
    fn to_full_scale(self) -> i32;
}

impl NativeSample for i16 {
    fn to_full_scale(self) -> i32 {
        (self as i32) << 16
    }
}

impl NativeSample for i32 {
    fn to_full_scale(self) -> i32 {
        self
    }
}

impl NativeSample for f32 {
    fn to_full_scale(self) -> i32 {
        (self.clamp(-1.0, 1.0) as f64 * i32::MAX as f64) as i32
    }
}

/// Encodes the first channel of each interleaved frame into `out`.
fn encode_first_channel<T: NativeSample>(
    data: &[T],
    channels: usize,
    format: SampleFormat,
    out: &mut Vec<u8>,
) {
    for frame in data.chunks(channels.max(1)) {
        format.encode_full_scale(frame[0].to_full_scale(), out);
    }
}

fn build_stream<T: NativeSample>(
    device: &Device,
    stream_config: &StreamConfig,
    mut callback: InputCallback,
    scratch_len: usize,
    channels: usize,
    format: SampleFormat,
) -> Result<Stream, MicrophoneError> {
    let mut scratch = Vec::with_capacity(scratch_len);
    let mut complete = false;

    device
        .build_input_stream(
            stream_config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if complete {
                    return;
                }
                scratch.clear();
                encode_first_channel(data, channels, format, &mut scratch);
                complete = callback(&scratch) == CallbackFlow::Complete;
            },
            |err| {
                tracing::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| MicrophoneError::StreamOpen(e.to_string()))
}

/// Input stream opened by [`CpalBackend`]
pub struct CpalStream {
    stream: Option<Stream>,
}

impl CpalStream {
    fn stream(&self) -> Result<&Stream, MicrophoneError> {
        self.stream
            .as_ref()
            .ok_or_else(|| MicrophoneError::Stream("stream already closed".into()))
    }
}

impl CaptureStream for CpalStream {
    fn start(&mut self) -> Result<(), MicrophoneError> {
        self.stream()?
            .play()
            .map_err(|e| MicrophoneError::Stream(e.to_string()))
    }

    fn stop(&mut self) -> Result<(), MicrophoneError> {
        self.stream()?
            .pause()
            .map_err(|e| MicrophoneError::Stream(e.to_string()))
    }

    fn close(&mut self) -> Result<(), MicrophoneError> {
        // Dropping a cpal stream waits for the audio thread to finish.
        drop(self.stream.take());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_buffer_only_when_supported() {
        let range = SupportedBufferSize::Range { min: 64, max: 4096 };
        assert_eq!(buffer_size_for(&range, 1024), BufferSize::Fixed(1024));

        let narrow = SupportedBufferSize::Range { min: 2048, max: 4096 };
        assert_eq!(buffer_size_for(&narrow, 1024), BufferSize::Default);
        assert_eq!(buffer_size_for(&SupportedBufferSize::Unknown, 1024), BufferSize::Default);
    }

    #[test]
    fn float_input_is_scaled_to_integers() {
        let mut out = Vec::new();
        encode_first_channel(&[0.0f32, 1.0, -1.0, 2.0], 1, SampleFormat::Int32, &mut out);

        assert_eq!(
            SampleFormat::Int32.decode_all(&out),
            vec![0, i32::MAX, -i32::MAX, i32::MAX]
        );
    }

    #[test]
    fn stereo_input_keeps_first_channel() {
        let mut out = Vec::new();
        encode_first_channel(&[100i16, -7, 200, -7, 300, -7], 2, SampleFormat::Int16, &mut out);

        assert_eq!(SampleFormat::Int16.decode_all(&out), vec![100, 200, 300]);
    }

    #[test]
    fn i16_input_widened_to_i32() {
        let mut out = Vec::new();
        encode_first_channel(&[1i16, -1, i16::MIN], 1, SampleFormat::Int32, &mut out);

        assert_eq!(
            SampleFormat::Int32.decode_all(&out),
            vec![1 << 16, -(1 << 16), i32::MIN]
        );
    }

    #[test]
    fn requested_format_maps_to_cpal() {
        assert_eq!(requested_native(SampleFormat::Int16), NativeFormat::I16);
        assert_eq!(requested_native(SampleFormat::Int32), NativeFormat::I32);
    }
}
