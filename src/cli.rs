//! Command line entry point
//!
//! Initializes the default microphone, reports it, listens and releases it.

use std::io::Write;

use clap::Parser;

use crate::audio::{AudioBackend, CaptureConfig, Microphone, MicrophoneError};

const GREEN: &str = "\x1b[32m";
const RESET: &str = "\x1b[0m";

#[derive(Parser, Debug)]
#[command(name = "tewn")]
#[command(about = "A chromatic CLI tuner.", long_about = None)]
pub struct Cli {}

/// Runs the command against `backend` and returns the process exit code.
///
/// Core errors are written to `err` and turn into exit code 1; only I/O
/// errors on the output streams are returned as `Err`.
pub fn run<B: AudioBackend>(
    backend: B,
    out: &mut impl Write,
    err: &mut impl Write,
    color: bool,
) -> anyhow::Result<u8> {
    let mut mic = match Microphone::with_backend(backend, CaptureConfig::default()) {
        Ok(mic) => mic,
        Err(e) => {
            tracing::debug!("Microphone initialization failed: {:?}", e);
            writeln!(err, "{}", e)?;
            return Ok(1);
        }
    };

    let message = format!("Input initialized. Ready to listen on {}.", mic.device_name());
    if color {
        writeln!(out, "{GREEN}{message}{RESET}")?;
    } else {
        writeln!(out, "{message}")?;
    }

    if let Err(e) = listen_once(&mut mic) {
        writeln!(err, "{}", e)?;
        return Ok(1);
    }

    Ok(0)
}

fn listen_once<B: AudioBackend>(mic: &mut Microphone<B>) -> Result<(), MicrophoneError> {
    mic.start_listening()?;
    mic.stop_and_release()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{DeviceInfo, FakeBackend};

    #[test]
    fn help_flag_is_recognized() {
        let err = Cli::try_parse_from(["tewn", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
        assert!(err.to_string().contains("A chromatic CLI tuner."));
    }

    #[test]
    fn unknown_arguments_are_rejected() {
        assert!(Cli::try_parse_from(["tewn", "--verbose"]).is_err());
        assert!(Cli::try_parse_from(["tewn"]).is_ok());
    }

    #[test]
    fn colored_success_message() {
        let backend = FakeBackend::new(DeviceInfo {
            name: "USB Mic".into(),
            sample_rate: 44_100,
            index: 1,
        });
        let (mut out, mut err) = (Vec::new(), Vec::new());

        assert_eq!(run(backend, &mut out, &mut err, true).unwrap(), 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "\x1b[32mInput initialized. Ready to listen on USB Mic.\x1b[0m\n"
        );
        assert!(err.is_empty());
    }
}
