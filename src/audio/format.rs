//! Sample encodings delivered by the input stream

use std::fmt;

/// Fixed-width signed integer sample encoding, native byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    /// 16-bit signed PCM
    Int16,
    /// 32-bit signed PCM
    #[default]
    Int32,
}

impl SampleFormat {
    /// Size of one sample in bytes
    pub const fn sample_size(self) -> usize {
        match self {
            SampleFormat::Int16 => 2,
            SampleFormat::Int32 => 4,
        }
    }

    /// Decodes one complete sample.
    ///
    /// `chunk` must be exactly [`sample_size`](Self::sample_size) bytes long;
    /// callers slice the buffer with `chunks_exact`.
    pub fn decode(self, chunk: &[u8]) -> i32 {
        match self {
            SampleFormat::Int16 => i16::from_ne_bytes([chunk[0], chunk[1]]) as i32,
            SampleFormat::Int32 => i32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
        }
    }

    /// Appends a full-scale 32-bit sample to `out` in this encoding.
    ///
    /// `Int16` keeps the 16 most significant bits.
    pub fn encode_full_scale(self, value: i32, out: &mut Vec<u8>) {
        match self {
            SampleFormat::Int16 => out.extend_from_slice(&((value >> 16) as i16).to_ne_bytes()),
            SampleFormat::Int32 => out.extend_from_slice(&value.to_ne_bytes()),
        }
    }

    /// Decodes every complete sample in `bytes`, ignoring a trailing partial one.
    pub fn decode_all(self, bytes: &[u8]) -> Vec<i32> {
        bytes
            .chunks_exact(self.sample_size())
            .map(|chunk| self.decode(chunk))
            .collect()
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleFormat::Int16 => write!(f, "i16"),
            SampleFormat::Int32 => write!(f, "i32"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_sizes() {
        assert_eq!(SampleFormat::Int16.sample_size(), 2);
        assert_eq!(SampleFormat::Int32.sample_size(), 4);
        assert_eq!(SampleFormat::default(), SampleFormat::Int32);
    }

    #[test]
    fn decodes_known_i32_values() {
        for value in [i32::MIN, -1, 0, 1, 0x1234_5678, i32::MAX] {
            assert_eq!(SampleFormat::Int32.decode(&value.to_ne_bytes()), value);
        }
    }

    #[test]
    fn decodes_i16_with_sign_extension() {
        for value in [i16::MIN, -2, 0, 300, i16::MAX] {
            assert_eq!(SampleFormat::Int16.decode(&value.to_ne_bytes()), value as i32);
        }
    }

    #[test]
    fn full_scale_encoding() {
        let mut out = Vec::new();
        SampleFormat::Int32.encode_full_scale(-5, &mut out);
        SampleFormat::Int16.encode_full_scale(0x1234_5678, &mut out);
        SampleFormat::Int16.encode_full_scale(i32::MIN, &mut out);

        assert_eq!(SampleFormat::Int32.decode(&out[..4]), -5);
        assert_eq!(SampleFormat::Int16.decode(&out[4..6]), 0x1234);
        assert_eq!(SampleFormat::Int16.decode(&out[6..8]), i16::MIN as i32);
    }

    #[test]
    fn decode_all_skips_partial_tail() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&7i32.to_ne_bytes());
        bytes.extend_from_slice(&(-9i32).to_ne_bytes());
        bytes.extend_from_slice(&[0xAA, 0xBB]);

        assert_eq!(SampleFormat::Int32.decode_all(&bytes), vec![7, -9]);
    }
}
