// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! 16-bit linear PCM WAV encoding.
//!
//! The output always uses the canonical 44-byte header regardless of channel count, so the
//! encoder writes the container by hand rather than going through a general-purpose WAV writer.

use crate::audio::AudioBuffer;
use crate::error::SamplerError;

/// The size of the canonical RIFF/WAVE header.
pub const HEADER_SIZE: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: u16 = BITS_PER_SAMPLE / 8;
const FORMAT_PCM: u16 = 1;
const FMT_CHUNK_SIZE: u32 = 16;

/// Encodes the buffer as a 16-bit PCM WAV file.
pub fn encode(buffer: &AudioBuffer) -> Result<Vec<u8>, SamplerError> {
    encode_channels(buffer.channels(), buffer.sample_rate())
}

/// Encodes planar float channels as a 16-bit PCM WAV file. Every channel must hold the same
/// number of frames.
pub fn encode_channels(channels: &[Vec<f32>], sample_rate: u32) -> Result<Vec<u8>, SamplerError> {
    if channels.is_empty() {
        return Err(SamplerError::EncodeFailure(
            "at least one channel is required".to_string(),
        ));
    }
    let channel_count = u16::try_from(channels.len()).map_err(|_| {
        SamplerError::EncodeFailure(format!("too many channels: {}", channels.len()))
    })?;
    let frames = channels[0].len();
    if let Some(index) = channels.iter().position(|channel| channel.len() != frames) {
        return Err(SamplerError::EncodeFailure(format!(
            "channel {} has {} frames, channel 0 has {}",
            index,
            channels[index].len(),
            frames
        )));
    }

    let data_len = frames
        .checked_mul(channels.len() * BYTES_PER_SAMPLE as usize)
        .and_then(|len| u32::try_from(len).ok())
        .filter(|len| len.checked_add(36).is_some())
        .ok_or_else(|| SamplerError::EncodeFailure("audio too long for a WAV file".to_string()))?;

    let block_align = channel_count * BYTES_PER_SAMPLE;
    let byte_rate = sample_rate * block_align as u32;

    let mut out = Vec::with_capacity(HEADER_SIZE + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&FMT_CHUNK_SIZE.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&channel_count.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());

    for frame in 0..frames {
        for channel in channels {
            out.extend_from_slice(&to_i16(channel[frame]).to_le_bytes());
        }
    }

    Ok(out)
}

/// Converts a float sample to 16-bit PCM. The sample is clamped to [-1.0, 1.0] and scaled
/// asymmetrically so both extremes are representable, then truncated toward zero.
#[inline]
pub fn to_i16(sample: f32) -> i16 {
    let sample = if sample.is_nan() {
        0.0
    } else {
        sample.clamp(-1.0, 1.0)
    };
    if sample < 0.0 {
        (sample * 32768.0) as i16
    } else {
        (sample * 32767.0) as i16
    }
}

/// The fields of a canonical 44-byte PCM WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

impl WavHeader {
    /// Parses the canonical header produced by [`encode`]. Returns None if the bytes do not
    /// start with a 44-byte PCM header.
    pub fn parse(bytes: &[u8]) -> Option<WavHeader> {
        if bytes.len() < HEADER_SIZE
            || &bytes[0..4] != b"RIFF"
            || &bytes[8..12] != b"WAVE"
            || &bytes[12..16] != b"fmt "
            || &bytes[36..40] != b"data"
        {
            return None;
        }
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        if u32_at(16) != FMT_CHUNK_SIZE || u16_at(20) != FORMAT_PCM {
            return None;
        }

        Some(WavHeader {
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_len: u32_at(40),
        })
    }

    /// The number of frames described by this header.
    pub fn frames(&self) -> usize {
        if self.block_align == 0 {
            return 0;
        }
        self.data_len as usize / self.block_align as usize
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_known_buffer_header() {
        let bytes = encode_channels(&[vec![1.0, -1.0], vec![0.0, 0.5]], 44100).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 8);

        let header = WavHeader::parse(&bytes).expect("valid header");
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.bits_per_sample, 16);
        assert_eq!(header.data_len, 8);
        assert_eq!(header.byte_rate, 44100 * 2 * 2);
        assert_eq!(header.block_align, 4);
        assert_eq!(header.frames(), 2);

        // RIFF size is 36 + data length.
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 44);
    }

    #[test]
    fn test_known_buffer_samples() {
        let original = [vec![1.0f32, -1.0], vec![0.0f32, 0.5]];
        let bytes = encode_channels(&original, 44100).unwrap();

        // Interleaved: frame 0 (ch0, ch1), frame 1 (ch0, ch1).
        let samples: Vec<i16> = bytes[HEADER_SIZE..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples, vec![32767, 0, -32768, 16383]);

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);
        let read: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        for (frame, pair) in read.chunks_exact(2).enumerate() {
            for (channel, value) in pair.iter().enumerate() {
                let expected = original[channel][frame];
                let decoded = if *value < 0 {
                    *value as f32 / 32768.0
                } else {
                    *value as f32 / 32767.0
                };
                assert!(
                    (decoded - expected).abs() <= 1.0 / 32768.0,
                    "frame {} channel {}: {} vs {}",
                    frame,
                    channel,
                    decoded,
                    expected
                );
            }
        }
    }

    #[test]
    fn test_conversion_clamps_and_truncates() {
        assert_eq!(to_i16(2.0), 32767);
        assert_eq!(to_i16(-3.5), -32768);
        assert_eq!(to_i16(0.0), 0);
        assert_eq!(to_i16(-0.0), 0);
        // 0.5 * 32767 = 16383.5, truncated.
        assert_eq!(to_i16(0.5), 16383);
        // -0.3 * 32768 = -9830.4, truncated toward zero.
        assert_eq!(to_i16(-0.3), -9830);
        assert_eq!(to_i16(f32::NAN), 0);
    }

    #[test]
    fn test_mismatched_channels_fail() {
        let err = encode_channels(&[vec![0.0; 3], vec![0.0; 2]], 44100).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::EncodeFailure);
        assert!(encode_channels(&[], 44100).is_err());
    }

    #[test]
    fn test_empty_buffer_is_header_only() {
        let bytes = encode_channels(&[vec![], vec![]], 48000).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE);
        let header = WavHeader::parse(&bytes).unwrap();
        assert_eq!(header.data_len, 0);
        assert_eq!(header.channels, 2);
    }

    #[test]
    fn test_many_channels_keep_canonical_header() {
        let channels: Vec<Vec<f32>> = (0..6).map(|c| vec![c as f32 / 10.0; 10]).collect();
        let bytes = encode_channels(&channels, 96000).unwrap();
        let header = WavHeader::parse(&bytes).unwrap();
        assert_eq!(header.channels, 6);
        assert_eq!(header.block_align, 12);
        assert_eq!(bytes.len(), HEADER_SIZE + 10 * 12);
    }

    #[test]
    fn test_encode_buffer() {
        let buffer = AudioBuffer::new(vec![vec![0.25; 100]], 22050).unwrap();
        let bytes = encode(&buffer).unwrap();
        let header = WavHeader::parse(&bytes).unwrap();
        assert_eq!(header.channels, 1);
        assert_eq!(header.sample_rate, 22050);
        assert_eq!(header.frames(), 100);
    }
}
