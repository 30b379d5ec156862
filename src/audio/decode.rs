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
//! In-memory audio decoding.
//!
//! Encoded bytes are probed with symphonia, every sample format is converted to f32 and the
//! result is resampled to the mixing bus rate so voices never need to resample.

use std::io::Cursor;
use std::sync::Arc;

use symphonia::core::audio::{AudioBuffer as DecodedBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use crate::audio::resample::resample_channels;
use crate::audio::AudioBuffer;
use crate::error::SamplerError;

/// File extensions accepted for user uploads.
pub const SUPPORTED_EXTENSIONS: [&str; 7] = ["wav", "mp3", "ogg", "webm", "m4a", "aac", "flac"];

/// Returns true if the extension (without the dot, any case) is a supported upload format.
pub fn is_supported_extension(extension: &str) -> bool {
    let extension = extension.trim_start_matches('.').to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.contains(&extension.as_str())
}

/// The shared decoding capability. Implementations turn encoded bytes into a buffer at the
/// decoder's target sample rate.
pub trait AudioDecoder: Send + Sync {
    /// Decodes the given bytes. The extension, if known, is used as a format hint.
    fn decode(&self, bytes: Arc<[u8]>, extension: Option<&str>)
        -> Result<AudioBuffer, SamplerError>;

    /// The sample rate of every buffer this decoder produces.
    fn target_sample_rate(&self) -> u32;
}

/// Decodes any container and codec symphonia supports.
#[derive(Debug, Clone)]
pub struct SymphoniaDecoder {
    target_sample_rate: u32,
}

impl SymphoniaDecoder {
    /// Creates a decoder that resamples everything to the given rate.
    pub fn new(target_sample_rate: u32) -> SymphoniaDecoder {
        SymphoniaDecoder {
            target_sample_rate: target_sample_rate.max(1),
        }
    }

    /// Reads the next packet. Returns `Ok(None)` at end of stream.
    fn read_next_packet(format_reader: &mut dyn FormatReader) -> Result<Option<Packet>, SymphoniaError> {
        match format_reader.next_packet() {
            Ok(packet) => Ok(Some(packet)),
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Ok(None)
            }
            // Some demuxers report a decode error at the end of the stream.
            Err(SymphoniaError::DecodeError(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Decodes the whole track into planar channels, returning the channels and the native
    /// sample rate.
    fn decode_track(
        format_reader: &mut dyn FormatReader,
        decoder: &mut dyn Decoder,
        track_id: u32,
        mut channels: Vec<Vec<f32>>,
    ) -> Result<Vec<Vec<f32>>, SamplerError> {
        loop {
            let packet = match Self::read_next_packet(format_reader) {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    decoder.decode(&packet)?
                }
                // Skip corrupt packets rather than failing the whole sample.
                Err(SymphoniaError::DecodeError(err)) => {
                    debug!(err, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            append_decoded(decoded, &mut channels);
        }

        Ok(channels)
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(
        &self,
        bytes: Arc<[u8]>,
        extension: Option<&str>,
    ) -> Result<AudioBuffer, SamplerError> {
        if bytes.is_empty() {
            return Err(SamplerError::DecodeFailure("no data".to_string()));
        }
        let byte_count = bytes.len();
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = extension {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| SamplerError::DecodeFailure(format!("unrecognized format: {}", e)))?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| SamplerError::DecodeFailure("no audio track found".to_string()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let source_rate = params
            .sample_rate
            .ok_or_else(|| SamplerError::DecodeFailure("unknown sample rate".to_string()))?;
        let channels = vec![Vec::new(); params.channels.map(|c| c.count()).unwrap_or(0)];

        let mut decoder = get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| SamplerError::DecodeFailure(format!("unsupported codec: {}", e)))?;

        let channels =
            Self::decode_track(format_reader.as_mut(), decoder.as_mut(), track_id, channels)?;
        if channels.is_empty() {
            return Err(SamplerError::DecodeFailure(
                "stream has no channels".to_string(),
            ));
        }

        let channels = if source_rate != self.target_sample_rate {
            resample_channels(&channels, source_rate, self.target_sample_rate)?
        } else {
            channels
        };

        let buffer = AudioBuffer::new(channels, self.target_sample_rate)?;
        debug!(
            bytes = byte_count,
            channels = buffer.channel_count(),
            source_rate,
            frames = buffer.frames(),
            "Decoded audio"
        );
        Ok(buffer)
    }

    fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }
}

/// Appends a decoded packet to the planar output, converting to f32.
fn append_decoded(decoded: AudioBufferRef, channels: &mut Vec<Vec<f32>>) {
    match decoded {
        AudioBufferRef::F32(buf) => append_planar(&buf, channels, |sample| sample),
        AudioBufferRef::F64(buf) => append_planar(&buf, channels, |sample| sample as f32),
        AudioBufferRef::S8(buf) => append_planar(&buf, channels, scale_s8),
        AudioBufferRef::S16(buf) => append_planar(&buf, channels, scale_s16),
        AudioBufferRef::S24(buf) => {
            append_planar(&buf, channels, |sample| scale_s24(sample.inner()))
        }
        AudioBufferRef::S32(buf) => append_planar(&buf, channels, scale_s32),
        AudioBufferRef::U8(buf) => append_planar(&buf, channels, scale_u8),
        AudioBufferRef::U16(buf) => append_planar(&buf, channels, scale_u16),
        AudioBufferRef::U24(buf) => {
            append_planar(&buf, channels, |sample| scale_u24(sample.inner()))
        }
        AudioBufferRef::U32(buf) => append_planar(&buf, channels, scale_u32),
    }
}

/// Appends every plane of the packet to the matching output channel. The channel layout is
/// fixed by the first packet; later packets with fewer planes are padded with silence so the
/// channels stay equal in length.
fn append_planar<T, F>(buf: &DecodedBuffer<T>, channels: &mut Vec<Vec<f32>>, convert: F)
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let frames = buf.frames();
    if channels.is_empty() {
        channels.resize_with(buf.spec().channels.count(), Vec::new);
    }

    let planes = buf.planes();
    let planes = planes.planes();
    for (index, channel) in channels.iter_mut().enumerate() {
        match planes.get(index) {
            Some(plane) => channel.extend(plane.iter().take(frames).map(|s| convert(*s))),
            None => channel.extend(std::iter::repeat(0.0).take(frames)),
        }
    }
}

#[inline]
pub(crate) fn scale_s8(sample: i8) -> f32 {
    sample as f32 / (1i64 << 7) as f32
}

#[inline]
pub(crate) fn scale_s16(sample: i16) -> f32 {
    sample as f32 / (1i64 << 15) as f32
}

#[inline]
pub(crate) fn scale_s24(sample: i32) -> f32 {
    sample as f32 / (1i64 << 23) as f32
}

#[inline]
pub(crate) fn scale_s32(sample: i32) -> f32 {
    sample as f32 / (1i64 << 31) as f32
}

#[inline]
pub(crate) fn scale_u8(sample: u8) -> f32 {
    (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u16(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u24(sample: u32) -> f32 {
    let max = (1u32 << 24) - 1;
    (sample as f32 / max as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u32(sample: u32) -> f32 {
    (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testutil::{float_wav_bytes, sine_wav_bytes};

    #[test]
    fn test_decode_int_wav() {
        let bytes = sine_wav_bytes(2, 44100, 4410);
        let decoder = SymphoniaDecoder::new(44100);
        let buffer = decoder.decode(bytes.into(), Some("wav")).unwrap();
        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.frames(), 4410);
        assert!((buffer.duration() - 0.1).abs() < 1e-9);
        assert!(buffer.channel(0).iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn test_decode_float_wav_without_hint() {
        let samples: Vec<f32> = (0..200).map(|i| (i as f32 / 200.0) - 0.5).collect();
        let bytes = float_wav_bytes(&samples, 1, 48000);
        let decoder = SymphoniaDecoder::new(48000);
        let buffer = decoder.decode(bytes.into(), None).unwrap();
        assert_eq!(buffer.frames(), 200);
        for (decoded, original) in buffer.channel(0).iter().zip(samples.iter()) {
            assert!((decoded - original).abs() < 1e-6);
        }
    }

    #[test]
    fn test_decode_resamples_to_target() {
        let bytes = sine_wav_bytes(1, 22050, 2205);
        let decoder = SymphoniaDecoder::new(44100);
        let buffer = decoder.decode(bytes.into(), Some("wav")).unwrap();
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.frames(), 4410);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let decoder = SymphoniaDecoder::new(44100);
        let err = decoder
            .decode(Arc::from(&b"definitely not audio"[..]), Some("wav"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);

        let err = decoder.decode(Arc::from(&b""[..]), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    }

    #[test]
    fn test_scaling_helpers() {
        assert_eq!(scale_s16(i16::MIN), -1.0);
        assert_eq!(scale_s16(0), 0.0);
        assert_eq!(scale_s8(i8::MIN), -1.0);
        assert_eq!(scale_u8(0), -1.0);
        assert_eq!(scale_u8(u8::MAX), 1.0);
        assert_eq!(scale_u16(u16::MAX), 1.0);
        assert_eq!(scale_s24(-(1 << 23)), -1.0);
        assert_eq!(scale_u24((1 << 24) - 1), 1.0);
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_extension("wav"));
        assert!(is_supported_extension(".FLAC"));
        assert!(is_supported_extension("m4a"));
        assert!(!is_supported_extension("txt"));
        assert!(!is_supported_extension(""));
    }
}
