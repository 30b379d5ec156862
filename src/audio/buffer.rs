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
use std::fmt;

use crate::error::SamplerError;

/// A decoded, immutable block of multi-channel audio. Samples are stored planar: one vector
/// per channel, all of equal length.
#[derive(Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Creates a new audio buffer. Fails if there are no channels, if the channels differ in
    /// length or if the sample rate is zero.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<AudioBuffer, SamplerError> {
        if channels.is_empty() {
            return Err(SamplerError::EncodeFailure(
                "audio buffer must have at least one channel".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(SamplerError::EncodeFailure(
                "sample rate must be greater than 0".to_string(),
            ));
        }
        let frames = channels[0].len();
        if let Some((index, channel)) = channels
            .iter()
            .enumerate()
            .find(|(_, channel)| channel.len() != frames)
        {
            return Err(SamplerError::EncodeFailure(format!(
                "channel {} has {} frames, expected {}",
                index,
                channel.len(),
                frames
            )));
        }

        Ok(AudioBuffer {
            channels,
            sample_rate,
        })
    }

    /// Creates a silent buffer with the given shape.
    pub fn silent(
        channel_count: u16,
        sample_rate: u32,
        frames: usize,
    ) -> Result<AudioBuffer, SamplerError> {
        AudioBuffer::new(
            vec![vec![0.0; frames]; channel_count as usize],
            sample_rate,
        )
    }

    /// Deinterleaves the given samples into a buffer.
    pub fn from_interleaved(
        samples: &[f32],
        channel_count: u16,
        sample_rate: u32,
    ) -> Result<AudioBuffer, SamplerError> {
        let channel_count = channel_count.max(1) as usize;
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }
        AudioBuffer::new(channels, sample_rate)
    }

    /// The per-channel sample data.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// A single channel's sample data.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.len() as u16
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    /// The duration of the buffer in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// The duration of a single frame in seconds.
    pub fn frame_duration(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }

    /// Maps a position in seconds to the nearest frame index, clamped to the buffer length.
    pub fn frame_at(&self, seconds: f64) -> usize {
        if !seconds.is_finite() || seconds <= 0.0 {
            return 0;
        }
        ((seconds * self.sample_rate as f64).round() as usize).min(self.frames())
    }

    /// The approximate memory held by the sample data.
    pub fn memory_size(&self) -> usize {
        self.frames() * self.channels.len() * std::mem::size_of::<f32>()
    }
}

impl fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("channels", &self.channels.len())
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_validates_shape() {
        assert!(AudioBuffer::new(vec![], 44100).is_err());
        assert!(AudioBuffer::new(vec![vec![0.0; 4]], 0).is_err());

        let err = AudioBuffer::new(vec![vec![0.0; 4], vec![0.0; 3]], 44100).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::EncodeFailure);
    }

    #[test]
    fn test_duration_and_frames() {
        let buffer = AudioBuffer::silent(2, 48000, 24000).unwrap();
        assert_eq!(buffer.frames(), 24000);
        assert_eq!(buffer.channel_count(), 2);
        assert!((buffer.duration() - 0.5).abs() < f64::EPSILON);
        assert_eq!(buffer.memory_size(), 24000 * 2 * 4);
    }

    #[test]
    fn test_frame_at() {
        let buffer = AudioBuffer::silent(1, 1000, 1000).unwrap();
        assert_eq!(buffer.frame_at(0.0), 0);
        assert_eq!(buffer.frame_at(-1.0), 0);
        assert_eq!(buffer.frame_at(0.25), 250);
        assert_eq!(buffer.frame_at(0.2504), 250);
        assert_eq!(buffer.frame_at(0.2506), 251);
        assert_eq!(buffer.frame_at(5.0), 1000);
        assert_eq!(buffer.frame_at(f64::NAN), 0);
    }

    #[test]
    fn test_from_interleaved() {
        let buffer = AudioBuffer::from_interleaved(&[0.1, 0.2, 0.3, 0.4, 0.5], 2, 44100).unwrap();
        assert_eq!(buffer.frames(), 2);
        assert_eq!(buffer.channel(0), &[0.1, 0.3]);
        assert_eq!(buffer.channel(1), &[0.2, 0.4]);
    }
}
