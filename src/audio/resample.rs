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
//! Whole-buffer sample rate conversion with rubato.

use rubato::{
    SincFixedIn, SincInterpolationParameters, SincInterpolationType, VecResampler, WindowFunction,
};
use tracing::debug;

use crate::audio::AudioBuffer;
use crate::error::SamplerError;

/// Input block size for the sinc resampler.
const INPUT_BLOCK_SIZE: usize = 1024;

/// Converts planar channels from one sample rate to another. The output holds
/// `ceil(frames * target_rate / source_rate)` frames per channel with the resampler's
/// latency removed.
pub fn resample_channels(
    channels: &[Vec<f32>],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<Vec<f32>>, SamplerError> {
    let frames = channels.first().map(|c| c.len()).unwrap_or(0);
    if source_rate == target_rate || frames == 0 {
        return Ok(channels.to_vec());
    }

    let failed = |e: &dyn std::fmt::Display| {
        SamplerError::DecodeFailure(format!(
            "unable to resample from {} Hz to {} Hz: {}",
            source_rate, target_rate, e
        ))
    };

    let sinc_params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        oversampling_factor: 128,
        interpolation: SincInterpolationType::Linear,
        window: WindowFunction::BlackmanHarris2,
    };
    let resample_ratio = target_rate as f64 / source_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(
        resample_ratio,
        1.0,
        sinc_params,
        INPUT_BLOCK_SIZE,
        channels.len(),
    )
    .map_err(|e| failed(&e))?;

    let delay = resampler.output_delay();
    let expected = (frames as f64 * resample_ratio).ceil() as usize;
    let mut output = vec![Vec::with_capacity(expected + delay); channels.len()];
    let mut scratch = resampler.output_buffer_allocate(true);
    let mut input = vec![Vec::with_capacity(INPUT_BLOCK_SIZE); channels.len()];

    let mut position = 0;
    loop {
        let needed = resampler.input_frames_next();
        let available = frames - position;
        let take = needed.min(available);
        for (chunk, channel) in input.iter_mut().zip(channels) {
            chunk.clear();
            chunk.extend_from_slice(&channel[position..position + take]);
        }
        position += take;

        let processed = if take == needed {
            resampler.process_into_buffer(&input, &mut scratch, None)
        } else {
            resampler.process_partial_into_buffer(Some(&input as &[Vec<f32>]), &mut scratch, None)
        };
        let (_, produced) = processed.map_err(|e| failed(&e))?;
        append(&mut output, &scratch, produced);

        if position >= frames {
            break;
        }
    }

    // Push silence through until the delayed tail has come out.
    while output[0].len() < expected + delay {
        let (_, produced) = resampler
            .process_partial_into_buffer(None, &mut scratch, None)
            .map_err(|e| failed(&e))?;
        if produced == 0 {
            break;
        }
        append(&mut output, &scratch, produced);
    }

    for channel in output.iter_mut() {
        channel.drain(..delay.min(channel.len()));
        channel.resize(expected, 0.0);
    }

    debug!(
        from = source_rate,
        to = target_rate,
        frames,
        resampled_frames = expected,
        "Resampled audio"
    );
    Ok(output)
}

/// Converts a buffer to the given sample rate. A buffer already at that rate is cloned.
pub fn resample(audio: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer, SamplerError> {
    if audio.sample_rate() == target_rate {
        return Ok(audio.clone());
    }
    AudioBuffer::new(
        resample_channels(audio.channels(), audio.sample_rate(), target_rate)?,
        target_rate,
    )
}

fn append(output: &mut [Vec<f32>], produced: &[Vec<f32>], frames: usize) {
    for (out, block) in output.iter_mut().zip(produced) {
        out.extend_from_slice(&block[..frames.min(block.len())]);
    }
}

#[cfg(test)]
mod test {
    use std::f32::consts::PI;

    use super::*;

    fn sine(rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_upsample_lengths() {
        let resampled = resample_channels(&[sine(22050, 2205), sine(22050, 2205)], 22050, 44100)
            .unwrap();
        assert_eq!(resampled.len(), 2);
        assert!(resampled.iter().all(|channel| channel.len() == 4410));
    }

    #[test]
    fn test_downsample_lengths() {
        let resampled = resample_channels(&[sine(48000, 4800)], 48000, 44100).unwrap();
        assert_eq!(resampled[0].len(), 4410);

        // A block shorter than the resampler's input size is still converted.
        let resampled = resample_channels(&[vec![0.5; 50]], 500, 1000).unwrap();
        assert_eq!(resampled[0].len(), 100);
    }

    #[test]
    fn test_preserves_signal_level() {
        let resampled = resample_channels(&[sine(22050, 22050)], 22050, 44100).unwrap();
        let middle = &resampled[0][4410..39690];
        let level = rms(middle);
        assert!(
            (level - 0.5 / 2f32.sqrt()).abs() < 0.02,
            "unexpected level {}",
            level
        );
    }

    #[test]
    fn test_same_rate_is_unchanged() {
        let channels = vec![vec![0.25, 0.5]];
        assert_eq!(resample_channels(&channels, 44100, 44100).unwrap(), channels);
        assert_eq!(
            resample_channels(&[Vec::new()], 22050, 44100).unwrap(),
            vec![Vec::<f32>::new()]
        );
    }

    #[test]
    fn test_resample_buffer() {
        let audio = AudioBuffer::new(vec![sine(8000, 800), sine(8000, 800)], 8000).unwrap();
        let resampled = resample(&audio, 16000).unwrap();
        assert_eq!(resampled.sample_rate(), 16000);
        assert_eq!(resampled.channel_count(), 2);
        assert_eq!(resampled.frames(), 1600);
        assert!((resampled.duration() - audio.duration()).abs() < 1e-9);
    }
}
