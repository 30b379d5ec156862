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
use serde::Deserialize;

const DEFAULT_SAMPLE_RATE: u32 = 44100;
const DEFAULT_CHANNELS: u16 = 2;
const DEFAULT_MAX_POLYPHONY: usize = 16;
const DEFAULT_MASTER_GAIN: f32 = 1.0;

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The cpal output device. The system default is used when unset.
    device: Option<String>,

    /// Bus sample rate in Hz. Falls back to the device default, then 44100.
    sample_rate: Option<u32>,

    /// Bus channel count (default: 2)
    channels: Option<u16>,

    /// Maximum simultaneous voices (default: 16). Zero disables the limit.
    max_polyphony: Option<usize>,

    /// Mixing bus gain (default: 1.0)
    master_gain: Option<f32>,
}

impl Audio {
    /// Returns the configured output device, if any.
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Returns the configured sample rate, if any.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Returns the configured sample rate, or the given device rate, or 44100.
    pub fn sample_rate_or(&self, device_rate: Option<u32>) -> u32 {
        self.sample_rate
            .or(device_rate)
            .unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the bus channel count (default: 2, minimum: 1)
    pub fn channels(&self) -> u16 {
        self.channels.unwrap_or(DEFAULT_CHANNELS).max(1)
    }

    /// Returns the polyphony cap (default: 16)
    pub fn max_polyphony(&self) -> usize {
        self.max_polyphony.unwrap_or(DEFAULT_MAX_POLYPHONY)
    }

    /// Returns the master gain (default: 1.0)
    pub fn master_gain(&self) -> f32 {
        self.master_gain.unwrap_or(DEFAULT_MASTER_GAIN)
    }
}
