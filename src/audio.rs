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

pub mod buffer;
pub mod cpal;
pub mod decode;
pub mod mixer;
pub mod offline;
pub mod resample;
pub mod wav;

pub use buffer::AudioBuffer;
pub use decode::{AudioDecoder, SymphoniaDecoder};
pub use mixer::{BusTap, BusVoice, MixBus, VoiceEnd, VoiceEvent};

/// A running driver that renders the mixing bus.
pub trait Output: fmt::Display + Send {
    /// Stops rendering. Stopping an output that has already stopped does nothing.
    fn stop(&mut self);

    /// Returns true while the output is rendering.
    fn is_running(&self) -> bool;
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<cpal::OutputDeviceInfo>, Box<dyn std::error::Error>> {
    cpal::list_output_devices()
}
