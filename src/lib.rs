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
//! A sixteen pad sampler: decoded samples in slots, polyphonic playback through a shared
//! mixing bus, and session recording to 16-bit PCM WAV.

pub mod audio;
pub mod catalog;
pub mod config;
pub mod error;
pub mod playback;
pub mod playsync;
pub mod recorder;
pub mod sampler;
pub mod samples;
pub mod util;

#[cfg(test)]
mod testutil;

pub use error::{ErrorKind, SamplerError};
pub use sampler::Sampler;
