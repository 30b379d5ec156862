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
//! Bookkeeping for voices that are currently sounding.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::SamplerError;
use crate::playsync::CancelHandle;

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a unique voice ID.
pub(crate) fn next_voice_id() -> u64 {
    NEXT_VOICE_ID.fetch_add(1, Ordering::SeqCst)
}

/// Represents an active voice playing a sample.
pub struct Voice {
    /// Unique ID for this voice, shared with the bus voice.
    id: u64,
    /// The slot the voice was triggered from.
    slot: usize,
    /// When this voice started playing.
    start_time: Instant,
    /// Cancel handle for stopping this voice without lock contention.
    cancel_handle: CancelHandle,
}

impl Voice {
    /// Creates a new voice.
    pub fn new(id: u64, slot: usize, cancel_handle: CancelHandle) -> Self {
        Self {
            id,
            slot,
            start_time: Instant::now(),
            cancel_handle,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// How long the voice has been playing.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Manages active voices for sample playback.
pub struct VoiceManager {
    /// Active voices.
    voices: Vec<Voice>,
    /// Global maximum voices limit. Zero means unlimited.
    max_voices: usize,
}

impl VoiceManager {
    /// Creates a new voice manager.
    pub fn new(max_voices: usize) -> Self {
        Self {
            voices: Vec::new(),
            max_voices,
        }
    }

    /// Fails with a polyphony error if another voice would exceed the limit.
    pub fn check_capacity(&self) -> Result<(), SamplerError> {
        if self.max_voices > 0 && self.voices.len() >= self.max_voices {
            warn!(max_voices = self.max_voices, "Voice limit reached");
            return Err(SamplerError::PolyphonyLimit {
                max: self.max_voices,
            });
        }
        Ok(())
    }

    /// Adds a new voice, rejecting it if the limit has been reached.
    pub fn add_voice(&mut self, voice: Voice) -> Result<(), SamplerError> {
        self.check_capacity()?;
        self.voices.push(voice);
        Ok(())
    }

    /// Removes a voice by ID. Returns None if it was not tracked, which is normal for voices
    /// that were already force-stopped.
    pub fn remove(&mut self, id: u64) -> Option<Voice> {
        let index = self.voices.iter().position(|voice| voice.id == id)?;
        Some(self.voices.remove(index))
    }

    /// Removes every voice and returns their cancel handles.
    pub fn clear(&mut self) -> Vec<CancelHandle> {
        self.voices
            .drain(..)
            .map(|voice| voice.cancel_handle)
            .collect()
    }

    /// Returns the number of active voices.
    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    /// Returns the number of active voices triggered from the given slot.
    pub fn slot_count(&self, slot: usize) -> usize {
        self.voices.iter().filter(|voice| voice.slot == slot).count()
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices
    }
}
