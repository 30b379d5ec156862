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
//! The fixed set of sample slots behind the pad grid.
//!
//! A slot is only ever updated atomically when a decode succeeds. Every load takes a new
//! generation for its slot up front; a result that comes back after a newer load began is
//! discarded instead of clobbering the newer sample.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::fetch::{read_file, Fetcher};
use super::sample::{Sample, SampleInfo, SourceRef, TrimRange};
use crate::audio::resample::resample;
use crate::audio::{AudioBuffer, AudioDecoder};
use crate::error::SamplerError;

/// The number of pads.
pub const SLOT_COUNT: usize = 16;

/// The load state of a slot.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Empty,
    Loading,
    Loaded,
    Failed(SamplerError),
}

/// A single pad slot.
#[derive(Debug, Clone)]
struct Slot {
    sample: Option<Sample>,
    state: LoadState,
    /// Bumped whenever a load begins or the slot is cleared.
    generation: u64,
}

impl Slot {
    fn empty() -> Slot {
        Slot {
            sample: None,
            state: LoadState::Empty,
            generation: 0,
        }
    }
}

/// Where a bulk load item should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTarget {
    /// A specific slot.
    Index(usize),
    /// The lowest free slot.
    Append,
}

/// One item of a bulk load.
#[derive(Debug, Clone)]
pub struct BulkLoad {
    pub target: SlotTarget,
    pub source: SourceRef,
    /// Overrides the name derived from the source.
    pub name: Option<String>,
}

impl BulkLoad {
    pub fn new(target: SlotTarget, source: SourceRef) -> BulkLoad {
        BulkLoad {
            target,
            source,
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> BulkLoad {
        self.name = Some(name.into());
        self
    }
}

/// The outcome of one bulk load item. `slot` is None if no slot could be assigned.
#[derive(Debug, Clone)]
pub struct BulkOutcome {
    pub slot: Option<usize>,
    pub source: SourceRef,
    pub result: Result<SampleInfo, SamplerError>,
}

impl BulkOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Everything the playback engine needs from a slot, captured at a single point in time.
#[derive(Debug, Clone)]
pub struct PlayableSample {
    pub name: String,
    pub audio: Arc<AudioBuffer>,
    pub trim: TrimRange,
}

/// The pad slots plus the currently selected pad.
pub struct SampleStore {
    slots: RwLock<Vec<Slot>>,
    selected: RwLock<Option<usize>>,
    decoder: Arc<dyn AudioDecoder>,
}

impl SampleStore {
    /// Creates an empty store that decodes with the given decoder.
    pub fn new(decoder: Arc<dyn AudioDecoder>) -> SampleStore {
        SampleStore {
            slots: RwLock::new(vec![Slot::empty(); SLOT_COUNT]),
            selected: RwLock::new(None),
            decoder,
        }
    }

    /// The number of slots.
    pub fn capacity(&self) -> usize {
        SLOT_COUNT
    }

    /// The sample rate every stored sample is held at.
    pub fn sample_rate(&self) -> u32 {
        self.decoder.target_sample_rate()
    }

    fn check_slot(slot: usize) -> Result<(), SamplerError> {
        if slot >= SLOT_COUNT {
            return Err(SamplerError::InvalidSlot(slot));
        }
        Ok(())
    }

    /// Marks the slot as loading and returns the generation the load must commit under.
    fn begin_load(&self, slot: usize) -> Result<u64, SamplerError> {
        Self::check_slot(slot)?;
        let mut slots = self.slots.write();
        let entry = &mut slots[slot];
        entry.generation += 1;
        entry.state = LoadState::Loading;
        Ok(entry.generation)
    }

    /// Applies a finished load if it is still the newest for its slot. A failure keeps the
    /// previous sample in place.
    fn commit(
        &self,
        slot: usize,
        generation: u64,
        result: Result<Sample, SamplerError>,
    ) -> Result<SampleInfo, SamplerError> {
        let mut slots = self.slots.write();
        let entry = &mut slots[slot];
        if entry.generation != generation {
            warn!(
                slot,
                generation,
                current = entry.generation,
                "Discarding superseded load"
            );
            return Err(SamplerError::Superseded(slot));
        }

        match result {
            Ok(sample) => {
                let info = sample.info(slot);
                info!(
                    slot,
                    name = info.name,
                    source = %info.source,
                    channels = info.channels,
                    duration_ms = (info.duration * 1000.0) as u64,
                    memory_kb = sample.audio().memory_size() / 1024,
                    "Sample loaded"
                );
                entry.sample = Some(sample);
                entry.state = LoadState::Loaded;
                Ok(info)
            }
            Err(e) => {
                warn!(slot, err = %e, kind = %e.kind(), "Sample load failed");
                entry.state = LoadState::Failed(e.clone());
                Err(e)
            }
        }
    }

    /// Decodes bytes into a sample off the async executor.
    async fn decode(
        &self,
        source: SourceRef,
        name: Option<String>,
        bytes: Arc<[u8]>,
    ) -> Result<Sample, SamplerError> {
        let decoder = self.decoder.clone();
        let extension = source.extension();
        let raw = bytes.clone();
        let audio = tokio::task::spawn_blocking(move || decoder.decode(raw, extension.as_deref()))
            .await
            .map_err(|e| SamplerError::DecodeFailure(format!("decode task failed: {}", e)))??;
        if audio.frames() == 0 {
            return Err(SamplerError::DecodeFailure(
                "decoded audio has no frames".to_string(),
            ));
        }

        let name = name.unwrap_or_else(|| source.display_name());
        Ok(Sample::new(source, name, Arc::new(audio), Some(bytes)))
    }

    /// Retrieves the bytes behind a source.
    async fn fetch(source: &SourceRef, fetcher: &dyn Fetcher) -> Result<Vec<u8>, SamplerError> {
        match source {
            SourceRef::Url(url) => fetcher.fetch(url).await,
            SourceRef::File(path) => read_file(path).await,
            SourceRef::Synthetic(label) => Err(SamplerError::IoFailure(format!(
                "synthetic source {} has no backing data",
                label
            ))),
        }
    }

    /// Fetches and decodes a source under an already reserved generation.
    async fn load_reserved(
        &self,
        slot: usize,
        generation: u64,
        source: SourceRef,
        name: Option<String>,
        fetcher: &dyn Fetcher,
    ) -> Result<SampleInfo, SamplerError> {
        let result = match Self::fetch(&source, fetcher).await {
            Ok(bytes) => self.decode(source, name, bytes.into()).await,
            Err(e) => Err(e),
        };
        self.commit(slot, generation, result)
    }

    /// Decodes encoded bytes into the slot. On failure the slot is marked failed and any
    /// previous sample is kept.
    pub async fn load_from_bytes(
        &self,
        slot: usize,
        source: SourceRef,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<SampleInfo, SamplerError> {
        let generation = self.begin_load(slot)?;
        let result = self.decode(source, None, bytes.into()).await;
        self.commit(slot, generation, result)
    }

    /// Fetches a URL and decodes it into the slot. Fetch failures are reported as network
    /// failures, decode failures as decode failures.
    pub async fn load_from_url(
        &self,
        slot: usize,
        url: &str,
        fetcher: &dyn Fetcher,
    ) -> Result<SampleInfo, SamplerError> {
        let generation = self.begin_load(slot)?;
        self.load_reserved(slot, generation, SourceRef::Url(url.to_string()), None, fetcher)
            .await
    }

    /// Reads a local file (a user upload) into the slot.
    pub async fn load_from_file(
        &self,
        slot: usize,
        path: &Path,
    ) -> Result<SampleInfo, SamplerError> {
        let generation = self.begin_load(slot)?;
        let source = SourceRef::File(path.to_path_buf());
        let result = match read_file(path).await {
            Ok(bytes) => self.decode(source, None, bytes.into()).await,
            Err(e) => Err(e),
        };
        self.commit(slot, generation, result)
    }

    /// Loads any source into the slot.
    pub async fn load_source(
        &self,
        slot: usize,
        source: SourceRef,
        fetcher: &dyn Fetcher,
    ) -> Result<SampleInfo, SamplerError> {
        let generation = self.begin_load(slot)?;
        self.load_reserved(slot, generation, source, None, fetcher)
            .await
    }

    /// Places an already decoded buffer into the slot. Audio at another sample rate is
    /// converted to the store's rate once, here.
    pub fn insert(
        &self,
        slot: usize,
        source: SourceRef,
        name: impl Into<String>,
        audio: AudioBuffer,
    ) -> Result<SampleInfo, SamplerError> {
        let generation = self.begin_load(slot)?;
        let result = if audio.frames() == 0 {
            Err(SamplerError::DecodeFailure(
                "audio has no frames".to_string(),
            ))
        } else if audio.sample_rate() != self.sample_rate() {
            resample(&audio, self.sample_rate())
                .map(|audio| Sample::new(source, name, Arc::new(audio), None))
        } else {
            Ok(Sample::new(source, name, Arc::new(audio), None))
        };
        self.commit(slot, generation, result)
    }

    /// Loads every item concurrently and reports one outcome per item, in input order.
    /// Append targets are assigned to free slots, in order, before any load starts. A
    /// failing item never affects the others.
    pub async fn load_all(&self, items: Vec<BulkLoad>, fetcher: &dyn Fetcher) -> Vec<BulkOutcome> {
        let mut reserved: Vec<Result<(usize, u64), SamplerError>> = Vec::with_capacity(items.len());
        let mut claimed = Vec::new();
        for item in items.iter() {
            let slot = match item.target {
                SlotTarget::Index(slot) => Ok(slot),
                SlotTarget::Append => self.free_slot_excluding(&claimed),
            };
            let reservation = slot.and_then(|slot| {
                claimed.push(slot);
                self.begin_load(slot).map(|generation| (slot, generation))
            });
            reserved.push(reservation);
        }

        let loads = items
            .into_iter()
            .zip(reserved)
            .map(|(item, reservation)| async move {
                let result = match reservation {
                    Ok((slot, generation)) => (
                        Some(slot),
                        self.load_reserved(slot, generation, item.source.clone(), item.name, fetcher)
                            .await,
                    ),
                    Err(e) => (None, Err(e)),
                };
                BulkOutcome {
                    slot: result.0,
                    source: item.source,
                    result: result.1,
                }
            });
        let outcomes = join_all(loads).await;

        let failed = outcomes.iter().filter(|outcome| !outcome.is_ok()).count();
        info!(
            total = outcomes.len(),
            failed,
            "Bulk load finished"
        );
        outcomes
    }

    /// The lowest slot that holds no sample, has no load in flight and is not in `claimed`.
    /// A slot whose load failed without an earlier sample counts as free.
    fn free_slot_excluding(&self, claimed: &[usize]) -> Result<usize, SamplerError> {
        let slots = self.slots.read();
        slots
            .iter()
            .enumerate()
            .find(|(index, slot)| {
                slot.sample.is_none()
                    && slot.state != LoadState::Loading
                    && !claimed.contains(index)
            })
            .map(|(index, _)| index)
            .ok_or(SamplerError::NoFreeSlot)
    }

    /// The lowest slot without a sample or a load in flight.
    pub fn next_free_slot(&self) -> Option<usize> {
        self.free_slot_excluding(&[]).ok()
    }

    /// Sets the trim range of the slot's sample, clamped to a valid range. Does nothing if
    /// the slot has no sample.
    pub fn set_trim(&self, slot: usize, left: f64, right: f64) -> Result<(), SamplerError> {
        Self::check_slot(slot)?;
        let mut slots = self.slots.write();
        if let Some(sample) = slots[slot].sample.as_mut() {
            let trim = sample.set_trim(left, right);
            debug!(slot, left = trim.left, right = trim.right, "Trim updated");
        }
        Ok(())
    }

    /// The trim range of the slot's sample.
    pub fn trim(&self, slot: usize) -> Option<TrimRange> {
        self.slots
            .read()
            .get(slot)
            .and_then(|slot| slot.sample.as_ref())
            .map(|sample| sample.trim())
    }

    /// Drops the slot's sample. Voices already playing it keep their own reference to the
    /// audio and finish normally. Any load in flight for the slot is discarded.
    pub fn clear(&self, slot: usize) -> Result<(), SamplerError> {
        Self::check_slot(slot)?;
        {
            let mut slots = self.slots.write();
            let entry = &mut slots[slot];
            entry.generation += 1;
            entry.sample = None;
            entry.state = LoadState::Empty;
        }
        let mut selected = self.selected.write();
        if *selected == Some(slot) {
            *selected = None;
        }
        debug!(slot, "Slot cleared");
        Ok(())
    }

    /// Clears every slot and the selection.
    pub fn clear_all(&self) {
        let mut slots = self.slots.write();
        for entry in slots.iter_mut() {
            entry.generation += 1;
            entry.sample = None;
            entry.state = LoadState::Empty;
        }
        *self.selected.write() = None;
        debug!("All slots cleared");
    }

    pub fn load_state(&self, slot: usize) -> Option<LoadState> {
        self.slots.read().get(slot).map(|slot| slot.state.clone())
    }

    pub fn sample_info(&self, slot: usize) -> Option<SampleInfo> {
        self.slots
            .read()
            .get(slot)
            .and_then(|entry| entry.sample.as_ref())
            .map(|sample| sample.info(slot))
    }

    /// The original encoded bytes of the slot's sample.
    pub fn raw_bytes(&self, slot: usize) -> Option<Arc<[u8]>> {
        self.slots
            .read()
            .get(slot)
            .and_then(|entry| entry.sample.as_ref())
            .and_then(|sample| sample.raw_bytes().cloned())
    }

    /// A snapshot of the slot's audio and trim for playback.
    pub fn playable(&self, slot: usize) -> Result<PlayableSample, SamplerError> {
        Self::check_slot(slot)?;
        let slots = self.slots.read();
        let sample = slots[slot]
            .sample
            .as_ref()
            .ok_or(SamplerError::NotLoaded(slot))?;
        Ok(PlayableSample {
            name: sample.name().to_string(),
            audio: sample.audio().clone(),
            trim: sample.trim(),
        })
    }

    /// The number of slots holding a sample.
    pub fn loaded_count(&self) -> usize {
        self.slots
            .read()
            .iter()
            .filter(|slot| slot.sample.is_some())
            .count()
    }

    /// Selects a slot, or clears the selection.
    pub fn select(&self, slot: Option<usize>) -> Result<(), SamplerError> {
        if let Some(slot) = slot {
            Self::check_slot(slot)?;
        }
        *self.selected.write() = slot;
        Ok(())
    }

    pub fn selected(&self) -> Option<usize> {
        *self.selected.read()
    }
}

impl fmt::Debug for SampleStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleStore")
            .field("loaded", &self.loaded_count())
            .field("capacity", &SLOT_COUNT)
            .field("selected", &self.selected())
            .finish()
    }
}
