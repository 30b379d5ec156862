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
use std::sync::Arc;

use tracing::{info, warn};

use crate::audio::{AudioDecoder, MixBus, SymphoniaDecoder};
use crate::catalog::{resolve_sample_url, Preset};
use crate::config::{ConfigError, SamplerConfig};
use crate::playback::PlaybackEngine;
use crate::recorder::{CaptureDestination, SessionRecorder};
use crate::samples::{
    BulkLoad, BulkOutcome, Fetcher, SampleStore, SlotTarget, SourceRef, SLOT_COUNT,
};

/// Owns the mixing bus and every component that shares it. Components are built once here
/// and handed out by reference.
pub struct Sampler {
    bus: Arc<MixBus>,
    capture: Arc<CaptureDestination>,
    decoder: Arc<dyn AudioDecoder>,
    store: Arc<SampleStore>,
    engine: PlaybackEngine,
    recorder: SessionRecorder,
    files_url: String,
}

impl Sampler {
    /// Builds a sampler whose bus runs at the given rate and channel count.
    pub fn new(
        config: &SamplerConfig,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Sampler, ConfigError> {
        let flush_interval = config.recorder().flush_interval()?;

        let decoder: Arc<dyn AudioDecoder> = Arc::new(SymphoniaDecoder::new(sample_rate));
        let bus = Arc::new(MixBus::new(channels, sample_rate));
        bus.set_gain(config.audio().master_gain());

        let capture = CaptureDestination::attach(&bus);
        let store = Arc::new(SampleStore::new(decoder.clone()));
        let engine = PlaybackEngine::new(
            store.clone(),
            bus.clone(),
            config.audio().max_polyphony(),
        );
        let recorder = SessionRecorder::new(capture.clone(), decoder.clone(), flush_interval);

        info!(
            sample_rate,
            channels,
            max_polyphony = config.audio().max_polyphony(),
            gain = bus.gain(),
            "Sampler initialized"
        );

        Ok(Sampler {
            bus,
            capture,
            decoder,
            store,
            engine,
            recorder,
            files_url: config.api().files_url(),
        })
    }

    pub fn bus(&self) -> &Arc<MixBus> {
        &self.bus
    }

    pub fn capture(&self) -> &Arc<CaptureDestination> {
        &self.capture
    }

    pub fn decoder(&self) -> &Arc<dyn AudioDecoder> {
        &self.decoder
    }

    pub fn store(&self) -> &Arc<SampleStore> {
        &self.store
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    /// Replaces the pad contents with the preset: every slot is cleared, then sample `i` is
    /// loaded into slot `i`. Samples beyond the last slot are ignored.
    pub async fn load_preset(&self, preset: &Preset, fetcher: &dyn Fetcher) -> Vec<BulkOutcome> {
        if preset.samples.len() > SLOT_COUNT {
            warn!(
                preset = preset.name,
                samples = preset.samples.len(),
                slots = SLOT_COUNT,
                "Preset has more samples than slots"
            );
        }

        self.store.clear_all();
        let items = preset
            .samples
            .iter()
            .take(SLOT_COUNT)
            .enumerate()
            .map(|(slot, sample)| {
                let item = BulkLoad::new(
                    SlotTarget::Index(slot),
                    SourceRef::Url(resolve_sample_url(&self.files_url, &sample.url)),
                );
                if sample.name.is_empty() {
                    item
                } else {
                    item.named(sample.name.clone())
                }
            })
            .collect();

        let outcomes = self.store.load_all(items, fetcher).await;
        info!(
            preset = preset.name,
            loaded = outcomes.iter().filter(|outcome| outcome.is_ok()).count(),
            requested = outcomes.len(),
            "Preset loaded"
        );
        outcomes
    }
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler")
            .field("bus", &self.bus)
            .field("store", &self.store)
            .field("engine", &self.engine)
            .field("recorder", &self.recorder)
            .finish()
    }
}
