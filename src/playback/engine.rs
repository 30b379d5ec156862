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
//! The playback engine: plays trimmed sample regions through the mixing bus and tracks the
//! voices it started.

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::voice::{next_voice_id, Voice, VoiceManager};
use crate::audio::resample::resample;
use crate::audio::{BusVoice, MixBus, VoiceEnd};
use crate::error::SamplerError;
use crate::playsync::CancelHandle;
use crate::samples::SampleStore;

/// A handle to a started voice.
#[derive(Debug, Clone)]
pub struct VoiceHandle {
    id: u64,
    slot: usize,
    cancel_handle: CancelHandle,
}

impl VoiceHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Stops the voice. Stopping a voice that has already finished or been stopped does
    /// nothing.
    pub fn stop(&self) {
        self.cancel_handle.cancel();
    }
}

/// Plays samples from the store through the shared mixing bus.
pub struct PlaybackEngine {
    /// Where samples are read from.
    store: Arc<SampleStore>,
    /// The shared mixing bus.
    bus: Arc<MixBus>,
    /// Voices that are sounding. Written only by the engine and its event listener.
    voices: Arc<Mutex<VoiceManager>>,
}

impl PlaybackEngine {
    /// Creates a new engine. `max_voices` caps polyphony; zero means unlimited.
    ///
    /// A listener thread removes voices from the tracked set as the bus reports them ended.
    /// It exits once the bus is dropped.
    pub fn new(store: Arc<SampleStore>, bus: Arc<MixBus>, max_voices: usize) -> PlaybackEngine {
        if store.sample_rate() != bus.sample_rate() {
            warn!(
                store_rate = store.sample_rate(),
                bus_rate = bus.sample_rate(),
                "Sample store and bus rates differ, samples will be converted on every trigger"
            );
        }
        let voices = Arc::new(Mutex::new(VoiceManager::new(max_voices)));

        let events = bus.voice_events();
        {
            let voices = voices.clone();
            thread::spawn(move || {
                for event in events.iter() {
                    let removed = voices.lock().remove(event.id);
                    if let Some(voice) = removed {
                        debug!(
                            voice = event.id,
                            slot = voice.slot(),
                            natural = event.end == VoiceEnd::Finished,
                            elapsed_ms = voice.elapsed().as_millis() as u64,
                            "Voice ended"
                        );
                    }
                }
                debug!("Voice event listener stopped");
            });
        }

        PlaybackEngine { store, bus, voices }
    }

    /// Plays the slot's sample from `start` to `end` seconds. Either bound defaults to the
    /// sample's trim range.
    pub fn play(
        &self,
        slot: usize,
        start: Option<f64>,
        end: Option<f64>,
    ) -> Result<VoiceHandle, SamplerError> {
        let playable = self.store.playable(slot)?;
        let duration = playable.audio.duration();
        let start = start.unwrap_or(playable.trim.left);
        let end = end.unwrap_or(playable.trim.right);

        // Written so that NaN bounds are rejected too.
        if !(start >= 0.0 && end <= duration && start < end) {
            return Err(SamplerError::InvalidRange {
                start,
                end,
                duration,
            });
        }

        // The store holds everything at its own rate, which normally matches the bus.
        let audio = if playable.audio.sample_rate() != self.bus.sample_rate() {
            Arc::new(resample(&playable.audio, self.bus.sample_rate())?)
        } else {
            playable.audio
        };

        let id = next_voice_id();
        let cancel_handle = CancelHandle::new();

        // Track the voice before the bus can report it ended.
        self.voices
            .lock()
            .add_voice(Voice::new(id, slot, cancel_handle.clone()))?;

        let start_frame = audio.frame_at(start);
        let end_frame = audio.frame_at(end);
        self.bus.add_voice(BusVoice::new(
            id,
            audio,
            start_frame,
            end_frame,
            cancel_handle.clone(),
        ));

        debug!(
            voice = id,
            slot,
            sample = playable.name,
            start,
            end,
            "Voice started"
        );

        Ok(VoiceHandle {
            id,
            slot,
            cancel_handle,
        })
    }

    /// Stops a single voice and stops tracking it.
    pub fn stop(&self, handle: &VoiceHandle) {
        handle.stop();
        self.voices.lock().remove(handle.id);
    }

    /// Stops every voice immediately. Calling this with nothing playing does nothing.
    pub fn stop_all(&self) {
        let to_stop = self.voices.lock().clear();

        // Cancel all voices via their handles (lock-free)
        let stopped_count = to_stop.len();
        for handle in to_stop {
            handle.cancel();
        }

        if stopped_count > 0 {
            info!(stopped = stopped_count, "All voices stopped");
        }
    }

    /// Returns the number of voices currently tracked.
    pub fn active_voice_count(&self) -> usize {
        self.voices.lock().active_count()
    }

    /// Returns the number of tracked voices started from the given slot.
    pub fn slot_voice_count(&self, slot: usize) -> usize {
        self.voices.lock().slot_count(slot)
    }

    /// Sets the mixing bus gain.
    pub fn set_gain(&self, gain: f32) {
        self.bus.set_gain(gain);
    }

    pub fn gain(&self) -> f32 {
        self.bus.gain()
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("active_voices", &self.active_voice_count())
            .field("max_voices", &self.voices.lock().max_voices())
            .field("gain", &self.gain())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioBuffer, SymphoniaDecoder};
    use crate::error::ErrorKind;
    use crate::samples::SourceRef;
    use crate::testutil::eventually;

    const RATE: u32 = 1000;

    fn setup(max_voices: usize) -> (Arc<SampleStore>, Arc<MixBus>, PlaybackEngine) {
        let store = Arc::new(SampleStore::new(Arc::new(SymphoniaDecoder::new(RATE))));
        let bus = Arc::new(MixBus::new(2, RATE));
        let engine = PlaybackEngine::new(store.clone(), bus.clone(), max_voices);
        (store, bus, engine)
    }

    fn load(store: &SampleStore, slot: usize, frames: usize, value: f32) {
        store
            .insert(
                slot,
                SourceRef::Synthetic(format!("pad{}", slot)),
                format!("pad{}", slot),
                AudioBuffer::new(vec![vec![value; frames]], RATE).unwrap(),
            )
            .unwrap();
    }

    fn render(bus: &MixBus, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames * bus.channels() as usize];
        bus.render(&mut out);
        out
    }

    #[test]
    fn test_play_empty_slot() {
        let (_, _, engine) = setup(16);
        assert_eq!(
            engine.play(0, None, None).unwrap_err(),
            SamplerError::NotLoaded(0)
        );
        assert_eq!(
            engine.play(99, None, None).unwrap_err().kind(),
            ErrorKind::InvalidSlot
        );
    }

    #[test]
    fn test_play_rejects_invalid_ranges() {
        let (store, _, engine) = setup(16);
        load(&store, 0, 1000, 0.5);

        for (start, end) in [
            (Some(0.0), Some(2.0)),
            (Some(-0.1), Some(0.5)),
            (Some(0.5), Some(0.5)),
            (Some(0.6), Some(0.2)),
            (Some(f64::NAN), None),
        ] {
            let err = engine.play(0, start, end).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRange, "{:?}..{:?}", start, end);
        }
        assert_eq!(engine.active_voice_count(), 0);
    }

    #[test]
    fn test_play_uses_trim_by_default() {
        let (store, bus, engine) = setup(16);
        store
            .insert(
                0,
                SourceRef::Synthetic("ramp".into()),
                "ramp",
                AudioBuffer::new(vec![(0..1000).map(|i| i as f32 / 1000.0).collect()], RATE)
                    .unwrap(),
            )
            .unwrap();
        store.set_trim(0, 0.1, 0.104).unwrap();

        engine.play(0, None, None).unwrap();
        let out = render(&bus, 8);
        // Frames 100..104 on both channels, then silence.
        let left: Vec<f32> = out.iter().step_by(2).copied().collect();
        assert_eq!(&left[..4], &[0.1, 0.101, 0.102, 0.103]);
        assert_eq!(&left[4..], &[0.0; 4]);
    }

    #[test]
    fn test_voice_bookkeeping() {
        let (store, bus, engine) = setup(16);
        for slot in 0..4 {
            load(&store, slot, 100, 0.1);
        }

        for slot in 0..4 {
            engine.play(slot, None, None).unwrap();
        }
        assert_eq!(engine.active_voice_count(), 4);

        engine.stop_all();
        assert_eq!(engine.active_voice_count(), 0);
        engine.stop_all();

        // Stopped voices are silenced on the next block.
        assert!(render(&bus, 10).iter().all(|s| *s == 0.0));
        assert_eq!(bus.active_voices(), 0);
    }

    #[test]
    fn test_voices_remove_themselves_on_completion() {
        let (store, bus, engine) = setup(16);
        load(&store, 0, 50, 0.1);
        load(&store, 1, 120, 0.1);

        let first = engine.play(0, None, None).unwrap();
        engine.play(1, None, None).unwrap();
        assert_eq!(engine.active_voice_count(), 2);

        render(&bus, 64);
        eventually(
            || engine.active_voice_count() == 1,
            "First voice was never removed",
        );
        assert_eq!(engine.slot_voice_count(1), 1);

        render(&bus, 64);
        eventually(
            || engine.active_voice_count() == 0,
            "Second voice was never removed",
        );

        // Stopping a voice that already completed is harmless.
        first.stop();
        engine.stop(&first);
        engine.stop_all();
    }

    #[test]
    fn test_single_voice_stop() {
        let (store, bus, engine) = setup(16);
        load(&store, 0, 1000, 0.25);

        let a = engine.play(0, None, None).unwrap();
        engine.play(0, None, None).unwrap();
        assert_eq!(engine.slot_voice_count(0), 2);

        engine.stop(&a);
        assert_eq!(engine.active_voice_count(), 1);
        let out = render(&bus, 4);
        assert!(out.iter().all(|s| *s == 0.25));
    }

    #[test]
    fn test_polyphony_limit() {
        let (store, _, engine) = setup(2);
        load(&store, 0, 100, 0.1);

        engine.play(0, None, None).unwrap();
        engine.play(0, None, None).unwrap();
        assert_eq!(
            engine.play(0, None, None).unwrap_err(),
            SamplerError::PolyphonyLimit { max: 2 }
        );

        engine.stop_all();
        assert!(engine.play(0, None, None).is_ok());
    }

    #[test]
    fn test_cleared_sample_keeps_playing() {
        let (store, bus, engine) = setup(16);
        load(&store, 0, 100, 0.5);
        engine.play(0, None, None).unwrap();
        store.clear(0).unwrap();

        let out = render(&bus, 4);
        assert!(out.iter().all(|s| *s == 0.5));
        assert_eq!(engine.active_voice_count(), 1);
    }

    #[test]
    fn test_gain() {
        let (store, bus, engine) = setup(16);
        load(&store, 0, 100, 0.5);
        engine.set_gain(0.5);
        assert_eq!(engine.gain(), 0.5);
        engine.play(0, None, None).unwrap();
        assert!(render(&bus, 4).iter().all(|s| *s == 0.25));
    }

    #[test]
    fn test_mismatched_rate_is_resampled() {
        let (store, bus, engine) = setup(16);
        store
            .insert(
                0,
                SourceRef::Synthetic("slow".into()),
                "slow",
                AudioBuffer::new(vec![vec![0.5; 50]], RATE / 2).unwrap(),
            )
            .unwrap();
        // Converted when inserted, so triggers play the stored buffer as is.
        let stored = store.playable(0).unwrap().audio;
        assert_eq!(stored.sample_rate(), RATE);
        assert_eq!(stored.frames(), 100);
        engine.play(0, None, None).unwrap();

        // 50 frames at half the rate become 100 frames on the bus.
        render(&bus, 99);
        assert_eq!(engine.active_voice_count(), 1);
        render(&bus, 1);
        eventually(
            || engine.active_voice_count() == 0,
            "Resampled voice never finished",
        );
    }

    #[test]
    fn test_store_at_other_rate_is_converted_for_the_bus() {
        let store = Arc::new(SampleStore::new(Arc::new(SymphoniaDecoder::new(RATE * 2))));
        let bus = Arc::new(MixBus::new(1, RATE));
        let engine = PlaybackEngine::new(store.clone(), bus.clone(), 16);
        store
            .insert(
                0,
                SourceRef::Synthetic("fast".into()),
                "fast",
                AudioBuffer::new(vec![vec![0.5; 100]], RATE * 2).unwrap(),
            )
            .unwrap();
        engine.play(0, None, None).unwrap();

        // 100 frames at twice the bus rate last 50 bus frames.
        render(&bus, 49);
        assert_eq!(engine.active_voice_count(), 1);
        render(&bus, 1);
        eventually(
            || engine.active_voice_count() == 0,
            "Converted voice never finished",
        );
    }
}
