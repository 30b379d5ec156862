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
//! The shared mixing bus. Every voice is summed here, scaled by the bus gain and handed to
//! whichever output driver is rendering, with a copy going to the capture tap.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::audio::AudioBuffer;
use crate::playsync::CancelHandle;

/// Why a voice left the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceEnd {
    /// The voice reached the end of its range.
    Finished,
    /// The voice was cancelled.
    Stopped,
}

/// Emitted exactly once for every voice that was added to the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceEvent {
    pub id: u64,
    pub end: VoiceEnd,
}

/// Receives every rendered block after the gain has been applied.
pub trait BusTap: Send + Sync {
    /// Called from the rendering thread. Must not block.
    fn push_block(&self, block: &[f32]);
}

/// A voice scheduled on the bus: a frame range within a shared buffer.
pub struct BusVoice {
    /// Unique ID for this voice.
    id: u64,
    /// The decoded audio this voice reads from.
    buffer: Arc<AudioBuffer>,
    /// The next frame to render.
    position: usize,
    /// The frame to stop at (exclusive).
    end: usize,
    /// Source channel index -> bus channel indices.
    channel_mappings: Vec<Vec<usize>>,
    /// Cancel handle for stopping this voice without taking the bus lock.
    cancel_handle: CancelHandle,
}

impl BusVoice {
    /// Creates a voice that renders frames `start..end` of the buffer.
    pub fn new(
        id: u64,
        buffer: Arc<AudioBuffer>,
        start: usize,
        end: usize,
        cancel_handle: CancelHandle,
    ) -> BusVoice {
        let end = end.min(buffer.frames());
        BusVoice {
            id,
            position: start.min(end),
            end,
            buffer,
            channel_mappings: Vec::new(),
            cancel_handle,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Mono sources feed every bus channel, otherwise source channel i feeds bus channel i.
    fn precompute_channel_mappings(source_channels: usize, bus_channels: usize) -> Vec<Vec<usize>> {
        if source_channels == 1 {
            return vec![(0..bus_channels).collect()];
        }
        (0..source_channels)
            .map(|channel| {
                if channel < bus_channels {
                    vec![channel]
                } else {
                    Vec::new()
                }
            })
            .collect()
    }

    /// Mixes up to `frames` frames into the interleaved output. Returns true once the voice
    /// has reached its end.
    fn mix_into(&mut self, out: &mut [f32], bus_channels: usize, frames: usize) -> bool {
        let count = frames.min(self.end - self.position);
        for (source_channel, outputs) in self.channel_mappings.iter().enumerate() {
            if outputs.is_empty() {
                continue;
            }
            let data = &self.buffer.channel(source_channel)[self.position..self.position + count];
            for (frame, sample) in data.iter().enumerate() {
                let base = frame * bus_channels;
                for output in outputs {
                    out[base + output] += sample;
                }
            }
        }
        self.position += count;
        self.position >= self.end
    }
}

/// The process-wide mixing bus.
pub struct MixBus {
    /// Number of output channels.
    channels: u16,
    /// Sample rate of the bus. Every buffer played must already be at this rate.
    sample_rate: u32,
    /// Voices currently producing sound. Only the rendering thread holds this for long.
    voices: Mutex<Vec<BusVoice>>,
    /// Newly scheduled voices, picked up at the start of the next block.
    pending_tx: Sender<BusVoice>,
    pending_rx: Receiver<BusVoice>,
    /// Voice end notifications.
    events_tx: Sender<VoiceEvent>,
    events_rx: Receiver<VoiceEvent>,
    /// Bus gain stored as f32 bits.
    gain: AtomicU32,
    /// Capture tap, attached once.
    tap: RwLock<Option<Arc<dyn BusTap>>>,
    /// Frames rendered since the bus was created.
    frames_rendered: AtomicU64,
}

impl MixBus {
    /// Creates a new bus with unity gain.
    pub fn new(channels: u16, sample_rate: u32) -> MixBus {
        let (pending_tx, pending_rx) = crossbeam_channel::unbounded();
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        MixBus {
            channels: channels.max(1),
            sample_rate,
            voices: Mutex::new(Vec::new()),
            pending_tx,
            pending_rx,
            events_tx,
            events_rx,
            gain: AtomicU32::new(1.0f32.to_bits()),
            tap: RwLock::new(None),
            frames_rendered: AtomicU64::new(0),
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Sets the bus gain. Negative and non-finite values are treated as silence.
    pub fn set_gain(&self, gain: f32) {
        let gain = if gain.is_finite() { gain.max(0.0) } else { 0.0 };
        self.gain.store(gain.to_bits(), Ordering::Relaxed);
    }

    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    /// A receiver of voice end events. Every event is delivered to exactly one receiver.
    pub fn voice_events(&self) -> Receiver<VoiceEvent> {
        self.events_rx.clone()
    }

    /// Attaches the capture tap. Any previously attached tap is replaced.
    pub fn attach_tap(&self, tap: Arc<dyn BusTap>) {
        *self.tap.write() = Some(tap);
    }

    /// Schedules a voice. It starts sounding at the beginning of the next rendered block.
    pub fn add_voice(&self, mut voice: BusVoice) {
        voice.channel_mappings = BusVoice::precompute_channel_mappings(
            voice.buffer.channel_count() as usize,
            self.channels as usize,
        );
        debug!(
            voice = voice.id,
            frames = voice.end - voice.position,
            "Voice scheduled"
        );
        // The receiver lives as long as the bus, so this cannot fail.
        let _ = self.pending_tx.send(voice);
    }

    /// Voices that are scheduled or sounding.
    pub fn active_voices(&self) -> usize {
        self.voices.lock().len() + self.pending_rx.len()
    }

    /// Frames rendered since the bus was created.
    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    /// Renders one interleaved block into `out`. The block length should be a multiple of
    /// the channel count; any trailing partial frame is left silent.
    pub fn render(&self, out: &mut [f32]) {
        let bus_channels = self.channels as usize;
        let frames = out.len() / bus_channels;
        out.fill(0.0);

        let mut ended = Vec::new();
        {
            let mut voices = self.voices.lock();
            while let Ok(voice) = self.pending_rx.try_recv() {
                voices.push(voice);
            }

            voices.retain_mut(|voice| {
                if voice.cancel_handle.is_cancelled() {
                    ended.push(VoiceEvent {
                        id: voice.id,
                        end: VoiceEnd::Stopped,
                    });
                    return false;
                }
                if voice.mix_into(out, bus_channels, frames) {
                    ended.push(VoiceEvent {
                        id: voice.id,
                        end: VoiceEnd::Finished,
                    });
                    return false;
                }
                true
            });
        }

        let gain = self.gain();
        if gain != 1.0 {
            out.iter_mut().for_each(|sample| *sample *= gain);
        }

        if let Some(tap) = self.tap.read().as_ref() {
            tap.push_block(out);
        }

        self.frames_rendered
            .fetch_add(frames as u64, Ordering::Relaxed);

        for event in ended {
            let _ = self.events_tx.send(event);
        }
    }
}

impl fmt::Debug for MixBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixBus")
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .field("gain", &self.gain())
            .field("active_voices", &self.active_voices())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn buffer(channels: Vec<Vec<f32>>) -> Arc<AudioBuffer> {
        Arc::new(AudioBuffer::new(channels, 100).unwrap())
    }

    #[test]
    fn test_mono_voice_feeds_all_channels() {
        let bus = MixBus::new(2, 100);
        bus.add_voice(BusVoice::new(
            1,
            buffer(vec![vec![0.5, 0.25]]),
            0,
            2,
            CancelHandle::new(),
        ));

        let mut out = vec![0.0; 6];
        bus.render(&mut out);
        assert_eq!(out, vec![0.5, 0.5, 0.25, 0.25, 0.0, 0.0]);

        let event = bus.voice_events().try_recv().unwrap();
        assert_eq!(
            event,
            VoiceEvent {
                id: 1,
                end: VoiceEnd::Finished
            }
        );
        assert_eq!(bus.active_voices(), 0);
        assert_eq!(bus.frames_rendered(), 3);
    }

    #[test]
    fn test_stereo_voice_maps_channels_and_range() {
        let bus = MixBus::new(2, 100);
        bus.add_voice(BusVoice::new(
            7,
            buffer(vec![vec![0.1, 0.2, 0.3, 0.4], vec![-0.1, -0.2, -0.3, -0.4]]),
            1,
            3,
            CancelHandle::new(),
        ));

        let mut out = vec![0.0; 4];
        bus.render(&mut out);
        assert_eq!(out, vec![0.2, -0.2, 0.3, -0.3]);
        // Reached its end exactly at the block boundary.
        assert_eq!(bus.voice_events().try_recv().unwrap().end, VoiceEnd::Finished);
    }

    #[test]
    fn test_voices_sum_and_gain_applies() {
        let bus = MixBus::new(1, 100);
        bus.set_gain(0.5);
        for id in 0..3 {
            bus.add_voice(BusVoice::new(
                id,
                buffer(vec![vec![0.2; 10]]),
                0,
                10,
                CancelHandle::new(),
            ));
        }

        let mut out = vec![0.0; 4];
        bus.render(&mut out);
        for sample in out {
            assert!((sample - 0.3).abs() < 1e-6);
        }
        assert_eq!(bus.active_voices(), 3);
        assert!(bus.voice_events().try_recv().is_err());
    }

    #[test]
    fn test_cancelled_voice_emits_single_stop_event() {
        let bus = MixBus::new(2, 100);
        let cancel_handle = CancelHandle::new();
        bus.add_voice(BusVoice::new(
            3,
            buffer(vec![vec![0.5; 100]]),
            0,
            100,
            cancel_handle.clone(),
        ));

        let mut out = vec![0.0; 20];
        bus.render(&mut out);
        assert!(out.iter().all(|s| *s == 0.5));

        cancel_handle.cancel();
        cancel_handle.cancel();
        bus.render(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));

        let events = bus.voice_events();
        assert_eq!(
            events.try_recv().unwrap(),
            VoiceEvent {
                id: 3,
                end: VoiceEnd::Stopped
            }
        );
        bus.render(&mut out);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_tap_receives_post_gain_blocks() {
        struct Recorder(Mutex<Vec<f32>>);
        impl BusTap for Recorder {
            fn push_block(&self, block: &[f32]) {
                self.0.lock().extend_from_slice(block);
            }
        }

        let bus = MixBus::new(1, 100);
        let tap = Arc::new(Recorder(Mutex::new(Vec::new())));
        bus.attach_tap(tap.clone());
        bus.set_gain(2.0);
        bus.add_voice(BusVoice::new(
            1,
            buffer(vec![vec![0.25, 0.25]]),
            0,
            2,
            CancelHandle::new(),
        ));

        let mut out = vec![0.0; 3];
        bus.render(&mut out);
        assert_eq!(*tap.0.lock(), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_invalid_gain_is_silence() {
        let bus = MixBus::new(2, 44100);
        assert_eq!(bus.gain(), 1.0);
        bus.set_gain(f32::NAN);
        assert_eq!(bus.gain(), 0.0);
        bus.set_gain(-1.0);
        assert_eq!(bus.gain(), 0.0);
    }
}
