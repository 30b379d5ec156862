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
use std::{
    fmt,
    io::Cursor,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;
use time::{OffsetDateTime, UtcOffset};
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::capture::CaptureDestination;
use crate::audio::{wav, AudioDecoder};
use crate::error::SamplerError;

/// The externally visible recorder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Finalizing,
}

/// A recording in progress.
struct Session {
    started: Instant,
    /// Resolves with every chunk once the capture destination releases the sink.
    chunks: oneshot::Receiver<Vec<Vec<u8>>>,
    chunks_received: Arc<AtomicUsize>,
}

enum State {
    Idle,
    Recording(Session),
    Finalizing,
}

/// Records everything that passes through the mixing bus and exports it as 16-bit PCM WAV.
pub struct SessionRecorder {
    capture: Arc<CaptureDestination>,
    decoder: Arc<dyn AudioDecoder>,
    flush_interval: Duration,
    state: Mutex<State>,
}

/// Returns the recorder to idle however finalizing ends.
struct FinalizeGuard<'a>(&'a Mutex<State>);

impl Drop for FinalizeGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = State::Idle;
    }
}

impl SessionRecorder {
    /// Creates an idle recorder over the bus capture destination.
    pub fn new(
        capture: Arc<CaptureDestination>,
        decoder: Arc<dyn AudioDecoder>,
        flush_interval: Duration,
    ) -> SessionRecorder {
        SessionRecorder {
            capture,
            decoder,
            flush_interval,
            state: Mutex::new(State::Idle),
        }
    }

    pub fn state(&self) -> RecorderState {
        match *self.state.lock() {
            State::Idle => RecorderState::Idle,
            State::Recording(_) => RecorderState::Recording,
            State::Finalizing => RecorderState::Finalizing,
        }
    }

    /// Starts recording the bus output. Any previous recording's chunks are discarded.
    pub fn start(&self) -> Result<(), SamplerError> {
        let mut state = self.state.lock();
        if !matches!(*state, State::Idle) {
            return Err(SamplerError::AlreadyRecording);
        }

        let (sink, chunk_rx) = crossbeam_channel::unbounded::<Vec<u8>>();
        let (done_tx, done_rx) = oneshot::channel();
        let chunks_received = Arc::new(AtomicUsize::new(0));
        {
            let chunks_received = chunks_received.clone();
            thread::spawn(move || {
                let mut chunks = Vec::new();
                for chunk in chunk_rx.iter() {
                    chunks.push(chunk);
                    chunks_received.fetch_add(1, Ordering::Relaxed);
                }
                let _ = done_tx.send(chunks);
            });
        }

        self.capture.arm(sink, self.flush_interval);
        *state = State::Recording(Session {
            started: Instant::now(),
            chunks: done_rx,
            chunks_received,
        });

        info!(
            channels = self.capture.channels(),
            sample_rate = self.capture.sample_rate(),
            flush_interval = ?self.flush_interval,
            "Recording started"
        );
        Ok(())
    }

    /// Stops recording and returns the session as 16-bit PCM WAV bytes. The recorder is idle
    /// again once this returns, whether or not it succeeded.
    pub async fn stop(&self) -> Result<Vec<u8>, SamplerError> {
        let session = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, State::Finalizing) {
                State::Recording(session) => session,
                previous => {
                    *state = previous;
                    return Err(SamplerError::NotRecording);
                }
            }
        };
        let _guard = FinalizeGuard(&self.state);
        let elapsed = session.started.elapsed();

        self.capture.disarm();
        let chunks = session.chunks.await.map_err(|_| {
            SamplerError::CaptureFailure("capture ended without delivering chunks".to_string())
        })?;

        let channels = self.capture.channels();
        let sample_rate = self.capture.sample_rate();
        let decoder = self.decoder.clone();
        let chunk_count = chunks.len();
        let result = tokio::task::spawn_blocking(move || {
            finalize(&chunks, channels, sample_rate, decoder.as_ref())
        })
        .await
        .map_err(|e| SamplerError::CaptureFailure(e.to_string()))?;

        match &result {
            Ok(bytes) => info!(
                seconds = elapsed.as_secs_f64(),
                chunks = chunk_count,
                bytes = bytes.len(),
                "Recording finished"
            ),
            Err(e) => warn!(err = %e, kind = %e.kind(), "Recording could not be finalized"),
        }
        result
    }

    /// Seconds since recording started, or zero when not recording.
    pub fn duration(&self) -> f64 {
        match &*self.state.lock() {
            State::Recording(session) => session.started.elapsed().as_secs_f64(),
            _ => 0.0,
        }
    }

    /// Chunks delivered so far in the current recording.
    pub fn chunks_received(&self) -> usize {
        match &*self.state.lock() {
            State::Recording(session) => session.chunks_received.load(Ordering::Relaxed),
            _ => 0,
        }
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        if matches!(*self.state.lock(), State::Recording(_)) {
            self.capture.disarm();
        }
    }
}

impl fmt::Debug for SessionRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRecorder")
            .field("state", &self.state())
            .field("flush_interval", &self.flush_interval)
            .finish()
    }
}

/// Turns captured chunks into the export format: chunks are joined into a float WAV
/// container, decoded, then encoded as 16-bit PCM.
fn finalize(
    chunks: &[Vec<u8>],
    channels: u16,
    sample_rate: u32,
    decoder: &dyn AudioDecoder,
) -> Result<Vec<u8>, SamplerError> {
    if chunks.iter().all(|chunk| chunk.is_empty()) {
        return wav::encode_channels(&vec![Vec::new(); channels as usize], sample_rate);
    }

    let container = assemble(chunks, channels, sample_rate)?;
    let decoded = decoder.decode(Arc::from(container), Some("wav"))?;
    wav::encode(&decoded)
}

/// Joins raw little-endian f32 chunks into a 32-bit float WAV container.
fn assemble(chunks: &[Vec<u8>], channels: u16, sample_rate: u32) -> Result<Vec<u8>, SamplerError> {
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = WavWriter::new(
        &mut cursor,
        WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    for chunk in chunks {
        if chunk.len() % 4 != 0 {
            return Err(SamplerError::CaptureFailure(format!(
                "chunk of {} bytes is not whole samples",
                chunk.len()
            )));
        }
        for bytes in chunk.chunks_exact(4) {
            writer.write_sample(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))?;
        }
    }
    writer.finalize()?;

    Ok(cursor.into_inner())
}

/// The default export file name for a recording made at the given time. The timestamp is
/// UTC, truncated to seconds.
pub fn recording_filename(now: OffsetDateTime) -> String {
    let utc = now.to_offset(UtcOffset::UTC);
    format!(
        "sampler-recording-{:04}-{:02}-{:02}T{:02}-{:02}-{:02}.wav",
        utc.year(),
        u8::from(utc.month()),
        utc.day(),
        utc.hour(),
        utc.minute(),
        utc.second()
    )
}

/// Writes a recording into the directory under the default file name and returns its path.
pub async fn save_recording(bytes: &[u8], dir: &Path) -> Result<PathBuf, SamplerError> {
    let path = dir.join(recording_filename(OffsetDateTime::now_utc()));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| SamplerError::IoFailure(format!("{}: {}", path.display(), e)))?;
    info!(path = ?path, bytes = bytes.len(), "Recording saved");
    Ok(path)
}

#[cfg(test)]
mod test {
    use time::macros::datetime;

    use super::*;
    use crate::audio::offline::OfflineOutput;
    use crate::audio::wav::{WavHeader, HEADER_SIZE};
    use crate::audio::{AudioBuffer, MixBus, Output, SymphoniaDecoder};
    use crate::error::ErrorKind;
    use crate::playback::PlaybackEngine;
    use crate::samples::{SampleStore, SourceRef};
    use crate::testutil::eventually;

    const RATE: u32 = 8000;

    struct Rig {
        bus: Arc<MixBus>,
        store: Arc<SampleStore>,
        engine: PlaybackEngine,
        recorder: SessionRecorder,
    }

    fn rig(flush_interval: Duration) -> Rig {
        let decoder: Arc<dyn AudioDecoder> = Arc::new(SymphoniaDecoder::new(RATE));
        let bus = Arc::new(MixBus::new(2, RATE));
        let capture = CaptureDestination::attach(&bus);
        let store = Arc::new(SampleStore::new(decoder.clone()));
        let engine = PlaybackEngine::new(store.clone(), bus.clone(), 16);
        let recorder = SessionRecorder::new(capture, decoder, flush_interval);
        Rig {
            bus,
            store,
            engine,
            recorder,
        }
    }

    fn samples(bytes: &[u8]) -> Vec<i16> {
        bytes[HEADER_SIZE..]
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    #[tokio::test]
    async fn test_state_machine_misuse() {
        let rig = rig(Duration::from_secs(1));
        assert_eq!(rig.recorder.state(), RecorderState::Idle);
        assert_eq!(rig.recorder.duration(), 0.0);
        assert_eq!(
            rig.recorder.stop().await.unwrap_err(),
            SamplerError::NotRecording
        );

        rig.recorder.start().unwrap();
        assert_eq!(rig.recorder.state(), RecorderState::Recording);
        assert_eq!(
            rig.recorder.start().unwrap_err(),
            SamplerError::AlreadyRecording
        );

        rig.recorder.stop().await.unwrap();
        assert_eq!(rig.recorder.state(), RecorderState::Idle);
        assert_eq!(
            rig.recorder.stop().await.unwrap_err(),
            SamplerError::NotRecording
        );
    }

    #[tokio::test]
    async fn test_nothing_rendered_is_header_only() {
        let rig = rig(Duration::from_secs(1));
        rig.recorder.start().unwrap();
        let bytes = rig.recorder.stop().await.unwrap();

        assert_eq!(bytes.len(), HEADER_SIZE);
        let header = WavHeader::parse(&bytes).unwrap();
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, RATE);
        assert_eq!(header.data_len, 0);
    }

    #[tokio::test]
    async fn test_silent_session_is_well_formed() {
        let rig = rig(Duration::from_millis(20));
        let mut output = OfflineOutput::start(rig.bus.clone(), 64);

        rig.recorder.start().unwrap();
        eventually(
            || rig.recorder.chunks_received() >= 2,
            "Recorder never received chunks",
        );
        let bytes = rig.recorder.stop().await.unwrap();
        output.stop();

        let header = WavHeader::parse(&bytes).unwrap();
        assert_eq!(header.bits_per_sample, 16);
        assert!(header.data_len > 0);
        assert_eq!(bytes.len(), HEADER_SIZE + header.data_len as usize);
        assert!(samples(&bytes).iter().all(|sample| *sample == 0));
    }

    #[tokio::test]
    async fn test_records_played_voices() {
        let rig = rig(Duration::from_millis(20));
        rig.store
            .insert(
                0,
                SourceRef::Synthetic("tone".into()),
                "tone",
                AudioBuffer::new(vec![vec![0.5; RATE as usize / 10]], RATE).unwrap(),
            )
            .unwrap();

        rig.recorder.start().unwrap();
        let mut output = OfflineOutput::start(rig.bus.clone(), 64);
        rig.engine.play(0, None, None).unwrap();
        eventually(
            || rig.engine.active_voice_count() == 0,
            "Voice never finished",
        );
        assert!(rig.recorder.duration() > 0.0);
        let bytes = rig.recorder.stop().await.unwrap();
        output.stop();

        let header = WavHeader::parse(&bytes).unwrap();
        assert_eq!(header.channels, 2);
        let pcm = samples(&bytes);
        let loud = pcm.iter().filter(|sample| **sample == 16383).count();
        // Both channels of every voice frame.
        assert_eq!(loud, 2 * RATE as usize / 10);
    }

    #[tokio::test]
    async fn test_start_after_stop_discards_previous_chunks() {
        let rig = rig(Duration::from_millis(10));
        rig.recorder.start().unwrap();
        let mut block = vec![0.25; 2 * 100];
        rig.bus.render(&mut block);
        rig.bus.render(&mut block);
        let first = rig.recorder.stop().await.unwrap();
        assert_eq!(WavHeader::parse(&first).unwrap().frames(), 200);

        rig.recorder.start().unwrap();
        rig.bus.render(&mut block);
        let second = rig.recorder.stop().await.unwrap();
        assert_eq!(WavHeader::parse(&second).unwrap().frames(), 100);
    }

    struct BrokenDecoder;

    impl AudioDecoder for BrokenDecoder {
        fn decode(&self, _: Arc<[u8]>, _: Option<&str>) -> Result<AudioBuffer, SamplerError> {
            Err(SamplerError::DecodeFailure("unsupported container".to_string()))
        }

        fn target_sample_rate(&self) -> u32 {
            RATE
        }
    }

    #[tokio::test]
    async fn test_finalize_failure_returns_to_idle() {
        let bus = MixBus::new(1, RATE);
        let capture = CaptureDestination::attach(&bus);
        let recorder =
            SessionRecorder::new(capture, Arc::new(BrokenDecoder), Duration::from_secs(1));

        recorder.start().unwrap();
        let mut block = vec![0.0; 16];
        bus.render(&mut block);
        let err = recorder.stop().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecodeFailure);
        assert_eq!(recorder.state(), RecorderState::Idle);

        recorder.start().unwrap();
    }

    #[test]
    fn test_assemble_rejects_partial_samples() {
        let err = assemble(&[vec![0u8; 6]], 1, RATE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CaptureFailure);
    }

    #[test]
    fn test_recording_filename() {
        assert_eq!(
            recording_filename(datetime!(2026-03-05 14:07:09.532 UTC)),
            "sampler-recording-2026-03-05T14-07-09.wav"
        );
        assert_eq!(
            recording_filename(datetime!(2026-03-05 01:30:00 +2)),
            "sampler-recording-2026-03-04T23-30-00.wav"
        );
    }

    #[tokio::test]
    async fn test_save_recording() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = wav::encode_channels(&[vec![0.0; 4]], RATE).unwrap();
        let path = save_recording(&bytes, dir.path()).await.unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("sampler-recording-"));
        assert!(name.ends_with(".wav"));
        assert_eq!(std::fs::read(&path).unwrap(), bytes);

        let err = save_recording(&bytes, &dir.path().join("missing"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoFailure);
    }
}
