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
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{bounded, never, select, tick, unbounded, Receiver, Sender};
use tracing::{debug, trace};

use crate::audio::{BusTap, MixBus};

/// Spent blocks kept for reuse by the render thread.
const RECYCLED_BLOCKS: usize = 16;

/// Messages handled by the capture thread, in the order they were sent.
enum CaptureMessage {
    /// A rendered, post-gain block of interleaved samples.
    Block(Vec<f32>),
    /// Start delivering chunks to the sink every flush interval.
    Arm {
        sink: Sender<Vec<u8>>,
        flush_interval: Duration,
    },
    /// Deliver whatever is pending and release the sink.
    Disarm,
}

/// The capture destination tapped off the mixing bus. There is one per bus.
///
/// While armed, rendered blocks are accumulated as little-endian f32 interleaved bytes and
/// pushed to the sink as one chunk per flush interval. Releasing the sink on disarm is what
/// tells the receiving side that the last chunk has been delivered.
pub struct CaptureDestination {
    tx: Sender<CaptureMessage>,
    /// Blocks the capture thread has finished with.
    recycle: Receiver<Vec<f32>>,
    armed: AtomicBool,
    channels: u16,
    sample_rate: u32,
}

impl CaptureDestination {
    /// Creates the capture destination and attaches it to the bus.
    pub fn attach(bus: &MixBus) -> Arc<CaptureDestination> {
        let (tx, rx) = unbounded();
        let (recycle_tx, recycle_rx) = bounded(RECYCLED_BLOCKS);
        thread::spawn(move || Self::run(rx, recycle_tx));

        let capture = Arc::new(CaptureDestination {
            tx,
            recycle: recycle_rx,
            armed: AtomicBool::new(false),
            channels: bus.channels(),
            sample_rate: bus.sample_rate(),
        });
        bus.attach_tap(capture.clone());
        capture
    }

    /// The capture thread. Exits once the destination is dropped.
    fn run(rx: Receiver<CaptureMessage>, recycle: Sender<Vec<f32>>) {
        let mut sink: Option<Sender<Vec<u8>>> = None;
        let mut ticker = never();
        let mut pending: Vec<u8> = Vec::new();

        loop {
            select! {
                recv(rx) -> message => match message {
                    Ok(CaptureMessage::Block(samples)) => {
                        if sink.is_some() {
                            pending.extend(samples.iter().flat_map(|sample| sample.to_le_bytes()));
                        }
                        let _ = recycle.try_send(samples);
                    }
                    Ok(CaptureMessage::Arm { sink: new_sink, flush_interval }) => {
                        debug!(flush_interval = ?flush_interval, "Capture armed");
                        pending.clear();
                        sink = Some(new_sink);
                        ticker = tick(flush_interval);
                    }
                    Ok(CaptureMessage::Disarm) => {
                        if let Some(sink) = sink.take() {
                            Self::flush(&sink, &mut pending);
                        }
                        ticker = never();
                        debug!("Capture disarmed");
                    }
                    Err(_) => break,
                },
                recv(ticker) -> _ => {
                    if let Some(sink) = sink.as_ref() {
                        Self::flush(sink, &mut pending);
                    }
                }
            }
        }
        debug!("Capture thread stopped");
    }

    /// Delivers pending bytes as one chunk.
    fn flush(sink: &Sender<Vec<u8>>, pending: &mut Vec<u8>) {
        if pending.is_empty() {
            return;
        }
        let chunk = std::mem::take(pending);
        trace!(bytes = chunk.len(), "Delivering capture chunk");
        // A closed sink means the recorder went away mid-session.
        let _ = sink.send(chunk);
    }

    /// Starts capturing into the given sink.
    pub(super) fn arm(&self, sink: Sender<Vec<u8>>, flush_interval: Duration) {
        let _ = self.tx.send(CaptureMessage::Arm {
            sink,
            flush_interval: flush_interval.max(Duration::from_millis(1)),
        });
        self.armed.store(true, Ordering::Release);
    }

    /// Stops capturing. The final chunk is delivered before the sink is released.
    pub(super) fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
        let _ = self.tx.send(CaptureMessage::Disarm);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// The channel count of captured audio.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// The sample rate of captured audio.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl BusTap for CaptureDestination {
    fn push_block(&self, block: &[f32]) {
        if self.armed.load(Ordering::Acquire) {
            let mut samples = self.recycle.try_recv().unwrap_or_default();
            samples.clear();
            samples.extend_from_slice(block);
            let _ = self.tx.send(CaptureMessage::Block(samples));
        }
    }
}

impl fmt::Debug for CaptureDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureDestination")
            .field("armed", &self.is_armed())
            .field("channels", &self.channels)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
