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

use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, info};

use crate::audio::{MixBus, Output};

/// Frames rendered per block when no block size is given.
pub const DEFAULT_BLOCK_FRAMES: usize = 512;

/// Renders the mixing bus without any hardware, one block per block-duration of wall-clock
/// time. Rendered audio is discarded; only the capture tap observes it.
pub struct OfflineOutput {
    is_running: Arc<AtomicBool>,
    stop_tx: Option<crossbeam_channel::Sender<()>>,
    join_handle: Option<thread::JoinHandle<()>>,
    sample_rate: u32,
    block_frames: usize,
}

impl OfflineOutput {
    /// Starts rendering the bus on a background thread.
    pub fn start(bus: Arc<MixBus>, block_frames: usize) -> OfflineOutput {
        let block_frames = block_frames.max(1);
        let sample_rate = bus.sample_rate();
        let block_duration =
            Duration::from_secs_f64(block_frames as f64 / sample_rate.max(1) as f64);
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let is_running = Arc::new(AtomicBool::new(true));

        info!(sample_rate, block_frames, "Starting offline output");
        let join_handle = {
            let is_running = is_running.clone();
            thread::spawn(move || {
                let mut block = vec![0.0f32; block_frames * bus.channels() as usize];
                loop {
                    bus.render(&mut block);

                    // Wait out the block, or until we're told to stop.
                    match stop_rx.recv_timeout(block_duration) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                is_running.store(false, Ordering::Relaxed);
                debug!("Offline output stopped");
            })
        };

        OfflineOutput {
            is_running,
            stop_tx: Some(stop_tx),
            join_handle: Some(join_handle),
            sample_rate,
            block_frames,
        }
    }
}

impl Output for OfflineOutput {
    fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join_handle) = self.join_handle.take() {
            let _ = join_handle.join();
        }
    }

    fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }
}

impl Drop for OfflineOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Display for OfflineOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Offline ({} Hz, {} frames per block)",
            self.sample_rate, self.block_frames
        )
    }
}
