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
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info};

use crate::audio::{MixBus, Output};

/// Frames mixed per block by the producer thread.
const BLOCK_FRAMES: usize = 256;

/// Blocks buffered between the producer and the stream callback (~50ms at 44.1kHz).
const QUEUED_BLOCKS: usize = 8;

/// An output device known to cpal.
#[derive(Debug, Clone)]
pub struct OutputDeviceInfo {
    /// The name of the device.
    pub name: String,
    /// The host the device belongs to.
    pub host: String,
    /// The maximum number of channels the device supports.
    pub max_channels: u16,
    /// The default output sample rate, if the device reports one.
    pub default_sample_rate: Option<u32>,
}

impl fmt::Display for OutputDeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name, self.max_channels, self.host
        )?;
        if let Some(sample_rate) = self.default_sample_rate {
            write!(f, " [{} Hz]", sample_rate)?;
        }
        Ok(())
    }
}

/// Lists every output device on every available host.
pub fn list_output_devices() -> Result<Vec<OutputDeviceInfo>, Box<dyn Error>> {
    // Suppress noisy output here.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(output_configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = output_configs
                .map(|config| config.channels())
                .max()
                .unwrap_or(0);
            if max_channels == 0 {
                continue;
            }

            devices.push(OutputDeviceInfo {
                name: device.name()?,
                host: host_id.name().to_string(),
                max_channels,
                default_sample_rate: device
                    .default_output_config()
                    .ok()
                    .map(|config| config.sample_rate()),
            });
        }
    }

    devices.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(devices)
}

/// Finds an output device by name, or the default output device when no name is given.
fn find_device(name: Option<&str>) -> Result<cpal::Device, Box<dyn Error>> {
    let Some(name) = name else {
        return cpal::default_host()
            .default_output_device()
            .ok_or_else(|| "no default output device".into());
    };

    for host_id in cpal::available_hosts() {
        let Ok(devices) = cpal::host_from_id(host_id)?.output_devices() else {
            continue;
        };
        for device in devices {
            if device.name().is_ok_and(|device_name| device_name.trim() == name) {
                return Ok(device);
            }
        }
    }
    Err(format!("no device found with name {}", name).into())
}

/// Returns the default sample rate of the named device (or the default device).
pub fn default_sample_rate(name: Option<&str>) -> Result<u32, Box<dyn Error>> {
    let device = find_device(name)?;
    Ok(device.default_output_config()?.sample_rate())
}

/// Pulls queued blocks into the stream's output buffer.
struct BlockReader {
    blocks: Receiver<Vec<f32>>,
    recycle: Sender<Vec<f32>>,
    current: Vec<f32>,
    offset: usize,
}

impl BlockReader {
    /// Fills `data` from queued blocks, zero-filling any shortfall.
    fn fill(&mut self, data: &mut [f32]) {
        let mut written = 0;
        while written < data.len() {
            if self.offset >= self.current.len() {
                match self.blocks.try_recv() {
                    Ok(block) => {
                        let spent = std::mem::replace(&mut self.current, block);
                        if !spent.is_empty() {
                            let _ = self.recycle.try_send(spent);
                        }
                        self.offset = 0;
                    }
                    Err(_) => {
                        data[written..].fill(0.0);
                        return;
                    }
                }
            }
            let count = (self.current.len() - self.offset).min(data.len() - written);
            data[written..written + count]
                .copy_from_slice(&self.current[self.offset..self.offset + count]);
            written += count;
            self.offset += count;
        }
    }
}

/// Plays the mixing bus through a cpal output device.
pub struct CpalOutput {
    name: String,
    sample_rate: u32,
    channels: u16,
    is_running: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    /// Handle to the output thread (owns the stream).
    output_thread: Option<thread::JoinHandle<()>>,
    /// Handle to the producer thread (mixes the bus).
    producer_thread: Option<thread::JoinHandle<()>>,
}

impl CpalOutput {
    /// Opens the named device (or the default device) and starts playing the bus through it.
    /// The stream runs at the bus sample rate and channel count.
    pub fn start(device_name: Option<&str>, bus: Arc<MixBus>) -> Result<CpalOutput, Box<dyn Error>> {
        let device = find_device(device_name)?;
        let name = device.name()?;
        let sample_format = device.default_output_config()?.sample_format();
        let channels = bus.channels();
        let sample_rate = bus.sample_rate();
        let is_running = Arc::new(AtomicBool::new(true));

        let (block_tx, block_rx) = crossbeam_channel::bounded::<Vec<f32>>(QUEUED_BLOCKS);
        let (recycle_tx, recycle_rx) = crossbeam_channel::bounded::<Vec<f32>>(QUEUED_BLOCKS * 2);

        // Producer thread: mix the bus into blocks. Sending blocks while the queue is full
        // paces the producer to the stream.
        let producer_thread = {
            let is_running = is_running.clone();
            let bus = bus.clone();
            thread::spawn(move || {
                let block_samples = BLOCK_FRAMES * channels as usize;
                while is_running.load(Ordering::Relaxed) {
                    let mut block = recycle_rx
                        .try_recv()
                        .unwrap_or_else(|_| vec![0.0f32; block_samples]);
                    block.resize(block_samples, 0.0);
                    bus.render(&mut block);
                    if block_tx.send(block).is_err() {
                        break;
                    }
                }
                debug!("Producer thread stopped");
            })
        };

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);

        // Start the output thread - create the stream inside the thread.
        let output_thread = {
            let is_running = is_running.clone();
            thread::spawn(move || {
                let config = cpal::StreamConfig {
                    channels,
                    sample_rate: sample_rate,
                    buffer_size: cpal::BufferSize::Default,
                };
                let mut reader = BlockReader {
                    blocks: block_rx,
                    recycle: recycle_tx,
                    current: Vec::new(),
                    offset: 0,
                };

                let stream_result = match sample_format {
                    cpal::SampleFormat::I16 => build_converting_stream::<i16>(&device, &config, reader),
                    cpal::SampleFormat::I32 => build_converting_stream::<i32>(&device, &config, reader),
                    _ => device.build_output_stream(
                        &config,
                        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| reader.fill(data),
                        |err| error!("CPAL output stream error: {}", err),
                        None,
                    ),
                };

                let stream = match stream_result {
                    Ok(stream) => stream,
                    Err(e) => {
                        is_running.store(false, Ordering::Relaxed);
                        let _ = ready_tx.send(Err(format!("failed to create stream: {}", e)));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    is_running.store(false, Ordering::Relaxed);
                    let _ = ready_tx.send(Err(format!("failed to start stream: {}", e)));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Keep the stream alive until asked to stop.
                let _ = stop_rx.recv();
                drop(stream);
                is_running.store(false, Ordering::Relaxed);
            })
        };

        let mut output = CpalOutput {
            name,
            sample_rate,
            channels,
            is_running,
            stop_tx: Some(stop_tx),
            output_thread: Some(output_thread),
            producer_thread: Some(producer_thread),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(
                    device = output.name,
                    sample_rate,
                    channels,
                    "CPAL output stream started successfully"
                );
                Ok(output)
            }
            Ok(Err(e)) => {
                output.stop();
                Err(e.into())
            }
            Err(_) => {
                output.stop();
                Err("output thread exited before the stream started".into())
            }
        }
    }
}

/// Builds a stream for integer sample formats, converting from f32.
fn build_converting_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut reader: BlockReader,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            reader.fill(&mut scratch);
            for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(src);
            }
        },
        |err| error!("CPAL output stream error: {}", err),
        None,
    )
}

impl Output for CpalOutput {
    fn stop(&mut self) {
        self.is_running.store(false, Ordering::Relaxed);
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        // The stream (and the block receiver) is dropped first, which unblocks the producer.
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
        if let Some(thread) = self.producer_thread.take() {
            let _ = thread.join();
        }
    }

    fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Relaxed)
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Display for CpalOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}, {} Hz)",
            self.name, self.channels, self.sample_rate
        )
    }
}
