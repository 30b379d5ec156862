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
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use duration_string::DurationString;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use padsampler::audio::cpal::{default_sample_rate, CpalOutput};
use padsampler::audio::offline::{OfflineOutput, DEFAULT_BLOCK_FRAMES};
use padsampler::audio::{self, wav, AudioDecoder, Output, SymphoniaDecoder};
use padsampler::catalog::{CatalogClient, PresetMetadata};
use padsampler::config::SamplerConfig;
use padsampler::recorder::save_recording;
use padsampler::samples::fetch::read_file;
use padsampler::samples::{Fetcher, SourceRef};
use padsampler::util::{format_file_size, format_time};
use padsampler::Sampler;

/// Log filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A sixteen pad sampler."
)]
struct Cli {
    /// The path to the sampler config.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the presets offered by the catalog server.
    Presets {},
    /// Lists the available audio output devices.
    Devices {},
    /// Loads a preset and plays its pads.
    Play {
        /// The name of the preset to load. Matching ignores case.
        preset: String,
        /// The pads to trigger, in order. Defaults to every loaded pad.
        #[arg(short, long, value_delimiter = ',')]
        pads: Vec<usize>,
        /// The time between pad triggers.
        #[arg(short, long, default_value = "250ms")]
        interval: String,
        /// Records the session. Without a file name, the recording is saved to the current
        /// directory under a timestamped name.
        #[arg(short, long, num_args = 0..=1)]
        record: Option<Option<PathBuf>>,
        /// Renders without an audio device.
        #[arg(long)]
        offline: bool,
    },
    /// Converts an audio file to 16-bit PCM WAV.
    Encode {
        /// The file to convert.
        input: PathBuf,
        /// Where to write the WAV file.
        output: PathBuf,
        /// The output sample rate.
        #[arg(short, long, default_value_t = 44100)]
        sample_rate: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().with_env_filter(env_filter()).init();

    let cli = Cli::parse();
    let config = SamplerConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Presets {} => {
            let catalog = CatalogClient::new(config.api(), fetcher(&config)?);
            let presets = catalog.metadata().await?;

            if presets.is_empty() {
                println!("No presets found.");
                return Ok(());
            }

            println!("Presets (count: {}):", presets.len());
            for preset in presets.iter() {
                println!("- {}", preset);
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play {
            preset,
            pads,
            interval,
            record,
            offline,
        } => {
            let interval: Duration = DurationString::from_string(interval)?.into();
            play(&config, &preset, pads, interval, record, offline).await?;
        }
        Commands::Encode {
            input,
            output,
            sample_rate,
        } => encode(&input, &output, sample_rate).await?,
    }

    Ok(())
}

/// The log filter from `RUST_LOG`, falling back to lifecycle logging.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// The fetcher used for the catalog and for samples.
fn fetcher(config: &SamplerConfig) -> Result<Arc<dyn Fetcher>, Box<dyn Error>> {
    #[cfg(feature = "http")]
    {
        Ok(Arc::new(padsampler::samples::HttpFetcher::from_config(
            config.download(),
        )?))
    }
    #[cfg(not(feature = "http"))]
    {
        let _ = config;
        Ok(Arc::new(padsampler::samples::FileFetcher))
    }
}

async fn play(
    config: &SamplerConfig,
    preset_name: &str,
    pads: Vec<usize>,
    interval: Duration,
    record: Option<Option<PathBuf>>,
    offline: bool,
) -> Result<(), Box<dyn Error>> {
    let fetcher = fetcher(config)?;
    let catalog = CatalogClient::new(config.api(), fetcher.clone());
    let preset = catalog.preset(preset_name).await?;
    println!("Loading {}", PresetMetadata::from(&preset));

    let device = config.audio().device();
    let sample_rate = if offline {
        config.audio().sample_rate_or(None)
    } else {
        config
            .audio()
            .sample_rate_or(default_sample_rate(device).ok())
    };
    let sampler = Sampler::new(config, sample_rate, config.audio().channels())?;

    let outcomes = sampler.load_preset(&preset, fetcher.as_ref()).await;
    for outcome in outcomes.iter() {
        match (&outcome.slot, &outcome.result) {
            (Some(slot), Ok(info)) => println!(
                "- pad {:>2}: {} ({})",
                slot,
                info.name,
                format_time(info.duration)
            ),
            (slot, Err(e)) => println!(
                "- pad {:>2}: failed to load {}: {} [{}]",
                slot.map(|slot| slot.to_string()).unwrap_or_default(),
                outcome.source,
                e,
                e.kind()
            ),
            (None, Ok(_)) => {}
        }
    }

    let pads: Vec<usize> = if pads.is_empty() {
        outcomes
            .iter()
            .filter(|outcome| outcome.is_ok())
            .filter_map(|outcome| outcome.slot)
            .collect()
    } else {
        pads
    };
    if pads.is_empty() {
        return Err("no pads to play".into());
    }

    let mut output: Box<dyn Output> = if offline {
        Box::new(OfflineOutput::start(
            sampler.bus().clone(),
            DEFAULT_BLOCK_FRAMES,
        ))
    } else {
        Box::new(CpalOutput::start(device, sampler.bus().clone())?)
    };
    info!(output = %output, "Output started");

    if record.is_some() {
        sampler.recorder().start()?;
    }

    for pad in pads {
        if let Err(e) = sampler.engine().play(pad, None, None) {
            warn!(pad, err = %e, kind = %e.kind(), "Unable to play pad");
        }
        tokio::time::sleep(interval).await;
    }
    while sampler.engine().active_voice_count() > 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    if let Some(file) = record {
        let seconds = sampler.recorder().duration();
        let bytes = sampler.recorder().stop().await?;
        let path = match file {
            Some(path) => {
                tokio::fs::write(&path, &bytes).await?;
                path
            }
            None => save_recording(&bytes, &std::env::current_dir()?).await?,
        };
        println!(
            "Recorded {} ({}) to {}",
            format_time(seconds),
            format_file_size(bytes.len() as u64),
            path.display()
        );
    }

    output.stop();
    Ok(())
}

async fn encode(input: &Path, output: &Path, sample_rate: u32) -> Result<(), Box<dyn Error>> {
    let bytes = read_file(input).await?;
    let size = bytes.len();
    let extension = SourceRef::File(input.to_path_buf()).extension();

    let decoder = SymphoniaDecoder::new(sample_rate);
    let buffer = tokio::task::spawn_blocking(move || {
        decoder.decode(Arc::from(bytes), extension.as_deref())
    })
    .await??;
    let encoded = wav::encode(&buffer)?;
    tokio::fs::write(output, &encoded).await?;

    println!(
        "{} ({}) -> {} ({}), {} channels, {} Hz, {}",
        input.display(),
        format_file_size(size as u64),
        output.display(),
        format_file_size(encoded.len() as u64),
        buffer.channel_count(),
        buffer.sample_rate(),
        format_time(buffer.duration())
    );
    Ok(())
}
