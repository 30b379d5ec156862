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
use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use duration_string::DurationString;
use serde::Deserialize;

mod api;
mod audio;
mod download;
mod error;
mod recorder;

pub use self::api::Api;
pub use self::audio::Audio;
pub use self::download::Download;
pub use self::error::ConfigError;
pub use self::recorder::Recorder;

/// Prefix for environment overrides, e.g. PADSAMPLER_API__BASE_URL.
const ENV_PREFIX: &str = "PADSAMPLER";

/// The sampler configuration. Every section and field is optional.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct SamplerConfig {
    /// The preset catalog.
    api: Api,
    /// The output device and mixing bus.
    audio: Audio,
    /// The session recorder.
    recorder: Recorder,
    /// Sample downloads.
    download: Download,
}

impl SamplerConfig {
    /// Loads the configuration from an optional YAML file, then applies environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<SamplerConfig, ConfigError> {
        Self::build(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn build(path: Option<&Path>, environment: Environment) -> Result<SamplerConfig, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        Ok(builder
            .add_source(
                environment
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<SamplerConfig>()?)
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn download(&self) -> &Download {
        &self.download
    }
}

/// Parses an optional duration string, falling back to the default when unset.
fn parse_duration(
    key: &'static str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => DurationString::from_string(value.clone())
            .map(Into::into)
            .map_err(|source| ConfigError::Duration {
                key,
                value: value.clone(),
                source,
            }),
        None => Ok(default),
    }
}
