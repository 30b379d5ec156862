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
//! The preset catalog: named collections of sample references served by a catalog server.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Api;
use crate::error::SamplerError;
use crate::samples::Fetcher;

/// A sample reference within a preset. The URL is relative to the server's file base.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PresetSample {
    #[serde(default)]
    pub name: String,
    pub url: String,
}

/// A named collection of samples, assigned to pads in order.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Preset {
    pub name: String,
    #[serde(rename = "type", default)]
    pub preset_type: String,
    #[serde(rename = "isFactoryPresets", default)]
    pub is_factory_presets: bool,
    #[serde(default)]
    pub samples: Vec<PresetSample>,
}

/// A summary of a preset for listings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresetMetadata {
    pub name: String,
    pub preset_type: String,
    pub is_factory_presets: bool,
    pub sample_count: usize,
}

impl From<&Preset> for PresetMetadata {
    fn from(preset: &Preset) -> Self {
        PresetMetadata {
            name: preset.name.clone(),
            preset_type: preset.preset_type.clone(),
            is_factory_presets: preset.is_factory_presets,
            sample_count: preset.samples.len(),
        }
    }
}

impl fmt::Display for PresetMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}{}): {} samples",
            self.name,
            if self.preset_type.is_empty() {
                "untyped"
            } else {
                &self.preset_type
            },
            if self.is_factory_presets {
                ", factory"
            } else {
                ""
            },
            self.sample_count
        )
    }
}

/// Resolves a preset sample URL against the file base. A leading `./` is dropped and every
/// path segment is percent-encoded. Absolute URLs are returned unchanged.
pub fn resolve_sample_url(files_base: &str, relative: &str) -> String {
    if relative.starts_with("http://")
        || relative.starts_with("https://")
        || relative.starts_with("file://")
    {
        return relative.to_string();
    }

    let path = relative.trim_start_matches("./").trim_start_matches('/');
    let encoded = path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<String>>()
        .join("/");
    format!("{}/{}", files_base.trim_end_matches('/'), encoded)
}

/// Reads presets from the catalog server.
#[derive(Clone)]
pub struct CatalogClient {
    presets_url: String,
    files_url: String,
    fetcher: Arc<dyn Fetcher>,
}

impl CatalogClient {
    /// Creates a client for the configured server, fetching through the given fetcher.
    pub fn new(api: &Api, fetcher: Arc<dyn Fetcher>) -> CatalogClient {
        CatalogClient {
            presets_url: api.presets_url(),
            files_url: api.files_url(),
            fetcher,
        }
    }

    /// Creates a client that talks HTTP using the download settings from the configuration.
    #[cfg(feature = "http")]
    pub fn from_config(
        config: &crate::config::SamplerConfig,
    ) -> Result<CatalogClient, Box<dyn std::error::Error>> {
        let fetcher = crate::samples::HttpFetcher::from_config(config.download())?;
        Ok(CatalogClient::new(config.api(), Arc::new(fetcher)))
    }

    /// The base URL sample paths are resolved against.
    pub fn files_url(&self) -> &str {
        &self.files_url
    }

    /// The fetcher used for the catalog, which also serves the samples.
    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    /// Fetches every preset.
    pub async fn presets(&self) -> Result<Vec<Preset>, SamplerError> {
        let bytes = self.fetcher.fetch(&self.presets_url).await?;
        let presets: Vec<Preset> = serde_json::from_slice(&bytes).map_err(|e| {
            SamplerError::NetworkFailure(format!(
                "{}: invalid preset listing: {}",
                self.presets_url, e
            ))
        })?;
        info!(url = self.presets_url, presets = presets.len(), "Fetched presets");
        Ok(presets)
    }

    /// Fetches a summary of every preset.
    pub async fn metadata(&self) -> Result<Vec<PresetMetadata>, SamplerError> {
        Ok(self
            .presets()
            .await?
            .iter()
            .map(PresetMetadata::from)
            .collect())
    }

    /// Finds a preset by name, ignoring case.
    pub async fn preset(&self, name: &str) -> Result<Preset, SamplerError> {
        let wanted = name.to_lowercase();
        let preset = self
            .presets()
            .await?
            .into_iter()
            .find(|preset| preset.name.to_lowercase() == wanted)
            .ok_or_else(|| SamplerError::NetworkFailure(format!("preset not found: {}", name)))?;
        debug!(preset = preset.name, samples = preset.samples.len(), "Found preset");
        Ok(preset)
    }

    /// The resolved URL of every sample in the preset, in order.
    pub fn sample_urls(&self, preset: &Preset) -> Vec<String> {
        preset
            .samples
            .iter()
            .map(|sample| resolve_sample_url(&self.files_url, &sample.url))
            .collect()
    }
}

impl fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogClient")
            .field("presets_url", &self.presets_url)
            .field("files_url", &self.files_url)
            .finish()
    }
}
