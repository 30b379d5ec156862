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
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_PRESETS_ENDPOINT: &str = "/api/presets";
const DEFAULT_FILES_ENDPOINT: &str = "/presets";

/// Where the preset catalog lives.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Api {
    /// The catalog server root.
    base_url: Option<String>,

    /// The path of the preset listing.
    presets_endpoint: Option<String>,

    /// The path that sample URLs are relative to.
    files_endpoint: Option<String>,
}

impl Api {
    /// New will create a new Api configuration pointing at the given server.
    pub fn new(base_url: &str) -> Api {
        Api {
            base_url: Some(base_url.to_string()),
            presets_endpoint: None,
            files_endpoint: None,
        }
    }

    /// Returns the server root without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn presets_endpoint(&self) -> &str {
        self.presets_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_PRESETS_ENDPOINT)
    }

    pub fn files_endpoint(&self) -> &str {
        self.files_endpoint
            .as_deref()
            .unwrap_or(DEFAULT_FILES_ENDPOINT)
    }

    /// The full URL of the preset listing.
    pub fn presets_url(&self) -> String {
        join(self.base_url(), self.presets_endpoint())
    }

    /// The full URL that sample paths are resolved against.
    pub fn files_url(&self) -> String {
        join(self.base_url(), self.files_endpoint())
    }
}

fn join(base: &str, endpoint: &str) -> String {
    format!("{}/{}", base, endpoint.trim_start_matches('/'))
}
