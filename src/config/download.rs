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
use std::time::Duration;

use serde::Deserialize;

use super::{parse_duration, ConfigError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Sample download settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Download {
    /// Per-request timeout.
    timeout: Option<String>,

    /// Additional attempts after the first failure.
    retries: Option<u32>,

    /// Delay between attempts.
    retry_delay: Option<String>,
}

impl Download {
    /// Returns the per-request timeout (default: 30s)
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration("download.timeout", &self.timeout, DEFAULT_TIMEOUT)
    }

    /// Returns the retry count (default: 3)
    pub fn retries(&self) -> u32 {
        self.retries.unwrap_or(DEFAULT_RETRIES)
    }

    /// Returns the delay between attempts (default: 1s)
    pub fn retry_delay(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "download.retry_delay",
            &self.retry_delay,
            DEFAULT_RETRY_DELAY,
        )
    }
}
