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

const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Session recorder settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Recorder {
    /// How often captured audio is handed to the recorder as a chunk.
    flush_interval: Option<String>,
}

impl Recorder {
    /// Returns the chunk flush interval (default: 1s)
    pub fn flush_interval(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "recorder.flush_interval",
            &self.flush_interval,
            DEFAULT_FLUSH_INTERVAL,
        )
    }
}
