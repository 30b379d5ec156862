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
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::audio::AudioBuffer;
use crate::util::name_without_extension;

/// Where a sample came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// Downloaded from a URL.
    Url(String),
    /// Read from a local file.
    File(PathBuf),
    /// Generated in memory. The string is a label.
    Synthetic(String),
}

impl SourceRef {
    /// The last path component of the source, without query string or fragment.
    fn file_name(&self) -> String {
        match self {
            SourceRef::Url(url) => {
                let path = url.split(['?', '#']).next().unwrap_or(url);
                let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or(path);
                urlencoding::decode(last)
                    .map(|decoded| decoded.into_owned())
                    .unwrap_or_else(|_| last.to_string())
            }
            SourceRef::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            SourceRef::Synthetic(label) => label.clone(),
        }
    }

    /// A label derived from the source: the file name without its extension.
    pub fn display_name(&self) -> String {
        match self {
            SourceRef::Synthetic(label) => label.clone(),
            _ => name_without_extension(&self.file_name()).to_string(),
        }
    }

    /// The lower-cased file extension, used as a decoding hint.
    pub fn extension(&self) -> Option<String> {
        if let SourceRef::Synthetic(_) = self {
            return None;
        }
        let file_name = self.file_name();
        let (stem, extension) = file_name.rsplit_once('.')?;
        if stem.is_empty() || extension.is_empty() {
            return None;
        }
        Some(extension.to_ascii_lowercase())
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRef::Url(url) => write!(f, "{}", url),
            SourceRef::File(path) => write!(f, "{}", path.display()),
            SourceRef::Synthetic(label) => write!(f, "synthetic:{}", label),
        }
    }
}

/// The part of a sample that is played, in seconds. Always `0 <= left < right <= duration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimRange {
    pub left: f64,
    pub right: f64,
}

impl TrimRange {
    /// The full duration of the given buffer.
    pub fn full(audio: &AudioBuffer) -> TrimRange {
        TrimRange {
            left: 0.0,
            right: audio.duration(),
        }
    }

    /// Clamps the requested range into a valid range for the buffer. Valid requests are
    /// returned unchanged. When the ordering is violated, the right edge is kept and the left
    /// edge is pulled one frame below it.
    pub fn clamped(audio: &AudioBuffer, left: f64, right: f64) -> TrimRange {
        let duration = audio.duration();
        let frame = audio.frame_duration().min(duration);

        let left = if left.is_nan() {
            0.0
        } else {
            left.clamp(0.0, duration)
        };
        let right = if right.is_nan() {
            duration
        } else {
            right.clamp(0.0, duration)
        };
        if left < right {
            return TrimRange { left, right };
        }

        let left = (right - frame).max(0.0);
        let right = if left < right {
            right
        } else {
            (left + frame).min(duration)
        };
        TrimRange { left, right }
    }

    /// The length of the range in seconds.
    pub fn length(&self) -> f64 {
        self.right - self.left
    }
}

/// One loaded sound. Every code path that produces a sample goes through [`Sample::new`],
/// so all samples share one shape: decoded audio, identity and a full-length trim.
#[derive(Debug, Clone)]
pub struct Sample {
    source: SourceRef,
    name: String,
    audio: Arc<AudioBuffer>,
    raw_bytes: Option<Arc<[u8]>>,
    trim: TrimRange,
}

impl Sample {
    /// Creates a sample. The trim range covers the whole buffer.
    pub fn new(
        source: SourceRef,
        name: impl Into<String>,
        audio: Arc<AudioBuffer>,
        raw_bytes: Option<Arc<[u8]>>,
    ) -> Sample {
        let trim = TrimRange::full(&audio);
        Sample {
            source,
            name: name.into(),
            audio,
            raw_bytes,
            trim,
        }
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The decoded audio, shared with any voices playing it.
    pub fn audio(&self) -> &Arc<AudioBuffer> {
        &self.audio
    }

    /// The original encoded bytes, if they were kept.
    pub fn raw_bytes(&self) -> Option<&Arc<[u8]>> {
        self.raw_bytes.as_ref()
    }

    pub fn trim(&self) -> TrimRange {
        self.trim
    }

    pub fn duration(&self) -> f64 {
        self.audio.duration()
    }

    /// Sets the trim range, clamping it to a valid range. Returns the range applied.
    pub fn set_trim(&mut self, left: f64, right: f64) -> TrimRange {
        self.trim = TrimRange::clamped(&self.audio, left, right);
        self.trim
    }

    /// A summary of this sample.
    pub fn info(&self, slot: usize) -> SampleInfo {
        SampleInfo {
            slot,
            name: self.name.clone(),
            source: self.source.clone(),
            duration: self.duration(),
            channels: self.audio.channel_count(),
            sample_rate: self.audio.sample_rate(),
            trim: self.trim,
        }
    }
}

/// A summary of a loaded sample, returned from loads and lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleInfo {
    pub slot: usize,
    pub name: String,
    pub source: SourceRef,
    pub duration: f64,
    pub channels: u16,
    pub sample_rate: u32,
    pub trim: TrimRange,
}
