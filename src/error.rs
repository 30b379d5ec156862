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
//! Error taxonomy shared by the sample store, playback engine, recorder and encoder.

use std::fmt;

/// Every failure the sampler core reports. Each variant carries a human-readable reason
/// through `Display` and a machine-readable tag through [`SamplerError::kind`].
///
/// The error is `Clone` so a failed load can be kept in the slot's load state while the
/// same error is also returned to the caller.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamplerError {
    #[error("unable to decode audio: {0}")]
    DecodeFailure(String),

    #[error("unable to fetch audio: {0}")]
    NetworkFailure(String),

    #[error("unable to read audio file: {0}")]
    IoFailure(String),

    #[error("slot {0} has no loaded sample")]
    NotLoaded(usize),

    #[error("invalid range {start:.3}s..{end:.3}s for sample of {duration:.3}s")]
    InvalidRange { start: f64, end: f64, duration: f64 },

    #[error("slot {0} is out of range")]
    InvalidSlot(usize),

    #[error("no free slot available")]
    NoFreeSlot,

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("no recording is in progress")]
    NotRecording,

    #[error("unable to encode audio: {0}")]
    EncodeFailure(String),

    #[error("load into slot {0} was superseded by a newer load")]
    Superseded(usize),

    #[error("polyphony limit of {max} voices reached")]
    PolyphonyLimit { max: usize },

    #[error("audio capture failed: {0}")]
    CaptureFailure(String),
}

/// The machine-readable kind of a [`SamplerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DecodeFailure,
    NetworkFailure,
    IoFailure,
    NotLoaded,
    InvalidRange,
    InvalidSlot,
    NoFreeSlot,
    AlreadyRecording,
    NotRecording,
    EncodeFailure,
    Superseded,
    PolyphonyLimit,
    CaptureFailure,
}

impl ErrorKind {
    /// Returns the stable tag used when the error crosses a process or UI boundary.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::DecodeFailure => "decode_failure",
            ErrorKind::NetworkFailure => "network_failure",
            ErrorKind::IoFailure => "io_failure",
            ErrorKind::NotLoaded => "not_loaded",
            ErrorKind::InvalidRange => "invalid_range",
            ErrorKind::InvalidSlot => "invalid_slot",
            ErrorKind::NoFreeSlot => "no_free_slot",
            ErrorKind::AlreadyRecording => "already_recording",
            ErrorKind::NotRecording => "not_recording",
            ErrorKind::EncodeFailure => "encode_failure",
            ErrorKind::Superseded => "superseded",
            ErrorKind::PolyphonyLimit => "polyphony_limit",
            ErrorKind::CaptureFailure => "capture_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SamplerError {
    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SamplerError::DecodeFailure(_) => ErrorKind::DecodeFailure,
            SamplerError::NetworkFailure(_) => ErrorKind::NetworkFailure,
            SamplerError::IoFailure(_) => ErrorKind::IoFailure,
            SamplerError::NotLoaded(_) => ErrorKind::NotLoaded,
            SamplerError::InvalidRange { .. } => ErrorKind::InvalidRange,
            SamplerError::InvalidSlot(_) => ErrorKind::InvalidSlot,
            SamplerError::NoFreeSlot => ErrorKind::NoFreeSlot,
            SamplerError::AlreadyRecording => ErrorKind::AlreadyRecording,
            SamplerError::NotRecording => ErrorKind::NotRecording,
            SamplerError::EncodeFailure(_) => ErrorKind::EncodeFailure,
            SamplerError::Superseded(_) => ErrorKind::Superseded,
            SamplerError::PolyphonyLimit { .. } => ErrorKind::PolyphonyLimit,
            SamplerError::CaptureFailure(_) => ErrorKind::CaptureFailure,
        }
    }
}

impl From<symphonia::core::errors::Error> for SamplerError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        SamplerError::DecodeFailure(err.to_string())
    }
}

impl From<hound::Error> for SamplerError {
    fn from(err: hound::Error) -> Self {
        SamplerError::EncodeFailure(err.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(
            SamplerError::DecodeFailure("bad header".into()).kind().as_str(),
            "decode_failure"
        );
        assert_eq!(
            SamplerError::NetworkFailure("404".into()).kind().as_str(),
            "network_failure"
        );
        assert_eq!(SamplerError::NotLoaded(3).kind(), ErrorKind::NotLoaded);
        assert_eq!(
            SamplerError::PolyphonyLimit { max: 16 }.kind().to_string(),
            "polyphony_limit"
        );
    }

    #[test]
    fn test_reason_strings() {
        let err = SamplerError::InvalidRange {
            start: 0.0,
            end: 2.5,
            duration: 1.5,
        };
        assert_eq!(
            err.to_string(),
            "invalid range 0.000s..2.500s for sample of 1.500s"
        );
        assert_eq!(
            SamplerError::NotLoaded(4).to_string(),
            "slot 4 has no loaded sample"
        );
    }
}
