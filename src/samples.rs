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
//! Sample storage for the pad grid.
//!
//! Samples are decoded entirely into memory when loaded so that triggering a pad never
//! touches the decoder.

pub mod fetch;
mod sample;
mod store;

pub use fetch::{FileFetcher, Fetcher};
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use sample::{Sample, SampleInfo, SourceRef, TrimRange};
pub use store::{
    BulkLoad, BulkOutcome, LoadState, PlayableSample, SampleStore, SlotTarget, SLOT_COUNT,
};
