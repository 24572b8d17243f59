// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod storage;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::book::Book;
use crate::event::SequenceNumber;

pub use storage::{FileSnapshotStore, MemorySnapshotStore};

/// Error types for snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to save snapshot: {0}")]
    SaveFailed(String),
    #[error("snapshot corrupted: {0}")]
    Corrupted(String),
    #[error("no snapshot available")]
    NotFound,
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Book state captured at a journal sequence number
///
/// Snapshots are an optimization, never the truth: the truth is always
/// journal prefix + empty book. During recovery:
/// 1. Install the latest snapshot (if readable)
/// 2. Replay journal entries with sequence > `seq`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Journal sequence this snapshot is consistent with
    pub seq: SequenceNumber,
    pub book: Book,
}

/// Persistence for book snapshots
///
/// Unlike the journal (append-only), the snapshot store holds a small set
/// of recent snapshots and deletes old ones once they are superseded.
pub trait SnapshotStore: Send {
    /// Persist a snapshot keyed by its sequence number.
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError>;

    /// Load the snapshot with the highest sequence number.
    ///
    /// `Err(NotFound)` when none exists; `Err(Corrupted)` when the latest
    /// one cannot be decoded (the caller falls back to journal replay).
    fn load_latest(&self) -> Result<Snapshot, SnapshotError>;

    /// Delete snapshots with sequence `< seq`; returns how many went.
    fn delete_before(&mut self, seq: SequenceNumber) -> Result<usize, SnapshotError>;
}
