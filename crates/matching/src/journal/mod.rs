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

mod file;
mod memory;

use thiserror::Error;

use crate::event::{BookEvent, SequenceNumber};

pub use file::FileJournal;
pub use memory::MemoryJournal;

/// Error types for journal operations
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode event: {0}")]
    Serialization(String),
    #[error("journal corrupted: {0}")]
    Corrupted(String),
}

/// Append-only event log with monotonic sequence numbers
///
/// The journal is the write-ahead truth of a book: every state-changing
/// event is appended and acknowledged here *before* it is applied to the
/// in-memory book or published. Replay of the journal on top of the last
/// snapshot reconstructs the live book exactly.
///
/// Key semantic constraints:
/// - Records are immutable once appended
/// - Sequence numbers start at 1 and never repeat or skip
/// - Truncation only ever removes a prefix (entries covered by a snapshot)
///
/// This abstraction is implementation-agnostic: it can be backed by
/// in-memory structures for tests or an fsync'd file for production.
pub trait Journal: Send {
    /// Append an event; returns the sequence number it was assigned.
    ///
    /// The event is durable (to the implementation's guarantee) when this
    /// returns. An error means the record was NOT accepted and must not
    /// be applied.
    fn append(&mut self, event: &BookEvent) -> Result<SequenceNumber, JournalError>;

    /// Sequence number the next appended event will receive.
    fn next_seq(&self) -> SequenceNumber;

    /// Sequence number of the most recently appended event (0 if none).
    fn last_seq(&self) -> SequenceNumber {
        self.next_seq() - 1
    }

    /// All retained entries in sequence order.
    fn replay(&mut self) -> Result<Vec<(SequenceNumber, BookEvent)>, JournalError>;

    /// Drop all entries with sequence `<= seq` (they are covered by a
    /// snapshot). Sequence numbering continues where it left off.
    fn truncate_through(&mut self, seq: SequenceNumber) -> Result<(), JournalError>;
}
