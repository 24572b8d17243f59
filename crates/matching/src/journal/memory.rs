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

use super::{Journal, JournalError};
use crate::event::{BookEvent, SequenceNumber};

/// In-memory journal
///
/// Provides the full journal contract with no durability. Suitable for
/// tests, benchmarks, and books whose state is disposable.
pub struct MemoryJournal {
    entries: Vec<(SequenceNumber, BookEvent)>,
    next_seq: SequenceNumber,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 1,
        }
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MemoryJournal {
    fn default() -> Self {
        Self::new()
    }
}

impl Journal for MemoryJournal {
    fn append(&mut self, event: &BookEvent) -> Result<SequenceNumber, JournalError> {
        let seq = self.next_seq;
        self.entries.push((seq, event.clone()));
        self.next_seq += 1;
        Ok(seq)
    }

    fn next_seq(&self) -> SequenceNumber {
        self.next_seq
    }

    fn replay(&mut self) -> Result<Vec<(SequenceNumber, BookEvent)>, JournalError> {
        Ok(self.entries.clone())
    }

    fn truncate_through(&mut self, seq: SequenceNumber) -> Result<(), JournalError> {
        self.entries.retain(|(entry_seq, _)| *entry_seq > seq);
        Ok(())
    }
}
