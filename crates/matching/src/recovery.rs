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

//! Crash recovery
//!
//! Recovery proceeds in phases:
//!
//! 1. Load the latest snapshot (if available) and install it as the book
//! 2. Replay journal entries with sequence past the snapshot
//! 3. If `recover_order_history` is set, republish replayed events and
//!    synthesize an `OrderAdded` for every order still resting, so
//!    history consumers rebuild their indexes
//!
//! A snapshot that cannot be decoded is not fatal: the book falls back to
//! pure journal replay from an empty book. A journal that cannot be
//! replayed is fatal for the pair.

use matchbook_sdk::types::AssetPair;
use thiserror::Error;
use tracing::{info, warn};

use crate::book::Book;
use crate::event::{self, BookEvent, BusEvent, EventBus};
use crate::journal::{Journal, JournalError};
use crate::snapshot::{SnapshotError, SnapshotStore};

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("journal replay failed: {0}")]
    Journal(#[from] JournalError),
}

/// Rebuild the book for `pair` from the last durable point.
pub fn recover(
    pair: AssetPair,
    journal: &mut dyn Journal,
    snapshots: &dyn SnapshotStore,
    bus: &dyn EventBus,
    recover_order_history: bool,
) -> Result<Book, RecoveryError> {
    info!(target: "recovery", pair = %pair.key(), "starting recovery");

    let mut book = Book::new(pair);
    let snapshot_seq = match snapshots.load_latest() {
        Ok(snapshot) => {
            info!(target: "recovery", seq = snapshot.seq, "snapshot loaded");
            book = snapshot.book.clone();
            bus.publish(BusEvent::SnapshotApplied(snapshot.clone()));
            snapshot.seq
        }
        Err(SnapshotError::NotFound) => {
            info!(target: "recovery", "no snapshot found, starting from empty book");
            0
        }
        Err(e) => {
            warn!(
                target: "recovery",
                error = %e,
                "snapshot unreadable, falling back to journal replay from empty book"
            );
            0
        }
    };

    let entries = journal.replay()?;
    let mut replayed = 0u64;
    for (seq, entry) in entries {
        if seq <= snapshot_seq {
            continue;
        }
        event::apply(&mut book, &entry);
        replayed += 1;
        if recover_order_history {
            bus.publish(BusEvent::Book {
                seq: Some(seq),
                event: entry,
            });
        }
    }

    if recover_order_history {
        // History consumers rebuild resting-order indexes from a fresh
        // OrderAdded per live order.
        for lo in book.orders() {
            bus.publish(BusEvent::Book {
                seq: None,
                event: BookEvent::OrderAdded { order: lo },
            });
        }
    }

    info!(
        target: "recovery",
        snapshot_seq = snapshot_seq,
        replayed = replayed,
        resting = book.order_count(),
        "recovery complete"
    );
    Ok(book)
}
