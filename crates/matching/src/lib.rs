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

//! Matchbook Matching Core
//!
//! This crate provides the per-market order-matching core of the matcher
//! service. Each trading pair is owned by one book core: a single-threaded
//! state machine that maintains a continuous limit order book, matches
//! under strict price-time priority, builds on-chain exchange transactions
//! for fills, and survives restart by event-sourced replay.
//!
//! Architecture:
//! - Single-threaded matching per pair for deterministic behavior
//! - Write-ahead event journal; snapshots as a recovery accelerator
//! - Bounded command mailbox; overflow rejects with a retryable error
//! - Transaction-construction failures absorbed without corrupting the book

pub mod book;
pub mod config;
pub mod core;
pub mod event;
pub mod journal;
pub mod matcher;
pub mod recovery;
pub mod snapshot;
pub mod tx;
pub mod types;

pub use crate::config::MatcherConfig;
pub use crate::core::{BookCore, BookCoreDeps, Command, CommandSender, CoreError};
pub use book::{Book, Level};
pub use event::{
    BookEvent, BusEvent, BusReceiver, ChannelEventBus, EventBus, SequenceNumber, apply,
};
pub use journal::{FileJournal, Journal, JournalError, MemoryJournal};
pub use recovery::RecoveryError;
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, Snapshot, SnapshotError, SnapshotStore};
pub use tx::{
    BroadcastGroup, ExchangeTransaction, LogBroadcastGroup, MatcherTxBuilder, MemoryUtxPool,
    TxBuilder, TxError, UtxPool,
};
pub use types::LimitOrder;
