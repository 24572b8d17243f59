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

use matchbook_sdk::types::{
    CancelReply, LevelView, MarketStatus, Order, OrderBookView, OrderId, PlaceReply,
};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::recovery::RecoveryError;
use crate::types::LimitOrder;

/// Commands accepted by a book core
///
/// All commands for one pair funnel through one bounded mailbox and are
/// processed strictly in arrival order by the pair's loop thread. Replies
/// travel back on oneshot channels so callers never share state with the
/// loop.
#[derive(Debug)]
pub enum Command {
    /// Submit an order; admission is checked, then the match loop runs.
    Place {
        order: Order,
        respond_to: oneshot::Sender<PlaceReply>,
    },

    /// Cancel a resting order by id (user-initiated).
    Cancel {
        id: OrderId,
        respond_to: oneshot::Sender<CancelReply>,
    },

    /// Expiry scan: cancel every resting order no longer valid at `now`.
    Cleanup { now: u64 },

    /// Drain the book, clear its persistence, and stop the core.
    ///
    /// Terminal: the per-order cancels are published but not journaled;
    /// the journal truncation is the durable record.
    DeleteBook { respond_to: oneshot::Sender<()> },

    /// Persist a snapshot at the current journal sequence.
    ///
    /// Enqueued by the core to itself when the snapshot interval elapses;
    /// also available externally for admin use.
    SaveSnapshot,

    /// All resting orders, bids before asks.
    GetOrders {
        respond_to: oneshot::Sender<Vec<LimitOrder>>,
    },

    /// Aggregated bid levels, best first.
    GetBids {
        respond_to: oneshot::Sender<Vec<LevelView>>,
    },

    /// Aggregated ask levels, best first.
    GetAsks {
        respond_to: oneshot::Sender<Vec<LevelView>>,
    },

    GetMarketStatus {
        respond_to: oneshot::Sender<MarketStatus>,
    },

    GetOrderBook {
        respond_to: oneshot::Sender<OrderBookView>,
    },
}

/// Error types for book core operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// The mailbox is at capacity; the command was not accepted and can
    /// be retried.
    #[error("book core mailbox is full")]
    MailboxFull,
    #[error("book core stopped")]
    Stopped,
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
    #[error("failed to spawn book core thread: {0}")]
    Spawn(String),
}
