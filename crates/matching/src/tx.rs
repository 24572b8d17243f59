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

//! Exchange-transaction construction and downstream admission
//!
//! These are the book core's external collaborators: the transaction
//! builder turns an execution into a signed on-chain exchange
//! transaction, the UTX pool admits it, and the channel group broadcasts
//! it to peers. Their failures are absorbed by the core's invalid-tx
//! policy without corrupting book state.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use matchbook_sdk::types::{AssetPair, Order, OrderId, Side};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::event::BookEvent;

/// Why a candidate exchange transaction was rejected
///
/// The invalid-tx policy in the book core pattern-matches on these kinds
/// to decide which party to evict from the match; the set is closed on
/// purpose.
#[derive(Debug, Clone, Error)]
pub enum TxError {
    /// One specific order failed downstream validation
    #[error("order {order_id} failed validation: {reason}")]
    OrderValidation { order_id: OrderId, reason: String },
    /// One or more accounts lack balance; keyed by sender
    #[error("insufficient balance for {} account(s)", .0.len())]
    AccountBalance(HashMap<String, String>),
    /// The execution amounts do not form a positive trade
    #[error("non-positive trade amount")]
    NegativeAmount,
    #[error("transaction rejected: {0}")]
    Other(String),
}

/// A signed on-chain exchange transaction for one fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeTransaction {
    pub id: String,
    pub pair: AssetPair,
    pub buy_order: Order,
    pub sell_order: Order,
    pub amount: u64,
    pub price: u64,
    pub buy_matcher_fee: u64,
    pub sell_matcher_fee: u64,
    pub timestamp: u64,
}

/// Builds an exchange transaction from an execution event
///
/// Must be pure with respect to book state: the same event always yields
/// the same verdict regardless of what the book looks like.
pub trait TxBuilder: Send {
    fn build(&self, execution: &BookEvent) -> Result<ExchangeTransaction, TxError>;
}

/// Unconfirmed-transaction pool
///
/// `put_if_new` is idempotent by transaction id: re-submitting an
/// already-pooled transaction succeeds without effect.
pub trait UtxPool: Send {
    fn put_if_new(&self, tx: &ExchangeTransaction) -> Result<(), TxError>;
}

/// Peer channel group; transactions are broadcast fire-and-forget.
pub trait BroadcastGroup: Send {
    fn broadcast(&self, tx: &ExchangeTransaction);
}

/// Default transaction builder signing as the matcher account
pub struct MatcherTxBuilder {
    matcher: String,
}

impl MatcherTxBuilder {
    pub fn new(matcher: impl Into<String>) -> Self {
        Self {
            matcher: matcher.into(),
        }
    }
}

impl TxBuilder for MatcherTxBuilder {
    fn build(&self, execution: &BookEvent) -> Result<ExchangeTransaction, TxError> {
        let BookEvent::OrderExecuted {
            submitted,
            counter,
            trade_amount,
            trade_price,
            ..
        } = execution
        else {
            return Err(TxError::Other("not an execution event".to_string()));
        };

        if *trade_amount == 0 {
            return Err(TxError::NegativeAmount);
        }
        if *trade_price == 0 {
            return Err(TxError::OrderValidation {
                order_id: counter.order.id.clone(),
                reason: "price must be greater than zero".to_string(),
            });
        }

        let (buy, sell) = match submitted.order.side {
            Side::Buy => (submitted, counter),
            Side::Sell => (counter, submitted),
        };

        debug!(
            target: "tx_builder",
            matcher = %self.matcher,
            buy = %buy.order.id,
            sell = %sell.order.id,
            amount = trade_amount,
            price = trade_price,
            "building exchange transaction"
        );

        Ok(ExchangeTransaction {
            id: format!("tx_{}", uuid::Uuid::new_v4()),
            pair: submitted.order.pair,
            buy_order: buy.order.clone(),
            sell_order: sell.order.clone(),
            amount: *trade_amount,
            price: *trade_price,
            buy_matcher_fee: buy.executed_fee(*trade_amount),
            sell_matcher_fee: sell.executed_fee(*trade_amount),
            timestamp: buy.order.timestamp.max(sell.order.timestamp),
        })
    }
}

/// In-memory UTX pool keyed by transaction id
pub struct MemoryUtxPool {
    seen: Mutex<HashSet<String>>,
}

impl MemoryUtxPool {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.seen.lock().expect("utx pool lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryUtxPool {
    fn default() -> Self {
        Self::new()
    }
}

impl UtxPool for MemoryUtxPool {
    fn put_if_new(&self, tx: &ExchangeTransaction) -> Result<(), TxError> {
        self.seen.lock().expect("utx pool lock").insert(tx.id.clone());
        Ok(())
    }
}

/// Broadcast group that only logs; stands in where no peers are wired.
pub struct LogBroadcastGroup;

impl BroadcastGroup for LogBroadcastGroup {
    fn broadcast(&self, tx: &ExchangeTransaction) {
        debug!(target: "broadcast", tx_id = %tx.id, "broadcasting exchange transaction");
    }
}
