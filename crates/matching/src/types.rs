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

use matchbook_sdk::types::Order;
use serde::{Deserialize, Serialize};

/// A resting limit order: the immutable envelope plus execution state
///
/// A `LimitOrder` is created when an order first enters the book and is
/// never mutated in place; each partial fill produces a new value that
/// replaces the old one at the head of its price level.
///
/// Invariants:
/// - `0 < remaining_amount <= order.amount`
/// - `remaining_fee = ceil(order.matcher_fee * remaining_amount / order.amount)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrder {
    /// The signed order envelope
    pub order: Order,
    /// Amount of the amount asset still unfilled
    pub remaining_amount: u64,
    /// Matcher fee still reserved for the unfilled part
    pub remaining_fee: u64,
}

impl LimitOrder {
    /// Wrap a fresh envelope with its full amount and fee remaining.
    pub fn new(order: Order) -> Self {
        let remaining_amount = order.amount;
        let remaining_fee = order.matcher_fee;
        Self {
            order,
            remaining_amount,
            remaining_fee,
        }
    }

    /// Whether this order can still rest or match at `now`.
    pub fn is_valid(&self, now: u64) -> bool {
        self.remaining_amount > 0 && self.order.expiration > now
    }

    /// Remaining state after filling `trade_amount`, as
    /// `(remaining_amount, remaining_fee)`.
    ///
    /// The terminal fill leaves a zero fee so that the fee charged across
    /// all fills telescopes to exactly `order.matcher_fee`.
    pub fn after_fill(&self, trade_amount: u64) -> (u64, u64) {
        debug_assert!(trade_amount <= self.remaining_amount);
        let remaining = self.remaining_amount - trade_amount;
        if remaining == 0 {
            return (0, 0);
        }
        // The ceiling can only shrink as the remainder shrinks, but cap it
        // anyway so the charged fee is never negative.
        let fee = fee_for_remaining(self.order.matcher_fee, self.order.amount, remaining)
            .min(self.remaining_fee);
        (remaining, fee)
    }

    /// Fee charged for filling `trade_amount` out of this order.
    pub fn executed_fee(&self, trade_amount: u64) -> u64 {
        let (_, remaining_fee) = self.after_fill(trade_amount);
        self.remaining_fee - remaining_fee
    }

    /// A copy of this order with the given remaining state.
    pub fn with_remaining(&self, remaining_amount: u64, remaining_fee: u64) -> Self {
        Self {
            order: self.order.clone(),
            remaining_amount,
            remaining_fee,
        }
    }
}

/// Fee reserved for a remainder: `ceil(matcher_fee * remaining / amount)`.
///
/// Computed in u128 so `matcher_fee * remaining` cannot overflow.
pub fn fee_for_remaining(matcher_fee: u64, amount: u64, remaining: u64) -> u64 {
    if amount == 0 {
        return 0;
    }
    let num = matcher_fee as u128 * remaining as u128;
    num.div_ceil(amount as u128) as u64
}
