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

use std::cmp::Reverse;
use std::collections::BTreeMap;

use matchbook_sdk::types::{AssetPair, LevelView, MarketStatus, Order, OrderBookView, Side};
use serde::{Deserialize, Serialize};

use crate::types::LimitOrder;

/// Price level in the order book
///
/// A price level contains all resting orders at a specific price,
/// maintained in time priority order (first-in-first-out). A partially
/// filled head keeps its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    price: u64,
    /// Orders at this price level in arrival order
    orders: Vec<LimitOrder>,
    /// Total remaining amount of all orders at this level
    total_amount: u64,
}

impl Level {
    fn new(price: u64) -> Self {
        Self {
            price,
            orders: Vec::new(),
            total_amount: 0,
        }
    }

    fn push(&mut self, lo: LimitOrder) {
        self.total_amount += lo.remaining_amount;
        self.orders.push(lo);
    }

    fn remove(&mut self, id: &str) -> Option<LimitOrder> {
        let pos = self.orders.iter().position(|lo| lo.order.id == id)?;
        let lo = self.orders.remove(pos);
        self.total_amount -= lo.remaining_amount;
        Some(lo)
    }

    fn pop_head(&mut self) -> Option<LimitOrder> {
        if self.orders.is_empty() {
            return None;
        }
        let lo = self.orders.remove(0);
        self.total_amount -= lo.remaining_amount;
        Some(lo)
    }

    fn replace_head(&mut self, new_lo: LimitOrder) {
        if let Some(head) = self.orders.first_mut() {
            self.total_amount = self.total_amount - head.remaining_amount + new_lo.remaining_amount;
            *head = new_lo;
        }
    }

    pub fn head(&self) -> Option<&LimitOrder> {
        self.orders.first()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn total_amount(&self) -> u64 {
        self.total_amount
    }

    pub fn orders(&self) -> &[LimitOrder] {
        &self.orders
    }
}

/// Continuous limit order book for one trading pair (single-threaded)
///
/// Pure data structure with deterministic iteration order. All mutation
/// happens on the pair's book-core thread; there is no interior locking.
///
/// - Bid side: highest price first (descending via Reverse keys)
/// - Ask side: lowest price first (natural BTreeMap order)
/// - A level drops out the moment its last order is removed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pair: AssetPair,
    /// Buy side: price (high to low) -> Level
    bids: BTreeMap<Reverse<u64>, Level>,
    /// Sell side: price (low to high) -> Level
    asks: BTreeMap<u64, Level>,
    /// Aggressor envelope of the most recent execution
    last_trade: Option<Order>,
}

impl Book {
    pub fn new(pair: AssetPair) -> Self {
        Self {
            pair,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            last_trade: None,
        }
    }

    pub fn pair(&self) -> &AssetPair {
        &self.pair
    }

    /// Insert a resting order at the tail of its price level.
    pub fn add(&mut self, lo: LimitOrder) {
        let price = lo.order.price;
        match lo.order.side {
            Side::Buy => self
                .bids
                .entry(Reverse(price))
                .or_insert_with(|| Level::new(price))
                .push(lo),
            Side::Sell => self
                .asks
                .entry(price)
                .or_insert_with(|| Level::new(price))
                .push(lo),
        }
    }

    /// Find and remove an order by id, searching both sides.
    pub fn remove_by_id(&mut self, id: &str) -> Option<LimitOrder> {
        let mut removed = None;
        let mut empty_bid = None;
        for (key, level) in self.bids.iter_mut() {
            if let Some(lo) = level.remove(id) {
                if level.is_empty() {
                    empty_bid = Some(*key);
                }
                removed = Some(lo);
                break;
            }
        }
        if let Some(key) = empty_bid {
            self.bids.remove(&key);
        }
        if removed.is_some() {
            return removed;
        }

        let mut empty_ask = None;
        for (key, level) in self.asks.iter_mut() {
            if let Some(lo) = level.remove(id) {
                if level.is_empty() {
                    empty_ask = Some(*key);
                }
                removed = Some(lo);
                break;
            }
        }
        if let Some(key) = empty_ask {
            self.asks.remove(&key);
        }
        removed
    }

    pub fn get_by_id(&self, id: &str) -> Option<&LimitOrder> {
        self.bids
            .values()
            .chain(self.asks.values())
            .flat_map(|level| level.orders().iter())
            .find(|lo| lo.order.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get_by_id(id).is_some()
    }

    /// Best counter order for an incoming order on `side`: the head of the
    /// lowest ask for a Buy, the head of the highest bid for a Sell.
    pub fn best_counter(&self, side: Side) -> Option<&LimitOrder> {
        match side {
            Side::Buy => self.asks.values().next().and_then(|level| level.head()),
            Side::Sell => self.bids.values().next().and_then(|level| level.head()),
        }
    }

    /// Remove the head of the level at (`side`, `price`).
    pub fn pop_head(&mut self, side: Side, price: u64) -> Option<LimitOrder> {
        match side {
            Side::Buy => {
                let level = self.bids.get_mut(&Reverse(price))?;
                let lo = level.pop_head();
                if level.is_empty() {
                    self.bids.remove(&Reverse(price));
                }
                lo
            }
            Side::Sell => {
                let level = self.asks.get_mut(&price)?;
                let lo = level.pop_head();
                if level.is_empty() {
                    self.asks.remove(&price);
                }
                lo
            }
        }
    }

    /// Replace the head of the level at (`side`, `price`) with a new value.
    ///
    /// Used when a resting counter order is partially filled: the remainder
    /// keeps its position at the head of its level.
    pub fn replace_head(&mut self, side: Side, price: u64, new_lo: LimitOrder) {
        match side {
            Side::Buy => {
                if let Some(level) = self.bids.get_mut(&Reverse(price)) {
                    level.replace_head(new_lo);
                }
            }
            Side::Sell => {
                if let Some(level) = self.asks.get_mut(&price) {
                    level.replace_head(new_lo);
                }
            }
        }
    }

    pub fn best_bid(&self) -> Option<(u64, u64)> {
        self.bids
            .iter()
            .next()
            .map(|(key, level)| (key.0, level.total_amount()))
    }

    pub fn best_ask(&self) -> Option<(u64, u64)> {
        self.asks
            .iter()
            .next()
            .map(|(price, level)| (*price, level.total_amount()))
    }

    pub fn last_trade(&self) -> Option<&Order> {
        self.last_trade.as_ref()
    }

    pub fn record_trade(&mut self, aggressor: Order) {
        self.last_trade = Some(aggressor);
    }

    /// All resting orders, bids (price descending) before asks (ascending),
    /// arrival order within each level.
    pub fn orders(&self) -> Vec<LimitOrder> {
        self.bids
            .values()
            .chain(self.asks.values())
            .flat_map(|level| level.orders().iter().cloned())
            .collect()
    }

    pub fn order_count(&self) -> usize {
        let bids: usize = self.bids.values().map(|l| l.orders().len()).sum();
        let asks: usize = self.asks.values().map(|l| l.orders().len()).sum();
        bids + asks
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Aggregated bid levels, best (highest) price first.
    pub fn bid_levels(&self) -> Vec<LevelView> {
        self.bids
            .iter()
            .map(|(key, level)| LevelView {
                price: key.0,
                amount: level.total_amount(),
            })
            .collect()
    }

    /// Aggregated ask levels, best (lowest) price first.
    pub fn ask_levels(&self) -> Vec<LevelView> {
        self.asks
            .iter()
            .map(|(price, level)| LevelView {
                price: *price,
                amount: level.total_amount(),
            })
            .collect()
    }

    pub fn market_status(&self) -> MarketStatus {
        let bid = self.best_bid();
        let ask = self.best_ask();
        MarketStatus {
            last_price: self.last_trade.as_ref().map(|o| o.price),
            last_side: self.last_trade.as_ref().map(|o| o.side),
            bid: bid.map(|(price, _)| price),
            bid_amount: bid.map(|(_, amount)| amount),
            ask: ask.map(|(price, _)| price),
            ask_amount: ask.map(|(_, amount)| amount),
        }
    }

    pub fn depth(&self, timestamp: u64) -> OrderBookView {
        OrderBookView {
            timestamp,
            pair: self.pair.key(),
            bids: self.bid_levels(),
            asks: self.ask_levels(),
        }
    }
}
