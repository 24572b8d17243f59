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

//! Single-step matcher
//!
//! `match_one` is a pure function from (book, submitted order) to exactly
//! one event: either the order comes to rest, or it trades once against
//! the best counter order at the counter's (maker) price. The book-core
//! driver re-invokes it until no further execution is produced, so all
//! partial-fill walking lives in the driver's bounded loop, not here.

use matchbook_sdk::types::Side;

use crate::book::Book;
use crate::event::BookEvent;
use crate::types::LimitOrder;

/// Whether an incoming order at `submitted_price` crosses a counter at
/// `counter_price`.
fn crosses(side: Side, submitted_price: u64, counter_price: u64) -> bool {
    match side {
        Side::Buy => submitted_price >= counter_price,
        Side::Sell => submitted_price <= counter_price,
    }
}

/// Match the submitted order against the book once.
///
/// Price-time priority is inherited from the book: `best_counter` returns
/// the head of the best opposing level, and a partially filled counter
/// keeps its place there. The trade executes at the counter's price with
/// `trade_amount = min(remaining, remaining)`; fees scale with the filled
/// fraction of each side and a terminal fill consumes that side's exact
/// remaining fee.
pub fn match_one(book: &Book, submitted: &LimitOrder) -> BookEvent {
    let counter = match book.best_counter(submitted.order.side) {
        Some(counter) if crosses(
            submitted.order.side,
            submitted.order.price,
            counter.order.price,
        ) =>
        {
            counter
        }
        _ => {
            return BookEvent::OrderAdded {
                order: submitted.clone(),
            };
        }
    };

    let trade_amount = submitted.remaining_amount.min(counter.remaining_amount);
    let trade_price = counter.order.price;
    let (submitted_remaining_amount, submitted_remaining_fee) = submitted.after_fill(trade_amount);
    let (counter_remaining_amount, counter_remaining_fee) = counter.after_fill(trade_amount);

    BookEvent::OrderExecuted {
        submitted: submitted.clone(),
        counter: counter.clone(),
        submitted_remaining_amount,
        submitted_remaining_fee,
        counter_remaining_amount,
        counter_remaining_fee,
        trade_amount,
        trade_price,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchbook_sdk::types::{AssetId, AssetPair, Order};

    fn test_pair() -> AssetPair {
        AssetPair::new(AssetId::Issued([9u8; 32]), AssetId::Native)
    }

    fn limit(id: &str, side: Side, price: u64, amount: u64, fee: u64) -> LimitOrder {
        LimitOrder::new(Order {
            id: id.to_string(),
            sender: format!("{}_sender", id),
            pair: test_pair(),
            side,
            amount,
            price,
            timestamp: 1,
            expiration: u64::MAX,
            matcher_fee: fee,
            version: 1,
            signature: vec![],
        })
    }

    #[test]
    fn test_no_counter_rests() {
        let book = Book::new(test_pair());
        let submitted = limit("b1", Side::Buy, 100, 10, 30);
        match match_one(&book, &submitted) {
            BookEvent::OrderAdded { order } => assert_eq!(order.order.id, "b1"),
            other => panic!("expected OrderAdded, got {:?}", other),
        }
    }

    #[test]
    fn test_no_cross_rests() {
        let mut book = Book::new(test_pair());
        book.add(limit("s1", Side::Sell, 100, 10, 30));

        let submitted = limit("b1", Side::Buy, 99, 10, 30);
        assert!(matches!(
            match_one(&book, &submitted),
            BookEvent::OrderAdded { .. }
        ));
    }

    #[test]
    fn test_execution_at_maker_price() {
        let mut book = Book::new(test_pair());
        book.add(limit("s1", Side::Sell, 100, 10, 30));

        let submitted = limit("b1", Side::Buy, 105, 10, 50);
        match match_one(&book, &submitted) {
            BookEvent::OrderExecuted {
                trade_price,
                trade_amount,
                submitted_remaining_amount,
                counter_remaining_amount,
                ..
            } => {
                assert_eq!(trade_price, 100);
                assert_eq!(trade_amount, 10);
                assert_eq!(submitted_remaining_amount, 0);
                assert_eq!(counter_remaining_amount, 0);
            }
            other => panic!("expected OrderExecuted, got {:?}", other),
        }
    }

    #[test]
    fn test_partial_fill_of_counter() {
        let mut book = Book::new(test_pair());
        book.add(limit("s1", Side::Sell, 100, 50, 100));

        let submitted = limit("b1", Side::Buy, 100, 30, 60);
        match match_one(&book, &submitted) {
            BookEvent::OrderExecuted {
                trade_amount,
                submitted_remaining_amount,
                counter_remaining_amount,
                counter_remaining_fee,
                ..
            } => {
                assert_eq!(trade_amount, 30);
                assert_eq!(submitted_remaining_amount, 0);
                assert_eq!(counter_remaining_amount, 20);
                // ceil(100 * 20 / 50) = 40
                assert_eq!(counter_remaining_fee, 40);
            }
            other => panic!("expected OrderExecuted, got {:?}", other),
        }
    }

    #[test]
    fn test_sell_against_best_bid() {
        let mut book = Book::new(test_pair());
        book.add(limit("b1", Side::Buy, 100, 10, 30));
        book.add(limit("b2", Side::Buy, 102, 10, 30));

        let submitted = limit("s1", Side::Sell, 100, 5, 15);
        match match_one(&book, &submitted) {
            BookEvent::OrderExecuted {
                counter,
                trade_price,
                ..
            } => {
                assert_eq!(counter.order.id, "b2");
                assert_eq!(trade_price, 102);
            }
            other => panic!("expected OrderExecuted, got {:?}", other),
        }
    }
}
