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

mod bus;

use serde::{Deserialize, Serialize};

pub use bus::{BusEvent, BusReceiver, ChannelEventBus, EventBus};

use crate::book::Book;
use crate::types::LimitOrder;

/// Sequence number for event ordering
///
/// Events are assigned monotonically increasing sequence numbers by the
/// journal to ensure deterministic replay ordering during crash recovery.
pub type SequenceNumber = u64;

/// Events produced by the matching core
///
/// These events are the single source of truth for all book state changes.
/// The book can be fully reconstructed by replaying events from the last
/// snapshot; `apply` is the one place that interprets them, both live and
/// during recovery.
///
/// Executed events record the pre-trade state of both parties together
/// with their post-trade remainders, so a fill is replayable without any
/// out-of-band context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BookEvent {
    /// An order came to rest on the book
    OrderAdded { order: LimitOrder },

    /// The submitted order traded against the resting counter order
    ///
    /// `submitted` and `counter` carry the state *before* the trade; the
    /// remaining fields carry each side's state after it. The trade price
    /// is always the counter (maker) price.
    OrderExecuted {
        submitted: LimitOrder,
        counter: LimitOrder,
        submitted_remaining_amount: u64,
        submitted_remaining_fee: u64,
        counter_remaining_amount: u64,
        counter_remaining_fee: u64,
        trade_amount: u64,
        trade_price: u64,
    },

    /// An order left the book without trading
    ///
    /// `unmatchable` distinguishes automatic removal (expired or dust
    /// residue) from user-initiated or admin cancellation.
    OrderCanceled { order: LimitOrder, unmatchable: bool },
}

impl BookEvent {
    /// Tag byte identifying the variant in the journal record format.
    pub fn tag(&self) -> u8 {
        match self {
            BookEvent::OrderAdded { .. } => 0,
            BookEvent::OrderExecuted { .. } => 1,
            BookEvent::OrderCanceled { .. } => 2,
        }
    }

    /// Id of the order this event is primarily about (the submitted side
    /// for executions).
    pub fn order_id(&self) -> &str {
        match self {
            BookEvent::OrderAdded { order } => &order.order.id,
            BookEvent::OrderExecuted { submitted, .. } => &submitted.order.id,
            BookEvent::OrderCanceled { order, .. } => &order.order.id,
        }
    }

    /// The submitted side's remainder after an execution, if any amount
    /// is left. `None` for non-execution events or full fills.
    pub fn submitted_remainder(&self) -> Option<LimitOrder> {
        match self {
            BookEvent::OrderExecuted {
                submitted,
                submitted_remaining_amount,
                submitted_remaining_fee,
                ..
            } if *submitted_remaining_amount > 0 => {
                Some(submitted.with_remaining(*submitted_remaining_amount, *submitted_remaining_fee))
            }
            _ => None,
        }
    }

    /// The counter side's remainder after an execution, if any amount is
    /// left on the book.
    pub fn counter_remainder(&self) -> Option<LimitOrder> {
        match self {
            BookEvent::OrderExecuted {
                counter,
                counter_remaining_amount,
                counter_remaining_fee,
                ..
            } if *counter_remaining_amount > 0 => {
                Some(counter.with_remaining(*counter_remaining_amount, *counter_remaining_fee))
            }
            _ => None,
        }
    }

    /// Serialize the variant fields for a journal record (the tag byte is
    /// written separately, then fields in declaration order).
    pub fn encode_payload(&self) -> Result<Vec<u8>, bincode::Error> {
        match self {
            BookEvent::OrderAdded { order } => bincode::serialize(order),
            BookEvent::OrderExecuted {
                submitted,
                counter,
                submitted_remaining_amount,
                submitted_remaining_fee,
                counter_remaining_amount,
                counter_remaining_fee,
                trade_amount,
                trade_price,
            } => bincode::serialize(&(
                submitted,
                counter,
                submitted_remaining_amount,
                submitted_remaining_fee,
                counter_remaining_amount,
                counter_remaining_fee,
                trade_amount,
                trade_price,
            )),
            BookEvent::OrderCanceled { order, unmatchable } => {
                bincode::serialize(&(order, unmatchable))
            }
        }
    }

    /// Decode a journal record payload for the given tag byte.
    ///
    /// Returns `None` for an unknown tag (record from a different
    /// version); the journal surfaces that as corruption.
    pub fn decode_payload(tag: u8, payload: &[u8]) -> Result<Option<BookEvent>, bincode::Error> {
        let event = match tag {
            0 => {
                let order: LimitOrder = bincode::deserialize(payload)?;
                BookEvent::OrderAdded { order }
            }
            1 => {
                let (
                    submitted,
                    counter,
                    submitted_remaining_amount,
                    submitted_remaining_fee,
                    counter_remaining_amount,
                    counter_remaining_fee,
                    trade_amount,
                    trade_price,
                ): (LimitOrder, LimitOrder, u64, u64, u64, u64, u64, u64) =
                    bincode::deserialize(payload)?;
                BookEvent::OrderExecuted {
                    submitted,
                    counter,
                    submitted_remaining_amount,
                    submitted_remaining_fee,
                    counter_remaining_amount,
                    counter_remaining_fee,
                    trade_amount,
                    trade_price,
                }
            }
            2 => {
                let (order, unmatchable): (LimitOrder, bool) = bincode::deserialize(payload)?;
                BookEvent::OrderCanceled { order, unmatchable }
            }
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

/// Apply an event to the book.
///
/// This is deterministic: the same event sequence applied to the same
/// starting book always yields the same book. The live path and journal
/// replay both go through here.
pub fn apply(book: &mut Book, event: &BookEvent) {
    match event {
        BookEvent::OrderAdded { order } => {
            book.add(order.clone());
        }
        BookEvent::OrderExecuted {
            submitted,
            counter,
            counter_remaining_amount,
            counter_remaining_fee,
            ..
        } => {
            let side = counter.order.side;
            let price = counter.order.price;
            if *counter_remaining_amount == 0 {
                book.pop_head(side, price);
            } else {
                book.replace_head(
                    side,
                    price,
                    counter.with_remaining(*counter_remaining_amount, *counter_remaining_fee),
                );
            }
            book.record_trade(submitted.order.clone());
        }
        BookEvent::OrderCanceled { order, .. } => {
            // The submitted side of an aborted match never rested; removal
            // is a no-op for it.
            book.remove_by_id(&order.order.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchbook_sdk::types::{AssetId, AssetPair, Order, Side};

    fn test_pair() -> AssetPair {
        AssetPair::new(AssetId::Issued([3u8; 32]), AssetId::Native)
    }

    fn limit(id: &str, side: Side, price: u64, amount: u64) -> LimitOrder {
        LimitOrder::new(Order {
            id: id.to_string(),
            sender: "sender".to_string(),
            pair: test_pair(),
            side,
            amount,
            price,
            timestamp: 1,
            expiration: u64::MAX,
            matcher_fee: 300,
            version: 1,
            signature: vec![],
        })
    }

    fn executed(submitted: &LimitOrder, counter: &LimitOrder, trade_amount: u64) -> BookEvent {
        let (sub_rem, sub_fee) = submitted.after_fill(trade_amount);
        let (cnt_rem, cnt_fee) = counter.after_fill(trade_amount);
        BookEvent::OrderExecuted {
            submitted: submitted.clone(),
            counter: counter.clone(),
            submitted_remaining_amount: sub_rem,
            submitted_remaining_fee: sub_fee,
            counter_remaining_amount: cnt_rem,
            counter_remaining_fee: cnt_fee,
            trade_amount,
            trade_price: counter.order.price,
        }
    }

    #[test]
    fn test_apply_full_fill_removes_counter() {
        let mut book = Book::new(test_pair());
        let counter = limit("s1", Side::Sell, 100, 10);
        book.add(counter.clone());

        let submitted = limit("b1", Side::Buy, 100, 10);
        apply(&mut book, &executed(&submitted, &counter, 10));

        assert!(book.is_empty());
        assert_eq!(book.last_trade().unwrap().id, "b1");
    }

    #[test]
    fn test_apply_partial_fill_replaces_head() {
        let mut book = Book::new(test_pair());
        let counter = limit("s1", Side::Sell, 100, 10);
        book.add(counter.clone());

        let submitted = limit("b1", Side::Buy, 100, 4);
        apply(&mut book, &executed(&submitted, &counter, 4));

        let head = book.best_counter(Side::Buy).unwrap();
        assert_eq!(head.order.id, "s1");
        assert_eq!(head.remaining_amount, 6);
    }

    #[test]
    fn test_remainder_accessors() {
        let submitted = limit("b1", Side::Buy, 100, 10);
        let counter = limit("s1", Side::Sell, 100, 4);
        let event = executed(&submitted, &counter, 4);

        let sub_rem = event.submitted_remainder().unwrap();
        assert_eq!(sub_rem.remaining_amount, 6);
        assert!(event.counter_remainder().is_none());
    }

    #[test]
    fn test_payload_roundtrip_every_variant() {
        let submitted = limit("b1", Side::Buy, 100, 10);
        let counter = limit("s1", Side::Sell, 100, 4);
        let events = vec![
            BookEvent::OrderAdded {
                order: submitted.clone(),
            },
            executed(&submitted, &counter, 4),
            BookEvent::OrderCanceled {
                order: counter,
                unmatchable: true,
            },
        ];
        for event in events {
            let payload = event.encode_payload().unwrap();
            let decoded = BookEvent::decode_payload(event.tag(), &payload)
                .unwrap()
                .unwrap();
            assert_eq!(decoded, event);
        }
        assert!(BookEvent::decode_payload(200, &[]).unwrap().is_none());
    }
}
