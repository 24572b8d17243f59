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

use crossbeam::channel::{Receiver, Sender, TryRecvError, unbounded};
use tracing::debug;

use super::{BookEvent, SequenceNumber};
use crate::snapshot::Snapshot;
use crate::tx::ExchangeTransaction;

/// Domain events published for downstream consumers
///
/// Order-history indexes, websocket feeds, and the transaction relay all
/// consume this stream. Events carry their journal sequence where one
/// exists; DeleteBook drains and recovery-synthesized additions are
/// published without one.
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// A book event, with its journal sequence if it was journaled
    Book {
        seq: Option<SequenceNumber>,
        event: BookEvent,
    },
    /// An exchange transaction was built and admitted for a fill
    TxCreated(ExchangeTransaction),
    /// A snapshot was installed during recovery
    SnapshotApplied(Snapshot),
}

/// Event bus the core publishes to
///
/// Publishing must never block the matching loop; implementations accept
/// and fan out on their own time.
pub trait EventBus: Send {
    fn publish(&self, event: BusEvent);
}

/// Channel-backed event bus (single subscriber)
///
/// Unbounded so that `publish` never blocks. A dropped subscriber is
/// tolerated: the core keeps running and publishes into the void, which
/// only costs a debug line.
pub struct ChannelEventBus {
    sender: Sender<BusEvent>,
}

impl ChannelEventBus {
    pub fn new() -> (Self, BusReceiver) {
        let (sender, receiver) = unbounded();
        (Self { sender }, BusReceiver { receiver })
    }
}

impl EventBus for ChannelEventBus {
    fn publish(&self, event: BusEvent) {
        if self.sender.send(event).is_err() {
            debug!(target: "event_bus", "subscriber gone, dropping event");
        }
    }
}

/// Consumer end of the channel bus
pub struct BusReceiver {
    receiver: Receiver<BusEvent>,
}

impl BusReceiver {
    pub fn recv(&self) -> Option<BusEvent> {
        self.receiver.recv().ok()
    }

    pub fn try_recv(&self) -> Option<BusEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<BusEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }

    /// Drain only the journaled/drained book events, discarding the rest.
    pub fn drain_book_events(&self) -> Vec<BookEvent> {
        self.drain()
            .into_iter()
            .filter_map(|bus_event| match bus_event {
                BusEvent::Book { event, .. } => Some(event),
                _ => None,
            })
            .collect()
    }
}
