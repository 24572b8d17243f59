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

//! Book core: the per-pair serializing driver
//!
//! One `BookCore` exists per trading pair. It owns the pair's book,
//! journal handle, and snapshot writer on a single dedicated thread; all
//! mutations are serialized through its bounded mailbox, so the matching
//! path needs no locks.
//!
//! Every state change is journaled before it is applied and published
//! (strict write-ahead). Restart recovery replays the journal on top of
//! the latest snapshot before the first command is dequeued.

mod command;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use matchbook_sdk::types::{
    AssetPair, CancelReply, LevelView, MarketStatus, Order, OrderBookView, OrderId, PlaceReply,
};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

pub use command::{Command, CoreError};

use crate::book::Book;
use crate::config::MatcherConfig;
use crate::event::{self, BookEvent, BusEvent, EventBus};
use crate::journal::{Journal, JournalError};
use crate::matcher;
use crate::recovery;
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::tx::{BroadcastGroup, TxBuilder, TxError, UtxPool};
use crate::types::LimitOrder;

/// External collaborators and storage handed to a book core at start
///
/// The loop thread takes sole ownership of all of them; nothing here is
/// shared with other threads afterwards.
pub struct BookCoreDeps {
    pub journal: Box<dyn Journal>,
    pub snapshots: Box<dyn SnapshotStore>,
    pub tx_builder: Box<dyn TxBuilder>,
    pub utx: Box<dyn UtxPool>,
    pub channels: Box<dyn BroadcastGroup>,
    pub bus: Box<dyn EventBus>,
}

/// Cloneable command surface of a running book core
#[derive(Clone)]
pub struct CommandSender {
    sender: Sender<Command>,
}

impl CommandSender {
    /// Enqueue a command without waiting for any reply.
    ///
    /// `MailboxFull` is retryable; the command was not accepted and no
    /// state changed.
    pub fn send(&self, command: Command) -> Result<(), CoreError> {
        self.sender.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => CoreError::MailboxFull,
            TrySendError::Disconnected(_) => CoreError::Stopped,
        })
    }

    pub fn place(&self, order: Order) -> Result<PlaceReply, CoreError> {
        let (respond_to, reply) = oneshot::channel();
        self.send(Command::Place { order, respond_to })?;
        reply.blocking_recv().map_err(|_| CoreError::Stopped)
    }

    pub fn cancel(&self, id: OrderId) -> Result<CancelReply, CoreError> {
        let (respond_to, reply) = oneshot::channel();
        self.send(Command::Cancel { id, respond_to })?;
        reply.blocking_recv().map_err(|_| CoreError::Stopped)
    }

    pub fn cleanup(&self, now: u64) -> Result<(), CoreError> {
        self.send(Command::Cleanup { now })
    }

    pub fn save_snapshot(&self) -> Result<(), CoreError> {
        self.send(Command::SaveSnapshot)
    }

    pub fn delete_book(&self) -> Result<(), CoreError> {
        let (respond_to, reply) = oneshot::channel();
        self.send(Command::DeleteBook { respond_to })?;
        reply.blocking_recv().map_err(|_| CoreError::Stopped)
    }

    pub fn orders(&self) -> Result<Vec<LimitOrder>, CoreError> {
        let (respond_to, reply) = oneshot::channel();
        self.send(Command::GetOrders { respond_to })?;
        reply.blocking_recv().map_err(|_| CoreError::Stopped)
    }

    pub fn bids(&self) -> Result<Vec<LevelView>, CoreError> {
        let (respond_to, reply) = oneshot::channel();
        self.send(Command::GetBids { respond_to })?;
        reply.blocking_recv().map_err(|_| CoreError::Stopped)
    }

    pub fn asks(&self) -> Result<Vec<LevelView>, CoreError> {
        let (respond_to, reply) = oneshot::channel();
        self.send(Command::GetAsks { respond_to })?;
        reply.blocking_recv().map_err(|_| CoreError::Stopped)
    }

    pub fn market_status(&self) -> Result<MarketStatus, CoreError> {
        let (respond_to, reply) = oneshot::channel();
        self.send(Command::GetMarketStatus { respond_to })?;
        reply.blocking_recv().map_err(|_| CoreError::Stopped)
    }

    pub fn order_book(&self) -> Result<OrderBookView, CoreError> {
        let (respond_to, reply) = oneshot::channel();
        self.send(Command::GetOrderBook { respond_to })?;
        reply.blocking_recv().map_err(|_| CoreError::Stopped)
    }
}

/// Running book core for one pair
///
/// Dropping the core signals shutdown and joins the loop and timer
/// threads. `DeleteBook` stops the loop on its own.
pub struct BookCore {
    sender: CommandSender,
    shutdown: Arc<AtomicBool>,
    timer_stop: Option<Sender<()>>,
    loop_handle: Option<JoinHandle<()>>,
    timer_handle: Option<JoinHandle<()>>,
}

impl BookCore {
    /// Recover the pair's book from its last durable point and start the
    /// core.
    ///
    /// Recovery failure (unreplayable journal) is fatal for the pair and
    /// surfaces here; supervision may retry after repairing storage.
    pub fn start(
        pair: AssetPair,
        config: MatcherConfig,
        mut deps: BookCoreDeps,
    ) -> Result<Self, CoreError> {
        let book = recovery::recover(
            pair,
            deps.journal.as_mut(),
            deps.snapshots.as_ref(),
            deps.bus.as_ref(),
            config.recover_order_history,
        )?;

        let (sender, receiver) = bounded(config.mailbox_capacity);
        let shutdown = Arc::new(AtomicBool::new(false));

        let cleanup_interval = Duration::from_secs(config.order_cleanup_interval_secs);
        let worker = Worker {
            pair,
            config,
            book,
            journal: deps.journal,
            snapshots: deps.snapshots,
            tx_builder: deps.tx_builder,
            utx: deps.utx,
            channels: deps.channels,
            bus: deps.bus,
            self_sender: sender.clone(),
            shutdown: shutdown.clone(),
        };

        let loop_handle = thread::Builder::new()
            .name(format!("book-core-{}", pair.key()))
            .spawn(move || worker.run(receiver))
            .map_err(|e| CoreError::Spawn(e.to_string()))?;

        let (timer_stop, timer_stop_rx) = bounded::<()>(0);
        let timer_sender = sender.clone();
        let timer_handle = thread::Builder::new()
            .name(format!("book-cleanup-{}", pair.key()))
            .spawn(move || run_cleanup_timer(cleanup_interval, timer_sender, timer_stop_rx))
            .map_err(|e| CoreError::Spawn(e.to_string()))?;

        Ok(Self {
            sender: CommandSender { sender },
            shutdown,
            timer_stop: Some(timer_stop),
            loop_handle: Some(loop_handle),
            timer_handle: Some(timer_handle),
        })
    }

    /// Cloneable command surface, shareable across ingress threads.
    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    /// Signal shutdown and join the loop and timer threads.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // Dropping the stop sender wakes the cleanup timer immediately
        self.timer_stop.take();

        if let Some(handle) = self.timer_handle.take() {
            if handle.join().is_err() {
                warn!(target: "book_core", "cleanup timer thread panicked");
            }
        }
        if let Some(handle) = self.loop_handle.take() {
            if handle.join().is_err() {
                warn!(target: "book_core", "book core thread panicked");
            }
        }
    }
}

impl Drop for BookCore {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Cleanup timer loop: sends `Cleanup(now)` every interval until stopped.
fn run_cleanup_timer(interval: Duration, sender: Sender<Command>, stop: Receiver<()>) {
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                let command = Command::Cleanup { now: unix_millis() };
                if sender.try_send(command).is_err() {
                    break;
                }
            }
            _ => break,
        }
    }
}

/// Outcome of attempting the side effects of one fill
enum FillOutcome {
    /// Transaction admitted; the execution event was applied
    Applied,
    /// Transaction rejected; the submitted side re-tries against the
    /// (possibly changed) book
    Retry,
    /// Transaction rejected at the submitted side's fault; stop matching
    Abort,
}

/// Loop-thread owner of one pair's book and storage
struct Worker {
    pair: AssetPair,
    config: MatcherConfig,
    book: Book,
    journal: Box<dyn Journal>,
    snapshots: Box<dyn SnapshotStore>,
    tx_builder: Box<dyn TxBuilder>,
    utx: Box<dyn UtxPool>,
    channels: Box<dyn BroadcastGroup>,
    bus: Box<dyn EventBus>,
    self_sender: Sender<Command>,
    shutdown: Arc<AtomicBool>,
}

impl Worker {
    fn run(mut self, receiver: Receiver<Command>) {
        info!(
            target: "book_core",
            pair = %self.pair.key(),
            resting = self.book.order_count(),
            "book core started"
        );

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            match receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(command) => {
                    if self.handle_command(command) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.shutdown.store(true, Ordering::Relaxed);
        info!(target: "book_core", pair = %self.pair.key(), "book core stopped");
    }

    /// Process one command; returns true when the core must stop.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Place { order, respond_to } => {
                self.handle_place(order, respond_to);
            }
            Command::Cancel { id, respond_to } => {
                self.handle_cancel(id, respond_to);
            }
            Command::Cleanup { now } => {
                self.handle_cleanup(now);
            }
            Command::SaveSnapshot => {
                self.handle_save_snapshot();
            }
            Command::DeleteBook { respond_to } => {
                self.handle_delete_book();
                let _ = respond_to.send(());
                return true;
            }
            Command::GetOrders { respond_to } => {
                let _ = respond_to.send(self.book.orders());
            }
            Command::GetBids { respond_to } => {
                let _ = respond_to.send(self.book.bid_levels());
            }
            Command::GetAsks { respond_to } => {
                let _ = respond_to.send(self.book.ask_levels());
            }
            Command::GetMarketStatus { respond_to } => {
                let _ = respond_to.send(self.book.market_status());
            }
            Command::GetOrderBook { respond_to } => {
                let _ = respond_to.send(self.book.depth(unix_millis()));
            }
        }
        false
    }

    fn handle_place(&mut self, order: Order, respond_to: oneshot::Sender<PlaceReply>) {
        let now = unix_millis();
        if let Err(reason) = self.admit(&order, now) {
            debug!(
                target: "book_core",
                order_id = %order.id,
                reason = %reason,
                "order rejected at admission"
            );
            let _ = respond_to.send(PlaceReply::OrderRejected {
                id: order.id,
                reason,
            });
            return;
        }

        // The placing client learns only that the order was accepted;
        // transaction failures during matching surface on the event
        // stream, never here.
        let _ = respond_to.send(PlaceReply::OrderAccepted {
            id: order.id.clone(),
        });
        self.run_match_loop(LimitOrder::new(order), now);
    }

    /// Admission checks at Place; rejections leave no trace in journal or
    /// book.
    fn admit(&self, order: &Order, now: u64) -> Result<(), String> {
        if order.expiration <= now {
            return Err("order is expired".to_string());
        }
        if order.amount == 0 {
            return Err("amount must be positive".to_string());
        }
        if order.price < self.config.min_price || order.price > self.config.max_price {
            return Err(format!(
                "price {} outside bounds [{}, {}]",
                order.price, self.config.min_price, self.config.max_price
            ));
        }
        if self.config.price_tick > 1 && order.price % self.config.price_tick != 0 {
            return Err(format!(
                "price {} not aligned to tick {}",
                order.price, self.config.price_tick
            ));
        }
        if self.book.contains(&order.id) {
            return Err("duplicate order id".to_string());
        }
        Ok(())
    }

    /// Iterative match loop: one `match_one` step per iteration until the
    /// submitted order rests, fills, or is cancelled.
    ///
    /// The iteration bound is a fail-fast guard: every productive
    /// iteration either consumes submitted amount or removes a resting
    /// order, so exceeding it means a pathological input or a logic bug.
    fn run_match_loop(&mut self, submitted: LimitOrder, now: u64) {
        let mut submitted = submitted;
        let max_iterations = 1 + submitted
            .remaining_amount
            .min(self.book.order_count() as u64);
        let mut iterations = 0u64;

        loop {
            iterations += 1;
            if iterations > max_iterations {
                error!(
                    target: "book_core",
                    order_id = %submitted.order.id,
                    iterations = iterations,
                    "match loop exceeded its bound, cancelling remainder"
                );
                let _ = self.process_event(BookEvent::OrderCanceled {
                    order: submitted,
                    unmatchable: true,
                });
                return;
            }

            let event = matcher::match_one(&self.book, &submitted);
            if !matches!(event, BookEvent::OrderExecuted { .. }) {
                let _ = self.process_event(event);
                return;
            }

            match self.execute_fill(&event) {
                FillOutcome::Applied => {
                    if let Some(counter_rem) = event.counter_remainder() {
                        if !counter_rem.is_valid(now) {
                            let _ = self.process_event(BookEvent::OrderCanceled {
                                order: counter_rem,
                                unmatchable: true,
                            });
                        }
                    }
                    match event.submitted_remainder() {
                        Some(rem) if rem.is_valid(now) => submitted = rem,
                        Some(rem) => {
                            let _ = self.process_event(BookEvent::OrderCanceled {
                                order: rem,
                                unmatchable: true,
                            });
                            return;
                        }
                        None => return,
                    }
                }
                FillOutcome::Retry => {}
                FillOutcome::Abort => return,
            }
        }
    }

    /// Build and admit the exchange transaction for one execution, then
    /// apply the event. The book is untouched unless the transaction was
    /// admitted.
    fn execute_fill(&mut self, event: &BookEvent) -> FillOutcome {
        let admitted = self.tx_builder.build(event).and_then(|tx| {
            self.utx.put_if_new(&tx)?;
            Ok(tx)
        });

        match admitted {
            Ok(tx) => {
                self.channels.broadcast(&tx);
                if self.process_event(event.clone()).is_err() {
                    return FillOutcome::Abort;
                }
                self.bus.publish(BusEvent::TxCreated(tx));
                FillOutcome::Applied
            }
            Err(e) => self.absorb_tx_failure(e, event),
        }
    }

    /// Invalid-transaction policy: evict the party whose state caused the
    /// rejection and keep the book consistent; the other side re-tries
    /// against the next counter.
    fn absorb_tx_failure(&mut self, error: TxError, event: &BookEvent) -> FillOutcome {
        let BookEvent::OrderExecuted {
            submitted, counter, ..
        } = event
        else {
            return FillOutcome::Abort;
        };

        warn!(
            target: "book_core",
            submitted = %submitted.order.id,
            counter = %counter.order.id,
            error = %error,
            "exchange transaction rejected"
        );

        match error {
            TxError::OrderValidation { ref order_id, .. } if *order_id == submitted.order.id => {
                FillOutcome::Abort
            }
            TxError::OrderValidation { .. } => {
                self.cancel_counter(counter);
                FillOutcome::Retry
            }
            TxError::AccountBalance(accounts) => {
                if accounts.contains_key(&counter.order.sender) {
                    self.cancel_counter(counter);
                }
                if accounts.contains_key(&submitted.order.sender) {
                    FillOutcome::Abort
                } else {
                    FillOutcome::Retry
                }
            }
            TxError::NegativeAmount => {
                let _ = self.process_event(BookEvent::OrderCanceled {
                    order: submitted.clone(),
                    unmatchable: true,
                });
                FillOutcome::Abort
            }
            TxError::Other(_) => {
                self.cancel_counter(counter);
                FillOutcome::Retry
            }
        }
    }

    fn cancel_counter(&mut self, counter: &LimitOrder) {
        let _ = self.process_event(BookEvent::OrderCanceled {
            order: counter.clone(),
            unmatchable: false,
        });
    }

    /// Journal, apply, publish — in that order, always.
    ///
    /// A journal failure discards the event: the book is not touched and
    /// nothing is published (strict write-ahead).
    fn process_event(&mut self, event: BookEvent) -> Result<(), JournalError> {
        if self.journal.next_seq() % self.config.snapshot_interval == 0
            && self.self_sender.try_send(Command::SaveSnapshot).is_err()
        {
            debug!(target: "book_core", "mailbox full, snapshot deferred to next interval");
        }

        let seq = match self.journal.append(&event) {
            Ok(seq) => seq,
            Err(e) => {
                error!(
                    target: "book_core",
                    order_id = %event.order_id(),
                    error = %e,
                    "journal append failed, discarding event"
                );
                return Err(e);
            }
        };

        event::apply(&mut self.book, &event);
        self.bus.publish(BusEvent::Book {
            seq: Some(seq),
            event,
        });
        Ok(())
    }

    fn handle_cancel(&mut self, id: OrderId, respond_to: oneshot::Sender<CancelReply>) {
        let reply = match self.book.get_by_id(&id).cloned() {
            Some(lo) => {
                let canceled = BookEvent::OrderCanceled {
                    order: lo,
                    unmatchable: false,
                };
                if self.process_event(canceled).is_ok() {
                    CancelReply::OrderCanceled { id }
                } else {
                    CancelReply::OrderCancelRejected {
                        id,
                        reason: "journal write failed".to_string(),
                    }
                }
            }
            None => CancelReply::OrderCancelRejected {
                id,
                reason: "Order not found".to_string(),
            },
        };
        let _ = respond_to.send(reply);
    }

    fn handle_cleanup(&mut self, now: u64) {
        let stale: Vec<LimitOrder> = self
            .book
            .orders()
            .into_iter()
            .filter(|lo| !lo.is_valid(now))
            .collect();
        if stale.is_empty() {
            return;
        }
        info!(
            target: "book_core",
            pair = %self.pair.key(),
            expired = stale.len(),
            "cleaning up expired orders"
        );
        for lo in stale {
            let _ = self.process_event(BookEvent::OrderCanceled {
                order: lo,
                unmatchable: true,
            });
        }
    }

    /// Snapshot at the current journal sequence; on success the covered
    /// journal prefix and superseded snapshots are pruned. Failures are
    /// logged and the next interval retries.
    fn handle_save_snapshot(&mut self) {
        let seq = self.journal.last_seq();
        let snapshot = Snapshot {
            seq,
            book: self.book.clone(),
        };

        match self.snapshots.save(&snapshot) {
            Ok(()) => {
                info!(target: "book_core", pair = %self.pair.key(), seq = seq, "snapshot saved");
                if let Err(e) = self.journal.truncate_through(seq) {
                    error!(target: "book_core", seq = seq, error = %e, "journal truncation failed");
                }
                if let Err(e) = self.snapshots.delete_before(seq) {
                    error!(target: "book_core", seq = seq, error = %e, "snapshot pruning failed");
                }
            }
            Err(e) => {
                error!(target: "book_core", seq = seq, error = %e, "failed to save snapshot");
            }
        }
    }

    /// Drain every resting order onto the bus, clear persistence, stop.
    fn handle_delete_book(&mut self) {
        let resting = self.book.orders();
        info!(
            target: "book_core",
            pair = %self.pair.key(),
            drained = resting.len(),
            "deleting book"
        );
        for lo in resting {
            self.bus.publish(BusEvent::Book {
                seq: None,
                event: BookEvent::OrderCanceled {
                    order: lo,
                    unmatchable: false,
                },
            });
        }

        if let Err(e) = self.snapshots.delete_before(u64::MAX) {
            error!(target: "book_core", error = %e, "failed to clear snapshots");
        }
        let last = self.journal.last_seq();
        if let Err(e) = self.journal.truncate_through(last) {
            error!(target: "book_core", error = %e, "failed to truncate journal");
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}
