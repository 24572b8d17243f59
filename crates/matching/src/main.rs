// Copyright 2025 chenjjiaa
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

//! Matcher service entry point
//!
//! Runs one book core for the configured trading pair with file-backed
//! journal and snapshots under `data_dir`. The RPC surface that feeds the
//! core lives in the surrounding services; this binary wires the core up
//! and keeps it alive until ctrl-c.

use anyhow::Context;
use matchbook_matching::{
    BookCore, BookCoreDeps, BusEvent, ChannelEventBus, FileJournal, FileSnapshotStore,
    LogBroadcastGroup, MatcherConfig, MatcherTxBuilder, MemoryUtxPool,
};
use matchbook_sdk::types::AssetPair;
use tokio::signal;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => MatcherConfig::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => MatcherConfig::from_env().unwrap_or_default(),
    };
    if config.pair.is_empty() {
        anyhow::bail!("no trading pair configured; set MATCHER_PAIR or pass a config file");
    }
    let pair: AssetPair = config.pair.parse().context("parsing configured pair")?;

    let book_dir = config.data_dir.join(pair.key());
    let journal = FileJournal::open(book_dir.join("journal"))?;
    let snapshots = FileSnapshotStore::open(book_dir.join("snapshots"))?;
    let (bus, bus_receiver) = ChannelEventBus::new();

    // Downstream consumers (order history, feeds) attach here; without
    // them the stream is drained into debug logs.
    let drain = std::thread::spawn(move || {
        while let Some(event) = bus_receiver.recv() {
            match event {
                BusEvent::Book { seq, event } => {
                    debug!(target: "bus", seq = ?seq, order_id = %event.order_id(), "book event")
                }
                BusEvent::TxCreated(tx) => {
                    debug!(target: "bus", tx_id = %tx.id, "exchange transaction created")
                }
                BusEvent::SnapshotApplied(snapshot) => {
                    debug!(target: "bus", seq = snapshot.seq, "snapshot applied")
                }
            }
        }
    });

    let core = BookCore::start(
        pair,
        config,
        BookCoreDeps {
            journal: Box::new(journal),
            snapshots: Box::new(snapshots),
            tx_builder: Box::new(MatcherTxBuilder::new("matcher")),
            utx: Box::new(MemoryUtxPool::new()),
            channels: Box::new(LogBroadcastGroup),
            bus: Box::new(bus),
        },
    )?;

    info!(pair = %pair.key(), "matcher started");
    signal::ctrl_c().await?;
    info!("shutting down");

    core.shutdown();
    let _ = drain.join();
    Ok(())
}
