//! Recovery tests: replay determinism, snapshot equivalence, and fallback
//! behavior across process restarts, using file-backed storage.

use std::path::Path;
use std::time::SystemTime;

use matchbook_matching::{
    Book, BookCore, BookCoreDeps, BusReceiver, ChannelEventBus, FileJournal, FileSnapshotStore,
    LogBroadcastGroup, MatcherConfig, MatcherTxBuilder, MemoryUtxPool, apply,
};
use matchbook_sdk::types::{AssetId, AssetPair, Order, Side};
use tempfile::TempDir;

fn test_pair() -> AssetPair {
    AssetPair::new(AssetId::Issued([0xbb; 32]), AssetId::Native)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

fn order(id: &str, side: Side, price: u64, amount: u64) -> Order {
    Order {
        id: id.to_string(),
        sender: format!("{}_sender", id),
        pair: test_pair(),
        side,
        amount,
        price,
        timestamp: now_millis(),
        expiration: now_millis() + 3_600_000,
        matcher_fee: 300,
        version: 1,
        signature: vec![],
    }
}

fn start_core(dir: &Path, config: MatcherConfig) -> (BookCore, BusReceiver) {
    let (bus, receiver) = ChannelEventBus::new();
    let core = BookCore::start(
        test_pair(),
        config,
        BookCoreDeps {
            journal: Box::new(FileJournal::open(dir.join("journal")).unwrap()),
            snapshots: Box::new(FileSnapshotStore::open(dir.join("snapshots")).unwrap()),
            tx_builder: Box::new(MatcherTxBuilder::new("matcher")),
            utx: Box::new(MemoryUtxPool::new()),
            channels: Box::new(LogBroadcastGroup),
            bus: Box::new(bus),
        },
    )
    .unwrap();
    (core, receiver)
}

/// Drives a mixed flow: resting orders, partial fills, a user cancel.
fn run_mixed_flow(core: &BookCore) {
    let sender = core.sender();
    sender.place(order("s1", Side::Sell, 100, 30)).unwrap();
    sender.place(order("s2", Side::Sell, 101, 50)).unwrap();
    sender.place(order("b1", Side::Buy, 100, 10)).unwrap();
    sender.place(order("b2", Side::Buy, 99, 25)).unwrap();
    sender.place(order("b3", Side::Buy, 101, 40)).unwrap();
    sender.cancel("b2".to_string()).unwrap();
}

#[test]
fn test_restart_restores_book_from_journal() {
    let tmp = TempDir::new().unwrap();

    let (before_orders, before_status) = {
        let (core, _bus) = start_core(tmp.path(), MatcherConfig::default());
        run_mixed_flow(&core);
        let sender = core.sender();
        (sender.orders().unwrap(), sender.market_status().unwrap())
    };
    assert!(!before_orders.is_empty());

    let (core, _bus) = start_core(tmp.path(), MatcherConfig::default());
    let sender = core.sender();
    assert_eq!(sender.orders().unwrap(), before_orders);
    assert_eq!(sender.market_status().unwrap(), before_status);
}

#[test]
fn test_replay_over_empty_book_matches_live_state() {
    let tmp = TempDir::new().unwrap();

    let before_orders = {
        let (core, _bus) = start_core(tmp.path(), MatcherConfig::default());
        run_mixed_flow(&core);
        core.sender().orders().unwrap()
    };

    // The journal prefix applied to an empty book is the live book
    let mut journal = FileJournal::open(tmp.path().join("journal")).unwrap();
    let mut book = Book::new(test_pair());
    for (_, event) in matchbook_matching::Journal::replay(&mut journal).unwrap() {
        apply(&mut book, &event);
    }
    assert_eq!(book.orders(), before_orders);
}

#[test]
fn test_snapshot_plus_tail_equals_live_state() {
    let tmp = TempDir::new().unwrap();
    let config = MatcherConfig {
        // Snapshot aggressively so the flow crosses several intervals
        snapshot_interval: 2,
        ..MatcherConfig::default()
    };

    let (before_orders, before_status) = {
        let (core, _bus) = start_core(tmp.path(), config.clone());
        run_mixed_flow(&core);
        // Force one more snapshot and let it prune the journal
        core.sender().save_snapshot().unwrap();
        let sender = core.sender();
        (sender.orders().unwrap(), sender.market_status().unwrap())
    };

    let snapshots = FileSnapshotStore::open(tmp.path().join("snapshots")).unwrap();
    matchbook_matching::SnapshotStore::load_latest(&snapshots)
        .expect("a snapshot should have been taken");

    let (core, _bus) = start_core(tmp.path(), config);
    let sender = core.sender();
    assert_eq!(sender.orders().unwrap(), before_orders);
    assert_eq!(sender.market_status().unwrap(), before_status);
}

#[test]
fn test_corrupted_snapshot_falls_back_to_replay() {
    let tmp = TempDir::new().unwrap();

    let before_orders = {
        let (core, _bus) = start_core(tmp.path(), MatcherConfig::default());
        run_mixed_flow(&core);
        core.sender().orders().unwrap()
    };

    // A later, unreadable snapshot must not poison recovery
    std::fs::write(
        tmp.path().join("snapshots").join("snapshot-9999999999.json"),
        b"{definitely not a snapshot",
    )
    .unwrap();

    let (core, _bus) = start_core(tmp.path(), MatcherConfig::default());
    assert_eq!(core.sender().orders().unwrap(), before_orders);
}

#[test]
fn test_delete_book_is_terminal() {
    let tmp = TempDir::new().unwrap();

    {
        let (core, _bus) = start_core(tmp.path(), MatcherConfig::default());
        let sender = core.sender();
        sender.place(order("s1", Side::Sell, 100, 30)).unwrap();
        sender.place(order("b1", Side::Buy, 99, 30)).unwrap();
        sender.delete_book().unwrap();
    }

    // Restart finds neither journal entries nor snapshots
    let (core, _bus) = start_core(tmp.path(), MatcherConfig::default());
    assert!(core.sender().orders().unwrap().is_empty());
}

#[test]
fn test_history_republish_on_recovery() {
    let tmp = TempDir::new().unwrap();

    {
        let (core, _bus) = start_core(tmp.path(), MatcherConfig::default());
        let sender = core.sender();
        sender.place(order("s1", Side::Sell, 100, 30)).unwrap();
        sender.place(order("b1", Side::Buy, 100, 10)).unwrap();
    }

    let config = MatcherConfig {
        recover_order_history: true,
        ..MatcherConfig::default()
    };
    let (core, bus) = start_core(tmp.path(), config);
    let _ = core.sender().orders().unwrap();

    let events = bus.drain_book_events();
    // Two replayed journal entries plus one synthesized addition for the
    // surviving remainder of s1
    assert_eq!(events.len(), 3);
    match events.last().unwrap() {
        matchbook_matching::BookEvent::OrderAdded { order } => {
            assert_eq!(order.order.id, "s1");
            assert_eq!(order.remaining_amount, 20);
        }
        other => panic!("expected synthesized OrderAdded, got {:?}", other),
    }
}
