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

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default number of journaled events between snapshot triggers
pub const DEFAULT_SNAPSHOT_INTERVAL: u64 = 1000;

/// Default expiry-scan period in seconds
pub const DEFAULT_ORDER_CLEANUP_INTERVAL_SECS: u64 = 60;

/// Default bound on the per-book command mailbox
pub const DEFAULT_MAILBOX_CAPACITY: usize = 1024;

/// Matcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Canonical pair this matcher instance serves (e.g. "NATIVE-<hex id>")
    pub pair: String,
    /// Journaled events between snapshot triggers; higher means less I/O
    /// but slower recovery
    pub snapshot_interval: u64,
    /// Expiry scan period in seconds
    pub order_cleanup_interval_secs: u64,
    /// Republish events during recovery so downstream indexes rebuild
    pub recover_order_history: bool,
    /// Price bounds applied at Place; violations are order-validation
    /// rejections
    pub min_price: u64,
    pub max_price: u64,
    /// Prices must be a multiple of this tick
    pub price_tick: u64,
    /// Command mailbox bound; overflow rejects Place with a retryable error
    pub mailbox_capacity: usize,
    /// Root directory for journals and snapshots
    pub data_dir: PathBuf,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            pair: String::new(),
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            order_cleanup_interval_secs: DEFAULT_ORDER_CLEANUP_INTERVAL_SECS,
            recover_order_history: false,
            min_price: 1,
            max_price: u64::MAX,
            price_tick: 1,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl MatcherConfig {
    /// Load configuration from environment variables (`MATCHER_` prefix)
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::with_prefix("MATCHER"))
            .build()?;

        cfg.try_deserialize()
    }

    /// Load configuration from file, with environment overrides
    pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("MATCHER"))
            .build()?;

        cfg.try_deserialize()
    }
}
