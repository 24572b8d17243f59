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

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Order side (buy or sell)
///
/// Serialized as `"Buy"` / `"Sell"` — these spellings are part of the
/// public market-status payload and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

/// Asset identifier: a 32-byte issued asset id or the native coin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetId {
    /// The chain's native coin
    Native,
    /// An issued asset, identified by its 32-byte id
    Issued([u8; 32]),
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Native => write!(f, "NATIVE"),
            AssetId::Issued(bytes) => {
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

/// Error parsing an asset id or pair from its canonical string form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAssetError(pub String);

impl fmt::Display for ParseAssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid asset string: {}", self.0)
    }
}

impl std::error::Error for ParseAssetError {}

impl FromStr for AssetId {
    type Err = ParseAssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "NATIVE" {
            return Ok(AssetId::Native);
        }
        if s.len() != 64 || !s.is_ascii() {
            return Err(ParseAssetError(s.to_string()));
        }
        let mut bytes = [0u8; 32];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| ParseAssetError(s.to_string()))?;
        }
        Ok(AssetId::Issued(bytes))
    }
}

/// An ordered trading pair: amount asset priced in the price asset
///
/// The canonical string form `amountAsset-priceAsset` is used as the
/// actor address and the journal/snapshot id for the pair's book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetPair {
    pub amount_asset: AssetId,
    pub price_asset: AssetId,
}

impl AssetPair {
    pub fn new(amount_asset: AssetId, price_asset: AssetId) -> Self {
        Self {
            amount_asset,
            price_asset,
        }
    }

    /// Canonical pair name (`amountAsset-priceAsset`)
    pub fn key(&self) -> String {
        format!("{}-{}", self.amount_asset, self.price_asset)
    }
}

impl fmt::Display for AssetPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.amount_asset, self.price_asset)
    }
}

impl FromStr for AssetPair {
    type Err = ParseAssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, price) = s.split_once('-').ok_or_else(|| ParseAssetError(s.to_string()))?;
        Ok(AssetPair {
            amount_asset: amount.parse()?,
            price_asset: price.parse()?,
        })
    }
}

/// Unique order identifier
pub type OrderId = String;

/// Signed order envelope submitted to the matcher
///
/// The envelope arrives pre-validated by the upstream API layer: the
/// signature and sender are already checked. The matching core only
/// re-checks expiry and the economic validity of remainders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order ID
    pub id: OrderId,
    /// Cryptographic principal identifier of the sender (hex-encoded public key)
    pub sender: String,
    /// Trading pair this order belongs to
    pub pair: AssetPair,
    /// Order side
    pub side: Side,
    /// Total amount of the amount asset
    pub amount: u64,
    /// Limit price (price asset per unit of amount asset)
    pub price: u64,
    /// Timestamp when the order was created (unix millis)
    pub timestamp: u64,
    /// Expiration timestamp (unix millis); the order is dead past this point
    pub expiration: u64,
    /// Fee reserved for the matcher, paid pro rata as the order fills
    pub matcher_fee: u64,
    /// Envelope version
    pub version: u8,
    /// Sender signature over the envelope (validated upstream)
    pub signature: Vec<u8>,
}

/// Reply to a Place command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaceReply {
    /// The order passed admission and entered the match loop
    OrderAccepted { id: OrderId },
    /// The order was rejected at admission; no state was changed
    OrderRejected { id: OrderId, reason: String },
}

/// Reply to a Cancel command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReply {
    OrderCanceled { id: OrderId },
    OrderCancelRejected { id: OrderId, reason: String },
}

/// Market status payload (HTTP representation, stable field names)
///
/// Missing sides serialize as JSON null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketStatus {
    pub last_price: Option<u64>,
    pub last_side: Option<Side>,
    pub bid: Option<u64>,
    pub bid_amount: Option<u64>,
    pub ask: Option<u64>,
    pub ask_amount: Option<u64>,
}

/// One aggregated price level of the order-book payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelView {
    pub price: u64,
    /// Sum of remaining amounts over the level
    pub amount: u64,
}

/// Order-book payload: aggregated depth per price level
///
/// Bids are ordered by descending price, asks by ascending price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookView {
    pub timestamp: u64,
    pub pair: String,
    pub bids: Vec<LevelView>,
    pub asks: Vec<LevelView>,
}
