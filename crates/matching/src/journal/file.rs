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

//! File-backed journal
//!
//! # Binary format (per record)
//! ```text
//! [body_len: u32]
//! [sequence: u64]
//! [tag: u8]            // event variant
//! [payload: bytes]     // variant fields in declaration order (bincode)
//! [checksum: u32]      // CRC32C over sequence ++ tag ++ payload
//! ```
//!
//! Records are fsync'd on append: when `append` returns, the event is on
//! disk. A torn record at the tail (crash mid-write) is detected and cut
//! off on open; a bad checksum anywhere earlier is corruption and refuses
//! to open.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crc32c::crc32c;
use tracing::{info, warn};

use super::{Journal, JournalError};
use crate::event::{BookEvent, SequenceNumber};

const JOURNAL_FILE: &str = "journal.bin";
// body_len covers seq (8) + tag (1) + payload + crc (4)
const MIN_BODY_LEN: usize = 13;
const MAX_BODY_LEN: usize = 64 * 1024 * 1024;

pub struct FileJournal {
    path: PathBuf,
    file: File,
    /// Write-through mirror of the retained records, in sequence order
    entries: Vec<(SequenceNumber, BookEvent)>,
    next_seq: SequenceNumber,
}

impl FileJournal {
    /// Open (or create) the journal for a book under `dir`.
    ///
    /// Existing records are read back into memory; a torn tail is trimmed
    /// with a warning, any earlier corruption is an error.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, JournalError> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(JOURNAL_FILE);

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let (entries, good_len) = Self::scan(&bytes)?;
        if good_len < bytes.len() {
            warn!(
                target: "journal",
                path = %path.display(),
                torn_bytes = bytes.len() - good_len,
                "trimming torn record at journal tail"
            );
        }

        let next_seq = entries.last().map(|(seq, _)| seq + 1).unwrap_or(1);

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        if good_len < bytes.len() {
            file.set_len(good_len as u64)?;
            file.sync_all()?;
        }

        info!(
            target: "journal",
            path = %path.display(),
            records = entries.len(),
            next_seq = next_seq,
            "journal opened"
        );

        Ok(Self {
            path,
            file,
            entries,
            next_seq,
        })
    }

    /// Parse records from `bytes`; returns the entries and the offset up
    /// to which the file is well-formed.
    fn scan(bytes: &[u8]) -> Result<(Vec<(SequenceNumber, BookEvent)>, usize), JournalError> {
        let mut entries = Vec::new();
        let mut pos = 0usize;

        while pos < bytes.len() {
            let remaining = &bytes[pos..];
            if remaining.len() < 4 {
                break; // torn length prefix
            }
            let body_len =
                u32::from_le_bytes(remaining[..4].try_into().expect("4-byte slice")) as usize;
            if !(MIN_BODY_LEN..=MAX_BODY_LEN).contains(&body_len) {
                return Err(JournalError::Corrupted(format!(
                    "implausible record length {} at offset {}",
                    body_len, pos
                )));
            }
            if remaining.len() < 4 + body_len {
                break; // torn body
            }

            let body = &remaining[4..4 + body_len];
            let seq = u64::from_le_bytes(body[..8].try_into().expect("8-byte slice"));
            let tag = body[8];
            let payload = &body[9..body_len - 4];
            let stored_crc =
                u32::from_le_bytes(body[body_len - 4..].try_into().expect("4-byte slice"));

            if stored_crc != record_checksum(seq, tag, payload) {
                // A bad checksum on the very last record is a torn write;
                // anywhere else it means the log is damaged.
                if pos + 4 + body_len == bytes.len() {
                    break;
                }
                return Err(JournalError::Corrupted(format!(
                    "checksum mismatch at offset {}",
                    pos
                )));
            }

            let event = BookEvent::decode_payload(tag, payload)
                .map_err(|e| JournalError::Corrupted(e.to_string()))?
                .ok_or_else(|| {
                    JournalError::Corrupted(format!("unknown record tag {} at offset {}", tag, pos))
                })?;

            if let Some((last_seq, _)) = entries.last() {
                if seq != last_seq + 1 {
                    return Err(JournalError::Corrupted(format!(
                        "sequence gap: {} follows {}",
                        seq, last_seq
                    )));
                }
            }

            entries.push((seq, event));
            pos += 4 + body_len;
        }

        Ok((entries, pos))
    }

    fn encode_record(seq: SequenceNumber, event: &BookEvent) -> Result<Vec<u8>, JournalError> {
        let payload = event
            .encode_payload()
            .map_err(|e| JournalError::Serialization(e.to_string()))?;
        let tag = event.tag();
        let body_len = (8 + 1 + payload.len() + 4) as u32;

        let mut buf = Vec::with_capacity(4 + body_len as usize);
        buf.extend_from_slice(&body_len.to_le_bytes());
        buf.extend_from_slice(&seq.to_le_bytes());
        buf.push(tag);
        buf.extend_from_slice(&payload);
        buf.extend_from_slice(&record_checksum(seq, tag, &payload).to_le_bytes());
        Ok(buf)
    }

    /// Rewrite the on-disk file with the current in-memory entries.
    ///
    /// Written to a temp file first and renamed over, so a crash during
    /// truncation leaves either the old or the new file, never a hybrid.
    fn rewrite(&mut self) -> Result<(), JournalError> {
        let tmp_path = self.path.with_extension("bin.tmp");
        let mut tmp = File::create(&tmp_path)?;
        for (seq, event) in &self.entries {
            tmp.write_all(&Self::encode_record(*seq, event)?)?;
        }
        tmp.sync_all()?;
        fs::rename(&tmp_path, &self.path)?;

        self.file = OpenOptions::new().append(true).open(&self.path)?;
        Ok(())
    }
}

fn record_checksum(seq: SequenceNumber, tag: u8, payload: &[u8]) -> u32 {
    let mut buf = Vec::with_capacity(8 + 1 + payload.len());
    buf.extend_from_slice(&seq.to_le_bytes());
    buf.push(tag);
    buf.extend_from_slice(payload);
    crc32c(&buf)
}

impl Journal for FileJournal {
    fn append(&mut self, event: &BookEvent) -> Result<SequenceNumber, JournalError> {
        let seq = self.next_seq;
        let record = Self::encode_record(seq, event)?;
        self.file.write_all(&record)?;
        self.file.sync_data()?;

        self.entries.push((seq, event.clone()));
        self.next_seq += 1;
        Ok(seq)
    }

    fn next_seq(&self) -> SequenceNumber {
        self.next_seq
    }

    fn replay(&mut self) -> Result<Vec<(SequenceNumber, BookEvent)>, JournalError> {
        Ok(self.entries.clone())
    }

    fn truncate_through(&mut self, seq: SequenceNumber) -> Result<(), JournalError> {
        let before = self.entries.len();
        self.entries.retain(|(entry_seq, _)| *entry_seq > seq);
        if self.entries.len() != before {
            self.rewrite()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LimitOrder;
    use matchbook_sdk::types::{AssetId, AssetPair, Order, Side};
    use tempfile::TempDir;

    fn added(id: &str) -> BookEvent {
        BookEvent::OrderAdded {
            order: LimitOrder::new(Order {
                id: id.to_string(),
                sender: "sender".to_string(),
                pair: AssetPair::new(AssetId::Issued([2u8; 32]), AssetId::Native),
                side: Side::Sell,
                amount: 10,
                price: 100,
                timestamp: 1,
                expiration: u64::MAX,
                matcher_fee: 30,
                version: 1,
                signature: vec![],
            }),
        }
    }

    #[test]
    fn test_append_and_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let mut journal = FileJournal::open(tmp.path()).unwrap();
            assert_eq!(journal.append(&added("a")).unwrap(), 1);
            assert_eq!(journal.append(&added("b")).unwrap(), 2);
        }

        let mut reopened = FileJournal::open(tmp.path()).unwrap();
        let entries = reopened.replay().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, 1);
        assert_eq!(entries[1].1.order_id(), "b");
        assert_eq!(reopened.next_seq(), 3);
    }

    #[test]
    fn test_truncate_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let mut journal = FileJournal::open(tmp.path()).unwrap();
            for id in ["a", "b", "c"] {
                journal.append(&added(id)).unwrap();
            }
            journal.truncate_through(2).unwrap();
            assert_eq!(journal.append(&added("d")).unwrap(), 4);
        }

        let mut reopened = FileJournal::open(tmp.path()).unwrap();
        let seqs: Vec<_> = reopened
            .replay()
            .unwrap()
            .into_iter()
            .map(|(seq, _)| seq)
            .collect();
        assert_eq!(seqs, vec![3, 4]);
    }

    #[test]
    fn test_torn_tail_is_trimmed() {
        let tmp = TempDir::new().unwrap();
        {
            let mut journal = FileJournal::open(tmp.path()).unwrap();
            journal.append(&added("a")).unwrap();
            journal.append(&added("b")).unwrap();
        }

        // Chop bytes off the last record to simulate a crash mid-write
        let path = tmp.path().join(JOURNAL_FILE);
        let bytes = fs::read(&path).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        let mut reopened = FileJournal::open(tmp.path()).unwrap();
        let entries = reopened.replay().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].1.order_id(), "a");
        // The trimmed record's sequence is reused
        assert_eq!(reopened.next_seq(), 2);
    }

    #[test]
    fn test_mid_file_corruption_is_fatal() {
        let tmp = TempDir::new().unwrap();
        {
            let mut journal = FileJournal::open(tmp.path()).unwrap();
            journal.append(&added("a")).unwrap();
            journal.append(&added("b")).unwrap();
        }

        // Flip a byte inside the first record's payload
        let path = tmp.path().join(JOURNAL_FILE);
        let mut bytes = fs::read(&path).unwrap();
        bytes[20] ^= 0xff;
        fs::write(&path, &bytes).unwrap();

        let result = FileJournal::open(tmp.path());
        assert!(matches!(result, Err(JournalError::Corrupted(_))));
    }
}
