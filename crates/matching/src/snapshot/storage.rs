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

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::{Snapshot, SnapshotError, SnapshotStore};
use crate::event::SequenceNumber;

/// In-memory snapshot store for tests and disposable books
pub struct MemorySnapshotStore {
    snapshots: Vec<Snapshot>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            snapshots: Vec::new(),
        }
    }
}

impl Default for MemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        self.snapshots.push(snapshot.clone());
        self.snapshots.sort_by_key(|s| s.seq);
        Ok(())
    }

    fn load_latest(&self) -> Result<Snapshot, SnapshotError> {
        self.snapshots.last().cloned().ok_or(SnapshotError::NotFound)
    }

    fn delete_before(&mut self, seq: SequenceNumber) -> Result<usize, SnapshotError> {
        let before = self.snapshots.len();
        self.snapshots.retain(|s| s.seq >= seq);
        Ok(before - self.snapshots.len())
    }
}

/// File-backed snapshot store: one JSON file per snapshot
///
/// Files are named `snapshot-<seq>.json`; the latest is the one with the
/// highest sequence. Writes go through a temp file and rename so a crash
/// never leaves a half-written latest snapshot.
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    fn snapshot_path(&self, seq: SequenceNumber) -> PathBuf {
        self.dir.join(format!("snapshot-{:010}.json", seq))
    }

    /// Sequence numbers of all stored snapshots, ascending.
    fn stored_seqs(&self) -> Result<Vec<SequenceNumber>, SnapshotError> {
        let mut seqs = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name().to_string_lossy().to_string();
            if let Some(seq) = name
                .strip_prefix("snapshot-")
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|digits| digits.parse::<SequenceNumber>().ok())
            {
                seqs.push(seq);
            }
        }
        seqs.sort_unstable();
        Ok(seqs)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let bytes = serde_json::to_vec(snapshot)
            .map_err(|e| SnapshotError::SaveFailed(e.to_string()))?;
        let path = self.snapshot_path(snapshot.seq);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, &bytes)?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }

    fn load_latest(&self) -> Result<Snapshot, SnapshotError> {
        let seq = *self
            .stored_seqs()?
            .last()
            .ok_or(SnapshotError::NotFound)?;
        let bytes = fs::read(self.snapshot_path(seq))?;
        serde_json::from_slice(&bytes).map_err(|e| SnapshotError::Corrupted(e.to_string()))
    }

    fn delete_before(&mut self, seq: SequenceNumber) -> Result<usize, SnapshotError> {
        let mut deleted = 0;
        for stored in self.stored_seqs()? {
            if stored < seq {
                if let Err(e) = fs::remove_file(self.snapshot_path(stored)) {
                    warn!(
                        target: "snapshot",
                        seq = stored,
                        error = %e,
                        "failed to delete old snapshot"
                    );
                } else {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }
}
