//! Release state store: `releases.json`, append-only,
//! guarded by an advisory `fs2` lock and cached in memory for
//! read-after-write.
//!
//! Stored as newline-delimited JSON (one compact record per line) rather
//! than a single pretty-printed array: appending a record then means every
//! prior line's bytes are untouched, so the file's suffix changes only by
//! appended records and all prior records stay byte-identical, directly
//! instead of via incidental formatting luck.

use std::io::Read;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::devtopology::atomic::write_atomic;
use crate::error::{StagecraftError, StateError};
use crate::plan::types::ReleaseRecord;

pub struct ReleaseStore {
    path: PathBuf,
    lock_path: PathBuf,
    cache: Vec<ReleaseRecord>,
}

impl ReleaseStore {
    /// Loads `releases.json` from `dir`, or starts empty if it doesn't
    /// exist yet.
    pub fn open(dir: &Path) -> Result<Self, StagecraftError> {
        let path = dir.join("releases.json");
        let lock_path = dir.join("releases.lock");
        let cache = if path.exists() {
            read_records(&path)?
        } else {
            Vec::new()
        };
        Ok(ReleaseStore {
            path,
            lock_path,
            cache,
        })
    }

    /// All records for every environment, in append order.
    pub fn records(&self) -> &[ReleaseRecord] {
        &self.cache
    }

    /// Records scoped to one environment, in append order.
    pub fn records_for(&self, env: &str) -> Vec<&ReleaseRecord> {
        self.cache.iter().filter(|r| r.env == env).collect()
    }

    /// Appends `record`, acquiring the advisory lock for the write and
    /// refreshing the in-memory cache from the bytes just persisted —
    /// never re-reading from disk, so a read immediately after observes
    /// the new record within this process.
    pub fn append(&mut self, record: ReleaseRecord) -> Result<(), StagecraftError> {
        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| io_write_err(&self.lock_path, e))?;
        lock_file.lock_exclusive().map_err(|_| {
            StagecraftError::State(StateError::Locked {
                path: self.lock_path.display().to_string(),
                attempts: 1,
            })
        })?;

        let mut existing_bytes = if self.path.exists() {
            std::fs::read(&self.path).map_err(|e| StagecraftError::State(StateError::Read {
                path: self.path.display().to_string(),
                source: e,
            }))?
        } else {
            Vec::new()
        };

        let line = serde_json::to_string(&record).map_err(|e| {
            StagecraftError::State(StateError::Write {
                path: self.path.display().to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            })
        })?;
        existing_bytes.extend_from_slice(line.as_bytes());
        existing_bytes.push(b'\n');

        write_atomic(&self.path, &existing_bytes)?;
        self.cache.push(record);

        lock_file.unlock().ok();
        Ok(())
    }

    pub fn next_id(&self) -> u64 {
        self.cache.iter().map(|r| r.id).max().unwrap_or(0) + 1
    }
}

fn read_records(path: &Path) -> Result<Vec<ReleaseRecord>, StagecraftError> {
    let mut f = std::fs::File::open(path).map_err(|e| StagecraftError::State(StateError::Read {
        path: path.display().to_string(),
        source: e,
    }))?;
    let mut buf = String::new();
    f.read_to_string(&mut buf).map_err(|e| {
        StagecraftError::State(StateError::Read {
            path: path.display().to_string(),
            source: e,
        })
    })?;
    buf.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            serde_json::from_str(l).map_err(|e| {
                StagecraftError::State(StateError::Corrupt {
                    path: path.display().to_string(),
                    source: e,
                })
            })
        })
        .collect()
}

fn io_write_err(path: &Path, source: std::io::Error) -> StagecraftError {
    StagecraftError::State(StateError::Write {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::types::ReleaseOutcome;

    fn sample(id: u64, env: &str) -> ReleaseRecord {
        ReleaseRecord {
            id,
            env: env.to_string(),
            version: "1.0.0".to_string(),
            started_at: "2026-01-01T00:00:00Z".to_string(),
            finished_at: Some("2026-01-01T00:01:00Z".to_string()),
            phases: vec![],
            outcome: ReleaseOutcome::Succeeded,
            rolled_back_from: None,
            note: None,
        }
    }

    #[test]
    fn append_is_read_after_write_within_process() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ReleaseStore::open(dir.path()).unwrap();
        store.append(sample(1, "staging")).unwrap();
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.records_for("staging").len(), 1);
    }

    #[test]
    fn prior_records_are_byte_preserved_across_appends() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ReleaseStore::open(dir.path()).unwrap();
        store.append(sample(1, "staging")).unwrap();
        let first_bytes = std::fs::read(dir.path().join("releases.json")).unwrap();

        store.append(sample(2, "staging")).unwrap();
        let second_bytes = std::fs::read(dir.path().join("releases.json")).unwrap();

        assert!(second_bytes.starts_with(&first_bytes));
    }

    #[test]
    fn next_id_increments_from_max_existing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ReleaseStore::open(dir.path()).unwrap();
        assert_eq!(store.next_id(), 1);
        store.append(sample(1, "staging")).unwrap();
        assert_eq!(store.next_id(), 2);
    }
}
