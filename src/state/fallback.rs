use chrono::{DateTime, TimeDelta, Utc};
use livescore_api::MatchRecord;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

pub const DEFAULT_STORE_FILE: &str = "livescore-fallback.json";

/// Last-known-good copy of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMatch {
    pub record: MatchRecord,
    pub captured_at: DateTime<Utc>,
}

/// On-disk shape. Entries are sorted so the file diffs cleanly.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    entries: BTreeMap<String, StoredMatch>,
}

/// When a stored entry stops being served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Staleness {
    #[default]
    Never,
    MaxAge(TimeDelta),
}

impl Staleness {
    fn is_stale(&self, captured_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            Staleness::Never => false,
            Staleness::MaxAge(max) => now - captured_at > *max,
        }
    }
}

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error, PathBuf),
    Json(serde_json::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e, path) => write!(f, "I/O error on {}: {e}", path.display()),
            StoreError::Json(e) => write!(f, "Serialization error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Id → last-known-good record cache, optionally backed by a JSON file.
///
/// The in-memory map is authoritative for the session; the file only carries
/// it across restarts. Nothing is evicted.
#[derive(Debug, Default)]
pub struct FallbackStore {
    path: Option<PathBuf>,
    entries: HashMap<String, StoredMatch>,
    staleness: Staleness,
}

impl FallbackStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A store persisted at `path`. Nothing is read until [`load_all`](Self::load_all).
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: Some(path.into()), ..Self::default() }
    }

    pub fn with_staleness(mut self, staleness: Staleness) -> Self {
        self.staleness = staleness;
        self
    }

    /// Replace the in-memory entries with the persisted ones. A missing or
    /// unreadable file leaves the store empty. Returns the number loaded.
    pub fn load_all(&mut self) -> usize {
        self.entries.clear();
        let Some(path) = self.path.as_deref() else {
            return 0;
        };

        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no fallback store at {}", path.display());
                return 0;
            }
            Err(e) => {
                warn!("ignoring unreadable fallback store {}: {e}", path.display());
                return 0;
            }
        };

        match serde_json::from_slice::<Snapshot>(&raw) {
            Ok(snapshot) => {
                self.entries = snapshot.entries.into_iter().collect();
                info!("loaded {} fallback entries from {}", self.entries.len(), path.display());
                self.entries.len()
            }
            Err(e) => {
                warn!("ignoring corrupt fallback store {}: {e}", path.display());
                0
            }
        }
    }

    /// Write every entry to disk through a temp file and rename, so a crash
    /// mid-write leaves the previous snapshot intact.
    pub fn persist_all(&self) -> Result<(), StoreError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };
        let snapshot = Snapshot {
            saved_at: Some(Utc::now()),
            entries: self.entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        };
        let json = serde_json::to_vec_pretty(&snapshot).map_err(StoreError::Json)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io(e, parent.to_path_buf()))?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| StoreError::Io(e, tmp.clone()))?;
        fs::rename(&tmp, path).map_err(|e| StoreError::Io(e, path.to_path_buf()))?;
        debug!("persisted {} fallback entries", self.entries.len());
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&StoredMatch> {
        self.get_at(id, Utc::now())
    }

    /// Entry for `id` unless it is stale at `now`.
    pub fn get_at(&self, id: &str, now: DateTime<Utc>) -> Option<&StoredMatch> {
        self.entries
            .get(id)
            .filter(|entry| !self.staleness.is_stale(entry.captured_at, now))
    }

    /// Store `record` under its own id, replacing any previous entry.
    pub fn put(&mut self, record: MatchRecord) {
        self.put_at(record, Utc::now());
    }

    pub fn put_at(&mut self, record: MatchRecord, captured_at: DateTime<Utc>) {
        self.entries
            .insert(record.id.clone(), StoredMatch { record, captured_at });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
