//! Persisted snapshot format and stores.
//!
//! A snapshot is the whole tree plus the investment amount, written as one
//! JSON document:
//!
//! ```json
//! { "pies": [ { "name": "Stocks", "target": 100, "holdings": [ ... ] } ],
//!   "investmentAmount": 1000.0,
//!   "savedAt": "2025-01-02T10:00:00Z" }
//! ```
//!
//! A bare array of pies (the older layout) is still accepted on load.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use pie_common::{Result, ResultExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::tree::Portfolio;

/// Everything that survives between sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(rename = "pies", default)]
    pub portfolio: Portfolio,
    /// Absent in old snapshots; callers fall back to their configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(portfolio: Portfolio, investment_amount: f64) -> Self {
        Self {
            portfolio,
            investment_amount: Some(investment_amount),
            saved_at: None,
        }
    }

    /// Parse either layout. A document starting with `[` is the legacy bare
    /// array of pies; anything else must be the current object.
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim_start().starts_with('[') {
            let portfolio: Portfolio = serde_json::from_str(json)?;
            debug!(pies = portfolio.pies.len(), "Loaded legacy snapshot layout");
            return Ok(Self {
                portfolio,
                ..Default::default()
            });
        }
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// Stores
// ============================================================================

/// Where snapshots are kept. The core never calls this on its own; front
/// ends load once at start and save after every mutating operation.
pub trait SnapshotStore {
    /// Load the stored snapshot. Nothing stored yet means an empty snapshot.
    fn load(&self) -> Result<Snapshot>;

    fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Snapshot kept as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No snapshot yet, starting blank");
            return Ok(Snapshot::default());
        }

        let content = fs::read_to_string(&self.path)
            .context(format!("Failed to read snapshot {}", self.path.display()))?;
        Snapshot::from_json(&content)
            .context(format!("Failed to parse snapshot {}", self.path.display()))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir)
                    .context(format!("Failed to create directory {}", dir.display()))?;
            }
        }

        // Write-then-rename so a crash never leaves half a snapshot.
        let tmp = self.temp_path();
        fs::write(&tmp, snapshot.to_json()?)
            .context(format!("Failed to write snapshot {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .context(format!("Failed to replace snapshot {}", self.path.display()))?;

        info!(
            path = %self.path.display(),
            pies = snapshot.portfolio.pies.len(),
            "Saved snapshot"
        );
        Ok(())
    }
}

/// In-memory store holding the serialized JSON, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    json: RefCell<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with raw JSON, e.g. an old snapshot.
    pub fn with_json(json: impl Into<String>) -> Self {
        Self {
            json: RefCell::new(Some(json.into())),
        }
    }

    /// The last JSON written.
    pub fn raw(&self) -> Option<String> {
        self.json.borrow().clone()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Snapshot> {
        match self.json.borrow().as_deref() {
            Some(json) => Snapshot::from_json(json),
            None => Ok(Snapshot::default()),
        }
    }

    fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.json.borrow_mut() = Some(snapshot.to_json()?);
        Ok(())
    }
}
