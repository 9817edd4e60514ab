//! Conversation store
//!
//! Append-only, size-bounded, per-device log of utterance/reply exchanges.
//! The per-device cap with FIFO eviction is an invariant: downstream
//! personalization depends on the log being a true recency window.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StoreConfig;
use crate::db::DbPool;
use crate::registry::{normalize_hw_addr, parse_datetime};
use crate::{Error, Result};

/// One completed exchange, immutable once appended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Creation time
    pub timestamp: DateTime<Utc>,

    /// Recognized user utterance
    pub utterance: String,

    /// Generated system reply
    pub reply: String,

    /// Device location at time of capture
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Summary of a device's stored conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSummary {
    pub total_count: usize,
    pub short_term_count: usize,
    pub last_record: Option<ConversationRecord>,
    /// Naive whitespace-token frequencies over all stored utterances
    pub top_terms: Vec<(String, usize)>,
}

/// Exported device history document
#[derive(Debug, Serialize, Deserialize)]
pub struct DeviceExport {
    pub hw_addr: String,
    pub exported_at: DateTime<Utc>,
    pub summary: StoreSummary,
    pub records: Vec<ConversationRecord>,
}

/// Per-device conversation log backed by the shared database
#[derive(Clone)]
pub struct ConversationStore {
    pool: DbPool,
    config: StoreConfig,
}

impl ConversationStore {
    /// Create a new conversation store
    #[must_use]
    pub const fn new(pool: DbPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Maximum retained exchanges per device
    #[must_use]
    pub const fn cap(&self) -> usize {
        self.config.max_history_per_device
    }

    /// Append a completed exchange for a device.
    ///
    /// The insert and the eviction of rows beyond the cap run in one
    /// transaction, so the read-modify-write is atomic per device.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn append(
        &self,
        hw_addr: &str,
        utterance: &str,
        reply: &str,
        location: Option<&str>,
    ) -> Result<ConversationRecord> {
        let hw_addr = normalize_hw_addr(hw_addr);
        let now = Utc::now();

        let mut conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO exchanges (hw_addr, utterance, reply, location, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![hw_addr, utterance, reply, location, now.to_rfc3339()],
        )?;

        #[allow(clippy::cast_possible_wrap)]
        let cap = self.config.max_history_per_device as i64;
        tx.execute(
            r"DELETE FROM exchanges
              WHERE hw_addr = ?1
                AND id NOT IN (
                    SELECT id FROM exchanges WHERE hw_addr = ?1 ORDER BY id DESC LIMIT ?2
                )",
            rusqlite::params![hw_addr, cap],
        )?;

        tx.commit()?;

        tracing::debug!(hw_addr, "exchange appended");

        Ok(ConversationRecord {
            timestamp: now,
            utterance: utterance.to_string(),
            reply: reply.to_string(),
            location: location.map(String::from),
        })
    }

    /// Full stored log for a device, oldest first. Unknown devices return
    /// an empty log.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn all(&self, hw_addr: &str) -> Result<Vec<ConversationRecord>> {
        let hw_addr = normalize_hw_addr(hw_addr);
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let mut stmt = conn.prepare(
            "SELECT utterance, reply, location, created_at
             FROM exchanges WHERE hw_addr = ?1 ORDER BY id ASC",
        )?;

        let records = stmt
            .query_map([&hw_addr], row_to_record)?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(records)
    }

    /// Last `count` exchanges, chronological order
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn recent(&self, hw_addr: &str, count: usize) -> Result<Vec<ConversationRecord>> {
        let mut records = self.all(hw_addr)?;
        let skip = records.len().saturating_sub(count);
        Ok(records.split_off(skip))
    }

    /// Exchanges within the trailing window, chronological order
    /// (short-term memory)
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn within_window(&self, hw_addr: &str, minutes: i64) -> Result<Vec<ConversationRecord>> {
        let cutoff = Utc::now() - chrono::Duration::minutes(minutes);
        Ok(self
            .all(hw_addr)?
            .into_iter()
            .filter(|r| r.timestamp > cutoff)
            .collect())
    }

    /// Short-term memory using the configured default window
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn short_term(&self, hw_addr: &str) -> Result<Vec<ConversationRecord>> {
        self.within_window(hw_addr, self.config.short_term_minutes)
    }

    /// Number of stored exchanges for a device
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn count(&self, hw_addr: &str) -> Result<usize> {
        let hw_addr = normalize_hw_addr(hw_addr);
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM exchanges WHERE hw_addr = ?1",
            [&hw_addr],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// All device keys with at least one stored exchange
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn device_ids(&self) -> Result<Vec<String>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT hw_addr FROM exchanges ORDER BY hw_addr ASC")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .filter_map(std::result::Result::ok)
            .collect();
        Ok(ids)
    }

    /// Summary of a device's stored conversation
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn summary(&self, hw_addr: &str) -> Result<StoreSummary> {
        let records = self.all(hw_addr)?;
        let short_term_count = self
            .within_window(hw_addr, self.config.short_term_minutes)?
            .len();

        Ok(StoreSummary {
            total_count: records.len(),
            short_term_count,
            last_record: records.last().cloned(),
            top_terms: top_terms(&records, 5),
        })
    }

    /// Export a device's identity, full log, and summary to a single JSON
    /// file for offline inspection. Returns the written path.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation or file write fails
    pub fn export(&self, hw_addr: &str, path: Option<&Path>) -> Result<PathBuf> {
        let hw_addr = normalize_hw_addr(hw_addr);
        let now = Utc::now();

        let path = path.map_or_else(
            || {
                let key = hw_addr.replace(':', "");
                PathBuf::from(format!("export_{key}_{}.json", now.timestamp()))
            },
            Path::to_path_buf,
        );

        let export = DeviceExport {
            hw_addr: hw_addr.clone(),
            exported_at: now,
            summary: self.summary(&hw_addr)?,
            records: self.all(&hw_addr)?,
        };

        std::fs::write(&path, serde_json::to_string_pretty(&export)?)?;
        tracing::info!(hw_addr, path = %path.display(), "device history exported");

        Ok(path)
    }
}

/// Naive whitespace-token frequency count over stored utterances,
/// lowercased, most frequent first (ties broken lexically)
fn top_terms(records: &[ConversationRecord], limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        for token in record.utterance.split_whitespace() {
            *counts.entry(token.to_lowercase()).or_insert(0) += 1;
        }
    }

    let mut terms: Vec<(String, usize)> = counts.into_iter().collect();
    terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    terms.truncate(limit);
    terms
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRecord> {
    Ok(ConversationRecord {
        utterance: row.get(0)?,
        reply: row.get(1)?,
        location: row.get(2)?,
        timestamp: parse_datetime(&row.get::<_, String>(3)?),
    })
}
