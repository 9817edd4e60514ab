//! Conversation analyzer
//!
//! Computes per-device [`ConversationProfile`]s from the stored exchange
//! log and caches them, both in memory and as one JSON document per device
//! in the database. Profiles are derived data: losing or corrupting one
//! only costs a recomputation.

pub mod pipeline;
pub mod policy;
pub mod profile;

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::db::DbPool;
use crate::store::ConversationStore;
use crate::{Error, Result};

pub use pipeline::build_profile;
pub use policy::{AnalysisPolicy, QuestionType, TimeOfDay};
pub use profile::{ConversationProfile, InteractionStyle, PROFILE_SCHEMA_VERSION};

/// Outcome of a full-population refresh sweep
#[derive(Debug, Default)]
pub struct RefreshReport {
    /// Devices whose profile was recomputed and persisted
    pub updated: usize,

    /// Devices whose refresh failed, by key
    pub failed: Vec<String>,
}

/// Profile generator and cache over the shared database
pub struct Analyzer {
    pool: DbPool,
    policy: AnalysisPolicy,
    cache: Mutex<HashMap<String, ConversationProfile>>,
}

impl Analyzer {
    /// Create a new analyzer
    #[must_use]
    pub fn new(pool: DbPool, policy: AnalysisPolicy) -> Self {
        Self {
            pool,
            policy,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Compute a fresh profile from the device's current log without
    /// persisting it
    ///
    /// # Errors
    ///
    /// Returns error if the log cannot be read
    pub fn generate(
        &self,
        store: &ConversationStore,
        hw_addr: &str,
    ) -> Result<ConversationProfile> {
        let hw_addr = crate::registry::normalize_hw_addr(hw_addr);
        let records = store.all(&hw_addr)?;
        Ok(build_profile(&self.policy, &hw_addr, &records, Utc::now()))
    }

    /// Recompute a device's profile and persist it, replacing any prior
    /// version in full
    ///
    /// # Errors
    ///
    /// Returns error if the log cannot be read or the profile cannot be
    /// written
    pub fn refresh(
        &self,
        store: &ConversationStore,
        hw_addr: &str,
    ) -> Result<ConversationProfile> {
        let profile = self.generate(store, hw_addr)?;

        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO profiles (hw_addr, profile, updated_at)
             VALUES (?1, ?2, ?3)",
            rusqlite::params![
                profile.device_id,
                serde_json::to_string(&profile)?,
                profile.update_timestamp.to_rfc3339(),
            ],
        )?;
        drop(conn);

        tracing::debug!(
            hw_addr = %profile.device_id,
            exchanges = profile.total_exchanges,
            style = %profile.interaction_style,
            "profile refreshed"
        );

        self.cache_put(profile.clone());
        Ok(profile)
    }

    /// Load a device's persisted profile, preferring the in-memory cache.
    ///
    /// A malformed persisted document is treated as absent so that it gets
    /// recomputed rather than wedging the device.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn load(&self, hw_addr: &str) -> Result<Option<ConversationProfile>> {
        let hw_addr = crate::registry::normalize_hw_addr(hw_addr);

        if let Some(profile) = self.cache_get(&hw_addr) {
            return Ok(Some(profile));
        }

        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT profile FROM profiles WHERE hw_addr = ?1",
                [&hw_addr],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        drop(conn);

        let Some(raw) = raw else { return Ok(None) };

        match serde_json::from_str::<ConversationProfile>(&raw) {
            Ok(profile) => {
                self.cache_put(profile.clone());
                Ok(Some(profile))
            }
            Err(e) => {
                tracing::warn!(hw_addr, error = %e, "discarding malformed persisted profile");
                Ok(None)
            }
        }
    }

    /// True when the persisted profile is older than the staleness
    /// threshold or absent entirely
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn is_stale(&self, hw_addr: &str) -> Result<bool> {
        match self.load(hw_addr)? {
            Some(profile) => Ok(Utc::now() - profile.update_timestamp > self.policy.staleness),
            None => Ok(true),
        }
    }

    /// A device's profile, recomputing it first when stale or missing
    ///
    /// # Errors
    ///
    /// Returns error if the log cannot be read or the profile cannot be
    /// written
    pub fn profile(
        &self,
        store: &ConversationStore,
        hw_addr: &str,
    ) -> Result<ConversationProfile> {
        if self.is_stale(hw_addr)? {
            return self.refresh(store, hw_addr);
        }
        match self.load(hw_addr)? {
            Some(profile) => Ok(profile),
            None => self.refresh(store, hw_addr),
        }
    }

    /// Recompute profiles for every device with stored exchanges.
    ///
    /// One device failing does not stop the sweep; failures are logged and
    /// reported.
    ///
    /// # Errors
    ///
    /// Returns error if the device list cannot be read
    pub fn refresh_all(&self, store: &ConversationStore) -> Result<RefreshReport> {
        let mut report = RefreshReport::default();

        for hw_addr in store.device_ids()? {
            match self.refresh(store, &hw_addr) {
                Ok(_) => report.updated += 1,
                Err(e) => {
                    tracing::warn!(hw_addr, error = %e, "profile refresh failed");
                    report.failed.push(hw_addr);
                }
            }
        }

        tracing::info!(
            updated = report.updated,
            failed = report.failed.len(),
            "profile refresh sweep complete"
        );
        Ok(report)
    }

    fn cache_get(&self, hw_addr: &str) -> Option<ConversationProfile> {
        // A poisoned lock only means a panicked writer; the map is still usable
        let cache = self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        cache.get(hw_addr).cloned()
    }

    fn cache_put(&self, profile: ConversationProfile) {
        let mut cache = self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        cache.insert(profile.device_id.clone(), profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::db::init_memory;

    fn setup() -> (Analyzer, ConversationStore) {
        let pool = init_memory().unwrap();
        let store = ConversationStore::new(pool.clone(), StoreConfig::default());
        (Analyzer::new(pool, AnalysisPolicy::default()), store)
    }

    #[test]
    fn test_generate_without_persisting() {
        let (analyzer, store) = setup();
        let hw = "AA:BB:CC:DD:EE:FF";

        store.append(hw, "tell me about space", "sure", None).unwrap();
        let profile = analyzer.generate(&store, hw).unwrap();
        assert_eq!(profile.total_exchanges, 1);

        // Nothing was written
        assert!(analyzer.load(hw).unwrap().is_none());
    }

    #[test]
    fn test_refresh_persists_and_loads() {
        let (analyzer, store) = setup();
        let hw = "AA:BB:CC:DD:EE:FF";

        store.append(hw, "sunny today", "it is", None).unwrap();
        store.append(hw, "tell me about space", "sure", None).unwrap();
        store.append(hw, "space again please", "okay", None).unwrap();

        let refreshed = analyzer.refresh(&store, hw).unwrap();
        assert!(refreshed.favorite_topics.contains(&"space".to_string()));

        let loaded = analyzer.load(hw).unwrap().unwrap();
        assert_eq!(loaded, refreshed);
    }

    #[test]
    fn test_refresh_replaces_prior_profile() {
        let (analyzer, store) = setup();
        let hw = "AA:BB:CC:DD:EE:FF";

        store.append(hw, "sunny today", "it is", None).unwrap();
        analyzer.refresh(&store, hw).unwrap();

        store.append(hw, "tell me about space", "sure", None).unwrap();
        let second = analyzer.refresh(&store, hw).unwrap();
        assert_eq!(second.total_exchanges, 2);

        let loaded = analyzer.load(hw).unwrap().unwrap();
        assert_eq!(loaded.total_exchanges, 2);
    }

    #[test]
    fn test_missing_profile_is_stale() {
        let (analyzer, store) = setup();
        let hw = "AA:BB:CC:DD:EE:FF";

        assert!(analyzer.is_stale(hw).unwrap());

        store.append(hw, "hello", "hi", None).unwrap();
        analyzer.refresh(&store, hw).unwrap();
        assert!(!analyzer.is_stale(hw).unwrap());
    }

    #[test]
    fn test_profile_recomputes_when_missing() {
        let (analyzer, store) = setup();
        let hw = "AA:BB:CC:DD:EE:FF";

        store.append(hw, "what is a galaxy?", "a lot of stars", None).unwrap();
        let profile = analyzer.profile(&store, hw).unwrap();
        assert_eq!(profile.total_exchanges, 1);
        assert_eq!(profile.interaction_style, InteractionStyle::Inquisitive);

        // Now persisted
        assert!(analyzer.load(hw).unwrap().is_some());
    }

    #[test]
    fn test_malformed_persisted_profile_discarded() {
        let (analyzer, store) = setup();
        let hw = "AA:BB:CC:DD:EE:FF";

        store.append(hw, "hello", "hi", None).unwrap();
        {
            let conn = analyzer.pool.get().unwrap();
            conn.execute(
                "INSERT OR REPLACE INTO profiles (hw_addr, profile, updated_at)
                 VALUES (?1, 'not json', ?2)",
                rusqlite::params![hw, Utc::now().to_rfc3339()],
            )
            .unwrap();
        }

        assert!(analyzer.load(hw).unwrap().is_none());
        // And it reads as stale, so the next profile() call heals it
        assert!(analyzer.is_stale(hw).unwrap());
        let healed = analyzer.profile(&store, hw).unwrap();
        assert_eq!(healed.total_exchanges, 1);
    }

    #[test]
    fn test_refresh_all_sweeps_every_device() {
        let (analyzer, store) = setup();

        store.append("AA:AA:AA:AA:AA:01", "hello", "hi", None).unwrap();
        store.append("AA:AA:AA:AA:AA:02", "sunny today", "yes", None).unwrap();

        let report = analyzer.refresh_all(&store).unwrap();
        assert_eq!(report.updated, 2);
        assert!(report.failed.is_empty());

        assert!(analyzer.load("AA:AA:AA:AA:AA:01").unwrap().is_some());
        assert!(analyzer.load("AA:AA:AA:AA:AA:02").unwrap().is_some());
    }

    #[test]
    fn test_empty_log_profile() {
        let (analyzer, store) = setup();

        let profile = analyzer.generate(&store, "00:00:00:00:00:00").unwrap();
        assert!(profile.is_empty());
    }
}
