//! Memory system coordinator
//!
//! Ties the registry, store, analyzer, and composer together behind one
//! facade. Conversation flow methods degrade gracefully: personalization is
//! best effort and never blocks an exchange on a storage or analysis
//! failure.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analyzer::{AnalysisPolicy, Analyzer, ConversationProfile, RefreshReport};
use crate::compose::{style_modifiers, Composer, StyleModifiers};
use crate::config::Config;
use crate::db::DbPool;
use crate::registry::{ConnectionEvent, DeviceInfo, DeviceRegistry};
use crate::store::{ConversationRecord, ConversationStore, StoreSummary};
use crate::Result;

/// Combined view of one device's memory state
#[derive(Debug, Serialize)]
pub struct DeviceStats {
    pub device: Option<DeviceInfo>,
    pub display_name: String,
    pub summary: StoreSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ConversationProfile>,
}

/// Full offline report for one device
#[derive(Debug, Serialize)]
pub struct DeviceReport {
    pub exported_at: DateTime<Utc>,
    pub device: Option<DeviceInfo>,
    pub summary: StoreSummary,
    pub records: Vec<ConversationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ConversationProfile>,
}

/// Facade over the registry, store, analyzer, and composer
pub struct MemorySystem {
    registry: DeviceRegistry,
    store: ConversationStore,
    analyzer: Analyzer,
    composer: Composer,
    config: Config,
}

impl MemorySystem {
    /// Assemble the memory system over a shared database pool
    #[must_use]
    pub fn new(pool: DbPool, config: Config) -> Self {
        let registry = DeviceRegistry::new(pool.clone(), config.registry.clone());
        let store = ConversationStore::new(pool.clone(), config.store.clone());
        let analyzer = Analyzer::new(
            pool,
            AnalysisPolicy::with_staleness(config.analyzer.staleness_minutes),
        );
        let composer = Composer::new(config.composer.clone());

        Self {
            registry,
            store,
            analyzer,
            composer,
            config,
        }
    }

    /// Device registry
    #[must_use]
    pub const fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Conversation store
    #[must_use]
    pub const fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Profile analyzer
    #[must_use]
    pub const fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Register or update a device
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn register_device(
        &self,
        hw_addr: &str,
        name: &str,
        location: Option<&str>,
    ) -> Result<DeviceInfo> {
        self.registry.register(hw_addr, name, location)
    }

    /// Record an inbound connection, auto-registering unknown devices
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn record_connection(
        &self,
        hw_addr: &str,
        name: &str,
        client_addr: &str,
        extra: Option<serde_json::Value>,
    ) -> Result<ConnectionEvent> {
        self.registry.record_connection(hw_addr, name, client_addr, extra)
    }

    /// Store a completed exchange and opportunistically refresh the
    /// device's profile when it has gone stale.
    ///
    /// A failed refresh is logged and swallowed: the exchange itself is
    /// already durable and the profile will heal on a later pass.
    ///
    /// # Errors
    ///
    /// Returns error if storing the exchange fails
    pub fn add_exchange(
        &self,
        hw_addr: &str,
        utterance: &str,
        reply: &str,
        location: Option<&str>,
    ) -> Result<ConversationRecord> {
        let record = self.store.append(hw_addr, utterance, reply, location)?;

        match self.analyzer.is_stale(hw_addr) {
            Ok(true) => {
                if let Err(e) = self.analyzer.refresh(&self.store, hw_addr) {
                    tracing::warn!(hw_addr, error = %e, "profile refresh after exchange failed");
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(hw_addr, error = %e, "profile staleness check failed");
            }
        }

        Ok(record)
    }

    /// Personalization context block for the next reply to a device.
    ///
    /// Infallible: storage or analysis failures are logged and the block
    /// shrinks to what remains available, at minimum the identity line.
    #[must_use]
    pub fn personalized_context(
        &self,
        hw_addr: &str,
        fallback_name: &str,
        location: Option<&str>,
    ) -> String {
        let display_name = self
            .registry
            .display_name(hw_addr, fallback_name)
            .unwrap_or_else(|e| {
                tracing::warn!(hw_addr, error = %e, "display name lookup failed");
                fallback_name.to_string()
            });

        let short_term = self.store.short_term(hw_addr).unwrap_or_else(|e| {
            tracing::warn!(hw_addr, error = %e, "short-term memory read failed");
            Vec::new()
        });

        let total = self.store.count(hw_addr).unwrap_or_else(|e| {
            tracing::warn!(hw_addr, error = %e, "exchange count read failed");
            short_term.len()
        });

        // Refresh a stale profile on the way in; composition still works
        // from whatever is available when that fails
        let profile = match self.analyzer.profile(&self.store, hw_addr) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(hw_addr, error = %e, "profile unavailable for composition");
                None
            }
        };

        self.composer.compose(
            &display_name,
            &short_term,
            total,
            profile.as_ref(),
            location,
            Utc::now(),
        )
    }

    /// Combined registry, store, and profile view for one device
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn device_stats(&self, hw_addr: &str) -> Result<DeviceStats> {
        Ok(DeviceStats {
            device: self.registry.get(hw_addr)?,
            display_name: self.registry.display_name(hw_addr, "unknown")?,
            summary: self.store.summary(hw_addr)?,
            profile: self.analyzer.load(hw_addr)?,
        })
    }

    /// Human-readable observations about a device, recomputing the profile
    /// when stale
    ///
    /// # Errors
    ///
    /// Returns error if the log cannot be read or the profile cannot be
    /// written
    pub fn conversation_insights(&self, hw_addr: &str) -> Result<Vec<String>> {
        let profile = self.analyzer.profile(&self.store, hw_addr)?;
        Ok(self.composer.insights(&profile))
    }

    /// Response-shaping hints for a device, defaulting when no profile
    /// exists yet
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn device_style(&self, hw_addr: &str) -> Result<StyleModifiers> {
        Ok(self
            .analyzer
            .load(hw_addr)?
            .as_ref()
            .map_or_else(StyleModifiers::default, style_modifiers))
    }

    /// Write a full device report (identity, log, summary, profile) as one
    /// JSON document. Returns the written path.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation or file write fails
    pub fn export_device_report(&self, hw_addr: &str, path: Option<&Path>) -> Result<PathBuf> {
        let hw_addr = crate::registry::normalize_hw_addr(hw_addr);
        let now = Utc::now();

        let report = DeviceReport {
            exported_at: now,
            device: self.registry.get(&hw_addr)?,
            summary: self.store.summary(&hw_addr)?,
            records: self.store.all(&hw_addr)?,
            profile: self.analyzer.load(&hw_addr)?,
        };

        let path = path.map_or_else(
            || {
                let key = hw_addr.replace(':', "");
                self.config
                    .data_dir
                    .join(format!("report_{key}_{}.json", now.timestamp()))
            },
            Path::to_path_buf,
        );

        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        tracing::info!(hw_addr, path = %path.display(), "device report exported");

        Ok(path)
    }

    /// Recompute every device's profile now
    ///
    /// # Errors
    ///
    /// Returns error if the device list cannot be read
    pub fn refresh_profiles(&self) -> Result<RefreshReport> {
        self.analyzer.refresh_all(&self.store)
    }

    /// Spawn the periodic full-population profile refresh.
    ///
    /// Runs until the returned handle is aborted or the runtime shuts
    /// down. Sweep failures are logged, never fatal.
    #[must_use]
    pub fn spawn_refresh_task(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let system = self;
        let period = Duration::from_secs(system.config.analyzer.full_refresh_minutes * 60);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let system = Arc::clone(&system);
                let sweep =
                    tokio::task::spawn_blocking(move || system.refresh_profiles()).await;
                match sweep {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::warn!(error = %e, "scheduled profile sweep failed"),
                    Err(e) => tracing::warn!(error = %e, "scheduled profile sweep panicked"),
                }
            }
        })
    }
}
