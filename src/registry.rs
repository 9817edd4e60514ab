//! Device registry
//!
//! Identifies physical hardware endpoints by hardware address, records
//! connection events, and computes activity statistics. The hardware
//! address alone is the durable identity key; name and location are
//! mutable display attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RegistryConfig;
use crate::db::DbPool;
use crate::{Error, Result};

/// A registered device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Canonical hardware address (uppercase)
    pub hw_addr: String,

    /// Human-assigned device name
    pub name: String,

    /// Installation location, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// First registration time
    pub first_seen: DateTime<Utc>,

    /// Most recent registration or connection time
    pub last_seen: DateTime<Utc>,

    /// Lifetime connection counter
    pub total_connections: u32,
}

/// One recorded inbound connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub timestamp: DateTime<Utc>,
    pub hw_addr: String,
    pub device_name: String,
    pub client_addr: String,
    pub extra: serde_json::Value,
}

/// A device annotated with hours since it was last seen
#[derive(Debug, Clone, Serialize)]
pub struct ActiveDevice {
    #[serde(flatten)]
    pub device: DeviceInfo,
    pub hours_ago: f64,
}

/// Registry-wide activity statistics
#[derive(Debug, Clone, Serialize)]
pub struct RegistryStats {
    pub total_registered: usize,
    pub active_last_24h: usize,
    pub active_last_7d: usize,
    pub total_connections: u64,
    pub most_active_device: Option<DeviceInfo>,
}

/// Normalize a hardware address to its canonical form.
///
/// Uppercase and trimmed; unparseable input is accepted as opaque text.
#[must_use]
pub fn normalize_hw_addr(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Short display suffix from the last 6 hex digits of a hardware address
/// (e.g. `D8:00:96`)
#[must_use]
pub fn short_suffix(hw_addr: &str) -> String {
    let tail: Vec<char> = hw_addr
        .chars()
        .filter(|c| *c != ':')
        .rev()
        .take(6)
        .collect();
    if tail.len() < 6 {
        return "??:??:??".to_string();
    }

    let mut out = String::with_capacity(8);
    for (i, c) in tail.into_iter().rev().enumerate() {
        if i == 2 || i == 4 {
            out.push(':');
        }
        out.push(c);
    }
    out
}

/// Tracks physical devices and their connection history
#[derive(Clone)]
pub struct DeviceRegistry {
    pool: DbPool,
    config: RegistryConfig,
}

impl DeviceRegistry {
    /// Create a new device registry
    #[must_use]
    pub const fn new(pool: DbPool, config: RegistryConfig) -> Self {
        Self { pool, config }
    }

    /// Register a device, or update it if already known.
    ///
    /// Unseen addresses create a record with `total_connections = 1`.
    /// Re-registration updates name and location to the latest values and
    /// increments the connection counter by exactly one.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn register(
        &self,
        hw_addr: &str,
        name: &str,
        location: Option<&str>,
    ) -> Result<DeviceInfo> {
        let hw_addr = normalize_hw_addr(hw_addr);
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let now = Utc::now();
        let now_str = now.to_rfc3339();

        conn.execute(
            r"INSERT INTO devices (hw_addr, name, location, first_seen, last_seen, total_connections)
              VALUES (?1, ?2, ?3, ?4, ?4, 1)
              ON CONFLICT(hw_addr) DO UPDATE SET
                  name = excluded.name,
                  location = excluded.location,
                  last_seen = excluded.last_seen,
                  total_connections = total_connections + 1",
            rusqlite::params![hw_addr, name, location, now_str],
        )?;

        drop(conn);
        tracing::info!(hw_addr, name, "device registered");

        self.get(&hw_addr)?
            .ok_or_else(|| Error::NotFound(format!("device {hw_addr}")))
    }

    /// Get a device by hardware address
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn get(&self, hw_addr: &str) -> Result<Option<DeviceInfo>> {
        let hw_addr = normalize_hw_addr(hw_addr);
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let result = conn.query_row(
            "SELECT hw_addr, name, location, first_seen, last_seen, total_connections
             FROM devices WHERE hw_addr = ?1",
            [&hw_addr],
            row_to_device,
        );

        match result {
            Ok(device) => Ok(Some(device)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Record an inbound connection, auto-registering unknown devices.
    ///
    /// The event history is capped; the oldest events beyond the cap are
    /// dropped in the same transaction.
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
        let hw_addr = normalize_hw_addr(hw_addr);
        let now = Utc::now();
        let extra = extra.unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));

        // One connection counts once: register() already increments for
        // unknown devices, known devices are bumped directly.
        if self.get(&hw_addr)?.is_some() {
            let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
            conn.execute(
                "UPDATE devices SET last_seen = ?1, total_connections = total_connections + 1
                 WHERE hw_addr = ?2",
                rusqlite::params![now.to_rfc3339(), hw_addr],
            )?;
        } else {
            self.register(&hw_addr, name, None)?;
        }

        let mut conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO connection_events (hw_addr, device_name, client_addr, extra, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                hw_addr,
                name,
                client_addr,
                serde_json::to_string(&extra)?,
                now.to_rfc3339()
            ],
        )?;

        #[allow(clippy::cast_possible_wrap)]
        let cap = self.config.connection_history_cap as i64;
        tx.execute(
            r"DELETE FROM connection_events
              WHERE id NOT IN (SELECT id FROM connection_events ORDER BY id DESC LIMIT ?1)",
            [cap],
        )?;

        tx.commit()?;

        tracing::debug!(hw_addr, client_addr, "connection recorded");

        Ok(ConnectionEvent {
            timestamp: now,
            hw_addr,
            device_name: name.to_string(),
            client_addr: client_addr.to_string(),
            extra,
        })
    }

    /// Number of retained connection events
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn connection_event_count(&self) -> Result<usize> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM connection_events", [], |row| {
            row.get(0)
        })?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Display name for a device: registered name, location when set, and
    /// a short suffix from the hardware address. Unregistered devices fall
    /// back to the caller-supplied name.
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn display_name(&self, hw_addr: &str, fallback_name: &str) -> Result<String> {
        let suffix = short_suffix(&normalize_hw_addr(hw_addr));

        Ok(match self.get(hw_addr)? {
            Some(device) => match device.location {
                Some(location) if !location.is_empty() => {
                    format!("{} @ {location} ({suffix})", device.name)
                }
                _ => format!("{} ({suffix})", device.name),
            },
            None => format!("{fallback_name} ({suffix})"),
        })
    }

    /// Devices seen within the trailing window, most recent first, each
    /// annotated with hours since last seen
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    #[allow(clippy::cast_precision_loss)]
    pub fn active_devices(&self, window_hours: i64) -> Result<Vec<ActiveDevice>> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;
        let now = Utc::now();
        let cutoff = now - chrono::Duration::hours(window_hours);

        let mut stmt = conn.prepare(
            "SELECT hw_addr, name, location, first_seen, last_seen, total_connections
             FROM devices ORDER BY last_seen DESC",
        )?;

        let devices: Vec<DeviceInfo> = stmt
            .query_map([], row_to_device)?
            .filter_map(std::result::Result::ok)
            .collect();

        Ok(devices
            .into_iter()
            .filter(|d| d.last_seen > cutoff)
            .map(|device| {
                let hours = (now - device.last_seen).num_seconds() as f64 / 3600.0;
                ActiveDevice {
                    device,
                    hours_ago: (hours * 10.0).round() / 10.0,
                }
            })
            .collect())
    }

    /// Registry-wide statistics
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn statistics(&self) -> Result<RegistryStats> {
        let conn = self.pool.get().map_err(|e| Error::Database(e.to_string()))?;

        let total_registered: i64 =
            conn.query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0))?;
        let total_connections: i64 = conn.query_row(
            "SELECT COALESCE(SUM(total_connections), 0) FROM devices",
            [],
            |row| row.get(0),
        )?;

        let most_active = conn
            .query_row(
                "SELECT hw_addr, name, location, first_seen, last_seen, total_connections
                 FROM devices ORDER BY total_connections DESC, hw_addr ASC LIMIT 1",
                [],
                row_to_device,
            )
            .ok();

        drop(conn);

        Ok(RegistryStats {
            total_registered: usize::try_from(total_registered).unwrap_or(0),
            active_last_24h: self.active_devices(24)?.len(),
            active_last_7d: self.active_devices(24 * 7)?.len(),
            total_connections: u64::try_from(total_connections).unwrap_or(0),
            most_active_device: most_active,
        })
    }
}

fn row_to_device(row: &rusqlite::Row<'_>) -> rusqlite::Result<DeviceInfo> {
    Ok(DeviceInfo {
        hw_addr: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        first_seen: parse_datetime(&row.get::<_, String>(3)?),
        last_seen: parse_datetime(&row.get::<_, String>(4)?),
        total_connections: u32::try_from(row.get::<_, i64>(5)?).unwrap_or(0),
    })
}

pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
