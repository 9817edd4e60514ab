//! Hearth - Per-device conversational memory for voice assistants
//!
//! This library provides the memory subsystem behind a fleet of small
//! voice-assistant endpoints:
//! - Device registry (identity by hardware address, connection tracking)
//! - Conversation store (capped per-device exchange logs)
//! - Conversation analyzer (derived per-device profiles)
//! - Personalization composer (prompt context from identity + memory)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  MemorySystem                        │
//! └──────┬───────────┬──────────────┬───────────┬───────┘
//!        │           │              │           │
//! ┌──────▼─────┐ ┌───▼─────────┐ ┌──▼────────┐ ┌▼─────────┐
//! │  Registry  │ │    Store    │ │ Analyzer  │ │ Composer │
//! │  devices   │ │  exchanges  │ │ profiles  │ │  (pure)  │
//! └──────┬─────┘ └───┬─────────┘ └──┬────────┘ └──────────┘
//!        │           │              │
//! ┌──────▼───────────▼──────────────▼───────────────────┐
//! │                SQLite (shared pool)                  │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod analyzer;
pub mod compose;
pub mod config;
pub mod db;
pub mod error;
pub mod registry;
pub mod store;
pub mod system;

pub use analyzer::{
    AnalysisPolicy, Analyzer, ConversationProfile, InteractionStyle, QuestionType, RefreshReport,
    TimeOfDay,
};
pub use compose::{style_modifiers, Composer, StyleModifiers};
pub use config::Config;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use registry::{
    normalize_hw_addr, short_suffix, ActiveDevice, ConnectionEvent, DeviceInfo, DeviceRegistry,
    RegistryStats,
};
pub use store::{ConversationRecord, ConversationStore, DeviceExport, StoreSummary};
pub use system::{DeviceReport, DeviceStats, MemorySystem};
