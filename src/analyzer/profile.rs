//! Derived conversation profile for one device
//!
//! A profile is a pure function of the device's stored exchange log at the
//! time of computation: no hidden state, fully reproducible, safely
//! discarded and rebuilt at any time.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version tag written into persisted profiles
pub const PROFILE_SCHEMA_VERSION: u32 = 1;

/// Categorical label summarizing a device's conversational tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionStyle {
    /// Positive sentiment dominates
    Cheerful,
    /// Questions dominate
    Inquisitive,
    /// High exchange volume
    Chatty,
    /// Everything else
    #[default]
    Casual,
}

impl InteractionStyle {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cheerful => "cheerful",
            Self::Inquisitive => "inquisitive",
            Self::Chatty => "chatty",
            Self::Casual => "casual",
        }
    }
}

impl std::fmt::Display for InteractionStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Recomputable statistics for one device.
///
/// Maps are `BTreeMap` so that serialization order, and therefore the
/// persisted document, is deterministic for a given log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationProfile {
    /// Device key this profile was computed for
    pub device_id: String,

    /// Persisted-document version tag
    pub schema_version: u32,

    /// When this profile was computed
    pub update_timestamp: DateTime<Utc>,

    pub total_exchanges: usize,
    pub first_exchange: Option<DateTime<Utc>>,
    pub last_exchange: Option<DateTime<Utc>>,

    /// Ranked topic list, most frequent first
    pub favorite_topics: Vec<String>,
    pub topic_frequencies: BTreeMap<String, u32>,
    /// Most frequent extracted keywords
    pub keyword_cloud: BTreeMap<String, u32>,

    /// Exchange count per hour of day (0-23)
    pub hourly_distribution: BTreeMap<u32, u32>,
    /// Exchange count per weekday name
    pub weekday_distribution: BTreeMap<String, u32>,
    /// Top hours by exchange count
    pub peak_hours: Vec<u32>,
    pub average_exchanges_per_day: f64,

    /// Most frequent distinct greeting phrases
    pub common_greetings: Vec<String>,
    /// Question count per question word category
    pub question_types: BTreeMap<String, u32>,
    pub average_utterance_length: f64,
    /// Distinct naive tokens across all utterances
    pub vocabulary_size: usize,

    /// Sentiment class -> share of classified hits, in percent
    pub sentiment_distribution: BTreeMap<String, f64>,
    pub interaction_style: InteractionStyle,

    /// Top keywords per device location
    pub topics_by_location: BTreeMap<String, Vec<String>>,
    /// Top keywords per time-of-day bucket
    pub topics_by_time_of_day: BTreeMap<String, Vec<String>>,
}

impl ConversationProfile {
    /// Well-defined sentinel for a device with zero stored exchanges
    #[must_use]
    pub fn empty(device_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            device_id: device_id.to_string(),
            schema_version: PROFILE_SCHEMA_VERSION,
            update_timestamp: now,
            total_exchanges: 0,
            first_exchange: None,
            last_exchange: None,
            favorite_topics: Vec::new(),
            topic_frequencies: BTreeMap::new(),
            keyword_cloud: BTreeMap::new(),
            hourly_distribution: BTreeMap::new(),
            weekday_distribution: BTreeMap::new(),
            peak_hours: Vec::new(),
            average_exchanges_per_day: 0.0,
            common_greetings: Vec::new(),
            question_types: BTreeMap::new(),
            average_utterance_length: 0.0,
            vocabulary_size: 0,
            sentiment_distribution: BTreeMap::new(),
            interaction_style: InteractionStyle::Casual,
            topics_by_location: BTreeMap::new(),
            topics_by_time_of_day: BTreeMap::new(),
        }
    }

    /// True when no exchanges backed this profile
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total_exchanges == 0
    }

    /// Total classified questions across all categories
    #[must_use]
    pub fn question_count(&self) -> u32 {
        self.question_types.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_profile_sentinel() {
        let profile = ConversationProfile::empty("AA:BB:CC:DD:EE:FF", Utc::now());
        assert!(profile.is_empty());
        assert_eq!(profile.total_exchanges, 0);
        assert_eq!(profile.average_exchanges_per_day, 0.0);
        assert_eq!(profile.interaction_style, InteractionStyle::Casual);
        assert!(profile.first_exchange.is_none());
    }

    #[test]
    fn test_profile_serde_round_trip() {
        let mut profile = ConversationProfile::empty("AA:BB:CC:DD:EE:FF", Utc::now());
        profile.favorite_topics = vec!["space".to_string()];
        profile.topic_frequencies.insert("space".to_string(), 2);
        profile.hourly_distribution.insert(9, 3);
        profile.interaction_style = InteractionStyle::Inquisitive;

        let json = serde_json::to_string(&profile).unwrap();
        let parsed: ConversationProfile = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, profile);
        assert!(json.contains("\"inquisitive\""));
    }
}
