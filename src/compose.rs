//! Personalization composer
//!
//! Turns a device's identity, short-term memory, and profile into a plain
//! text context block for prompt injection. Composition is pure and
//! infallible: with nothing else available the output is still the device
//! identity line.

use std::fmt::Write as _;

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;

use crate::analyzer::{ConversationProfile, InteractionStyle, TimeOfDay};
use crate::config::ComposerConfig;
use crate::store::ConversationRecord;

/// Response-shaping hints derived from a profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StyleModifiers {
    pub response_length: &'static str,
    pub formality: &'static str,
    pub emotion_level: &'static str,
    pub detail_level: &'static str,
}

impl Default for StyleModifiers {
    fn default() -> Self {
        Self {
            response_length: "medium",
            formality: "relaxed",
            emotion_level: "moderate",
            detail_level: "moderate",
        }
    }
}

/// Pure text composer over identity, short-term memory, and profile
#[derive(Debug, Clone)]
pub struct Composer {
    config: ComposerConfig,
}

impl Composer {
    /// Create a new composer
    #[must_use]
    pub const fn new(config: ComposerConfig) -> Self {
        Self { config }
    }

    /// Build the personalization context block.
    ///
    /// Every section beyond the identity line is optional and appears only
    /// when its inputs carry signal.
    #[must_use]
    pub fn compose(
        &self,
        display_name: &str,
        short_term: &[ConversationRecord],
        total_exchanges: usize,
        profile: Option<&ConversationProfile>,
        location: Option<&str>,
        now: DateTime<Utc>,
    ) -> String {
        let mut out = format!("Device: {display_name}\n");

        let _ = writeln!(out, "{}", self.familiarity_line(total_exchanges));

        if !short_term.is_empty() {
            out.push_str("Moments ago in this conversation:\n");
            let skip = short_term
                .len()
                .saturating_sub(self.config.max_recent_exchanges);
            for record in short_term.iter().skip(skip) {
                let _ = writeln!(
                    out,
                    "- They said \"{}\" and you replied \"{}\"",
                    self.snippet(&record.utterance),
                    self.snippet(&record.reply),
                );
            }
        }

        if let Some(profile) = profile.filter(|p| !p.is_empty()) {
            if !profile.favorite_topics.is_empty() {
                let top: Vec<&str> = profile
                    .favorite_topics
                    .iter()
                    .take(3)
                    .map(String::as_str)
                    .collect();
                let _ = writeln!(out, "Favorite topics: {}", top.join(", "));
            }

            if profile.peak_hours.contains(&now.hour()) {
                out.push_str("This is one of their usual chat hours.\n");
            }

            let bucket = TimeOfDay::from_hour(now.hour()).as_str();
            if let Some(topics) = profile
                .topics_by_time_of_day
                .get(bucket)
                .filter(|t| !t.is_empty())
            {
                let _ = writeln!(
                    out,
                    "Around this time of day they often mention: {}",
                    topics.join(", ")
                );
            }

            if let Some(topics) = location
                .and_then(|l| profile.topics_by_location.get(l))
                .filter(|t| !t.is_empty())
            {
                let _ = writeln!(out, "In this spot they often mention: {}", topics.join(", "));
            }

            let _ = writeln!(out, "{}", style_hint(profile.interaction_style));
        }

        out
    }

    /// Human-readable observations about a device's habits
    #[must_use]
    pub fn insights(&self, profile: &ConversationProfile) -> Vec<String> {
        if profile.is_empty() {
            return vec!["No conversations recorded yet.".to_string()];
        }

        let mut lines = Vec::new();

        lines.push(format!(
            "{} exchanges on record, about {} per day.",
            profile.total_exchanges, profile.average_exchanges_per_day
        ));

        if let Some(topic) = profile.favorite_topics.first() {
            lines.push(format!("Talks about {topic} more than anything else."));
        }

        if let Some(hour) = profile.peak_hours.first() {
            lines.push(format!("Most active around {hour}:00."));
        }

        let questions = profile.question_count();
        if questions > 0 {
            lines.push(format!("Asked {questions} questions so far."));
        }

        if let Some(greeting) = profile.common_greetings.first() {
            lines.push(format!("Usually opens with \"{greeting}\"."));
        }

        lines.push(format!(
            "Overall interaction style: {}.",
            profile.interaction_style
        ));

        lines
    }

    /// Familiarity tier for a device by total exchange count
    fn familiarity_line(&self, total_exchanges: usize) -> String {
        if total_exchanges > self.config.regular_threshold {
            format!("A regular: {total_exchanges} conversations so far. Talk like an old friend.")
        } else if total_exchanges > self.config.familiar_threshold {
            format!("Getting familiar: {total_exchanges} conversations so far.")
        } else {
            "A newcomer. Be welcoming and keep things simple.".to_string()
        }
    }

    /// Truncate to the configured budget on a char boundary
    fn snippet(&self, text: &str) -> String {
        if text.chars().count() <= self.config.snippet_chars {
            return text.to_string();
        }
        let cut: String = text.chars().take(self.config.snippet_chars).collect();
        format!("{cut}...")
    }
}

/// One-line guidance per interaction style
const fn style_hint(style: InteractionStyle) -> &'static str {
    match style {
        InteractionStyle::Cheerful => "Match their upbeat energy.",
        InteractionStyle::Inquisitive => "They ask lots of questions. Answer with substance.",
        InteractionStyle::Chatty => "They enjoy long conversations. Feel free to elaborate.",
        InteractionStyle::Casual => "Keep it relaxed and friendly.",
    }
}

/// Response-shaping knobs for a profile
#[must_use]
pub fn style_modifiers(profile: &ConversationProfile) -> StyleModifiers {
    let mut modifiers = StyleModifiers::default();

    match profile.interaction_style {
        InteractionStyle::Chatty => modifiers.response_length = "long",
        InteractionStyle::Casual => modifiers.response_length = "short",
        InteractionStyle::Cheerful | InteractionStyle::Inquisitive => {}
    }

    if profile.interaction_style == InteractionStyle::Cheerful {
        modifiers.emotion_level = "high";
    }

    if profile.interaction_style == InteractionStyle::Inquisitive {
        modifiers.detail_level = "high";
    }

    if profile.average_utterance_length > 60.0 {
        modifiers.formality = "conversational";
    }

    modifiers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{build_profile, AnalysisPolicy};

    fn composer() -> Composer {
        Composer::new(ComposerConfig::default())
    }

    fn record(utterance: &str, reply: &str) -> ConversationRecord {
        ConversationRecord {
            timestamp: Utc::now(),
            utterance: utterance.to_string(),
            reply: reply.to_string(),
            location: None,
        }
    }

    #[test]
    fn test_minimum_output_is_identity_line() {
        let out = composer().compose("Luna @ 1F (D8:00:96)", &[], 0, None, None, Utc::now());
        assert!(out.starts_with("Device: Luna @ 1F (D8:00:96)\n"));
        assert!(out.contains("newcomer"));
    }

    #[test]
    fn test_familiarity_tiers() {
        let c = composer();
        assert!(c.familiarity_line(3).contains("newcomer"));
        assert!(c.familiarity_line(6).contains("Getting familiar"));
        assert!(c.familiarity_line(21).contains("regular"));
        // Boundaries are exclusive
        assert!(c.familiarity_line(5).contains("newcomer"));
        assert!(c.familiarity_line(20).contains("Getting familiar"));
    }

    #[test]
    fn test_recent_exchanges_capped_and_truncated() {
        let c = composer();
        let long = "x".repeat(80);
        let records = vec![
            record("one", "ok"),
            record("two", "ok"),
            record("three", "ok"),
            record(&long, "ok"),
        ];

        let out = c.compose("Luna (D8:00:96)", &records, 4, None, None, Utc::now());
        // Only the last three appear
        assert!(!out.contains("\"one\""));
        assert!(out.contains("\"two\""));
        assert!(out.contains(&format!("\"{}...\"", "x".repeat(50))));
    }

    #[test]
    fn test_snippet_char_boundary() {
        let c = composer();
        let emoji = "\u{1f600}".repeat(60);
        let snippet = c.snippet(&emoji);
        assert_eq!(snippet.chars().count(), 53);
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn test_profile_sections() {
        let c = composer();
        let policy = AnalysisPolicy::default();
        let now = Utc::now();
        let records = vec![
            record("tell me about space", "sure"),
            record("space again please", "okay"),
        ];
        let profile = build_profile(&policy, "AA:BB:CC:DD:EE:FF", &records, now);

        let out = c.compose(
            "Luna (D8:00:96)",
            &[],
            2,
            Some(&profile),
            None,
            now,
        );
        assert!(out.contains("Favorite topics: "));
        assert!(out.contains("space"));
    }

    #[test]
    fn test_empty_profile_adds_nothing() {
        let c = composer();
        let now = Utc::now();
        let profile = ConversationProfile::empty("AA:BB:CC:DD:EE:FF", now);

        let out = c.compose("Luna (D8:00:96)", &[], 0, Some(&profile), None, now);
        assert!(!out.contains("Favorite topics"));
        assert!(!out.contains("Keep it relaxed"));
    }

    #[test]
    fn test_insights_empty_profile() {
        let c = composer();
        let insights = c.insights(&ConversationProfile::empty("AA:BB:CC:DD:EE:FF", Utc::now()));
        assert_eq!(insights, vec!["No conversations recorded yet.".to_string()]);
    }

    #[test]
    fn test_insights_cover_habits() {
        let c = composer();
        let policy = AnalysisPolicy::default();
        let now = Utc::now();
        let records = vec![
            record("good morning", "morning!"),
            record("what is a star?", "a sun far away"),
            record("tell me about space", "sure"),
        ];
        let profile = build_profile(&policy, "AA:BB:CC:DD:EE:FF", &records, now);

        let insights = c.insights(&profile);
        assert!(insights.iter().any(|l| l.contains("3 exchanges")));
        assert!(insights.iter().any(|l| l.contains("questions")));
        assert!(insights.iter().any(|l| l.contains("interaction style")));
    }

    #[test]
    fn test_style_modifiers() {
        let mut profile = ConversationProfile::empty("AA:BB:CC:DD:EE:FF", Utc::now());

        profile.interaction_style = InteractionStyle::Chatty;
        assert_eq!(style_modifiers(&profile).response_length, "long");

        profile.interaction_style = InteractionStyle::Cheerful;
        assert_eq!(style_modifiers(&profile).emotion_level, "high");

        profile.interaction_style = InteractionStyle::Inquisitive;
        assert_eq!(style_modifiers(&profile).detail_level, "high");

        profile.interaction_style = InteractionStyle::Casual;
        profile.average_utterance_length = 70.0;
        let modifiers = style_modifiers(&profile);
        assert_eq!(modifiers.response_length, "short");
        assert_eq!(modifiers.formality, "conversational");
    }
}
