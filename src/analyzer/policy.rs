//! Analysis policy: keyword tables and thresholds
//!
//! All matching is naive substring search over fixed dictionaries. That is
//! deliberate: the profiles feed prompt personalization, not search, and
//! the literal matching semantics (including double-counting across
//! overlapping lists) are part of the contract.

use chrono::Duration;

/// Question word categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionType {
    What,
    When,
    Where,
    Why,
    How,
    Who,
}

impl QuestionType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::What => "what",
            Self::When => "when",
            Self::Where => "where",
            Self::Why => "why",
            Self::How => "how",
            Self::Who => "who",
        }
    }
}

/// Four-way time-of-day bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Bucket for an hour-of-day: morning 05-12, afternoon 12-17,
    /// evening 17-21, night otherwise
    #[must_use]
    pub const fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=20 => Self::Evening,
            _ => Self::Night,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Keyword tables and thresholds driving profile computation.
///
/// Ordered vectors, not maps, so that iteration order and therefore the
/// computed profile are deterministic.
#[derive(Debug, Clone)]
pub struct AnalysisPolicy {
    /// Topic name -> keywords matched by substring search
    pub topic_keywords: Vec<(&'static str, Vec<&'static str>)>,

    /// Sentiment class -> keywords. Lists are independent: one utterance
    /// may count toward several classes.
    pub sentiment_keywords: Vec<(&'static str, Vec<&'static str>)>,

    /// Greeting patterns matched by substring search
    pub greeting_patterns: Vec<&'static str>,

    /// Question type -> marker words
    pub question_markers: Vec<(QuestionType, Vec<&'static str>)>,

    /// Positive-sentiment share (percent) above which a device reads as
    /// cheerful
    pub cheerful_positive_pct: f64,

    /// Exchange count above which a device reads as chatty
    pub chatty_min_exchanges: usize,

    /// Ranked topics kept in the profile
    pub top_topics: usize,

    /// Peak hours kept in the profile
    pub peak_hours: usize,

    /// Keyword-cloud entries kept in the profile
    pub keyword_cloud_size: usize,

    /// Topics kept per location/time bucket
    pub bucket_topics: usize,

    /// Distinct greeting phrases kept in the profile
    pub common_greetings: usize,

    /// Age after which a persisted profile is considered stale
    pub staleness: Duration,
}

impl Default for AnalysisPolicy {
    fn default() -> Self {
        Self {
            topic_keywords: vec![
                ("space", vec!["space", "star", "planet", "galaxy", "rocket", "astronaut"]),
                ("adventure", vec!["adventure", "explore", "journey", "challenge", "discover"]),
                ("food", vec!["food", "eat", "cook", "meal", "snack", "hungry", "delicious"]),
                ("weather", vec!["weather", "sunny", "rain", "cloud", "hot", "cold", "storm"]),
                ("greeting", vec!["hello", "hi ", "good morning", "good evening", "thanks", "goodbye"]),
                ("question", vec!["what", "when", "where", "why", "how", "tell me"]),
                ("emotion", vec!["happy", "fun", "sad", "scared", "love", "hate", "excited"]),
                ("time", vec!["today", "tomorrow", "yesterday", "morning", "night", "o'clock"]),
                ("place", vec!["here", "there", "home", "room", "outside", "garden"]),
                ("device", vec!["esp32", "robot", "speaker", "microphone", "button"]),
            ],
            sentiment_keywords: vec![
                ("positive", vec!["happy", "fun", "thanks", "great", "good", "love", "awesome", "nice"]),
                ("negative", vec!["sad", "tired", "hate", "bad", "scared", "worried", "awful"]),
                ("neutral", vec!["okay", "i see", "sure", "alright", "fine"]),
            ],
            greeting_patterns: vec![
                "good morning",
                "good evening",
                "good night",
                "hello",
                "hi there",
                "hey",
                "how are you",
            ],
            question_markers: vec![
                (QuestionType::What, vec!["what", "which"]),
                (QuestionType::When, vec!["when", "what time"]),
                (QuestionType::Where, vec!["where"]),
                (QuestionType::Why, vec!["why"]),
                (QuestionType::How, vec!["how"]),
                (QuestionType::Who, vec!["who", "whose"]),
            ],
            cheerful_positive_pct: 60.0,
            chatty_min_exchanges: 20,
            top_topics: 5,
            peak_hours: 3,
            keyword_cloud_size: 20,
            bucket_topics: 3,
            common_greetings: 3,
            staleness: Duration::minutes(30),
        }
    }
}

impl AnalysisPolicy {
    /// Build a policy with a custom staleness threshold, keeping default
    /// keyword tables
    #[must_use]
    pub fn with_staleness(minutes: i64) -> Self {
        Self {
            staleness: Duration::minutes(minutes),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_of_day_buckets() {
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(11), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(16), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(20), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(21), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(4), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(0), TimeOfDay::Night);
    }

    #[test]
    fn test_default_policy_topics() {
        let policy = AnalysisPolicy::default();
        assert_eq!(policy.topic_keywords.len(), 10);
        assert_eq!(policy.topic_keywords[0].0, "space");
        assert_eq!(policy.sentiment_keywords.len(), 3);
    }
}
