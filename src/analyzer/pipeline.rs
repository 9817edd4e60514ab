//! Pure profile computation over a device's exchange log
//!
//! Every function here is deterministic given the records and the policy:
//! equal logs produce structurally equal profiles.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::analyzer::policy::{AnalysisPolicy, TimeOfDay};
use crate::analyzer::profile::{ConversationProfile, InteractionStyle, PROFILE_SCHEMA_VERSION};
use crate::store::ConversationRecord;

/// Compute a full profile for a device from its stored log.
///
/// Zero records produce the empty-profile sentinel.
#[must_use]
pub fn build_profile(
    policy: &AnalysisPolicy,
    device_id: &str,
    records: &[ConversationRecord],
    now: DateTime<Utc>,
) -> ConversationProfile {
    if records.is_empty() {
        return ConversationProfile::empty(device_id, now);
    }

    let (favorite_topics, topic_frequencies) = identify_topics(policy, records);
    let time = time_patterns(policy, records);
    let phrasing = phrasing_patterns(policy, records);
    let (sentiment_distribution, interaction_style) = sentiment(policy, records);
    let (topics_by_location, topics_by_time_of_day) = bucket_topics(policy, records);

    ConversationProfile {
        device_id: device_id.to_string(),
        schema_version: PROFILE_SCHEMA_VERSION,
        update_timestamp: now,
        total_exchanges: records.len(),
        first_exchange: records.first().map(|r| r.timestamp),
        last_exchange: records.last().map(|r| r.timestamp),
        favorite_topics,
        topic_frequencies,
        keyword_cloud: phrasing.keyword_cloud,
        hourly_distribution: time.hourly,
        weekday_distribution: time.weekday,
        peak_hours: time.peak_hours,
        average_exchanges_per_day: time.average_per_day,
        common_greetings: phrasing.common_greetings,
        question_types: phrasing.question_types,
        average_utterance_length: phrasing.average_utterance_length,
        vocabulary_size: phrasing.vocabulary_size,
        sentiment_distribution,
        interaction_style,
        topics_by_location,
        topics_by_time_of_day,
    }
}

/// Score topics by substring search: one hit per topic per utterance,
/// ranked by score descending (ties broken by topic name)
pub(crate) fn identify_topics(
    policy: &AnalysisPolicy,
    records: &[ConversationRecord],
) -> (Vec<String>, BTreeMap<String, u32>) {
    let mut scores: BTreeMap<String, u32> = BTreeMap::new();

    for record in records {
        let utterance = record.utterance.to_lowercase();
        for (topic, keywords) in &policy.topic_keywords {
            if keywords.iter().any(|k| utterance.contains(k)) {
                *scores.entry((*topic).to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(&String, &u32)> = scores.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let favorites = ranked
        .into_iter()
        .take(policy.top_topics)
        .map(|(topic, _)| topic.clone())
        .collect();

    (favorites, scores)
}

/// Known keywords contained in the text, in dictionary order
pub(crate) fn extract_keywords(policy: &AnalysisPolicy, text: &str) -> Vec<String> {
    let text = text.to_lowercase();
    let mut keywords = Vec::new();

    for (_, topic_words) in &policy.topic_keywords {
        for word in topic_words {
            if text.contains(word) {
                keywords.push(word.trim().to_string());
            }
        }
    }

    keywords
}

pub(crate) struct TimePatterns {
    pub hourly: BTreeMap<u32, u32>,
    pub weekday: BTreeMap<String, u32>,
    pub peak_hours: Vec<u32>,
    pub average_per_day: f64,
}

/// Bucket timestamps by hour and weekday; peak hours are the top hours by
/// count, average per day spans first..last inclusive (minimum one day)
pub(crate) fn time_patterns(policy: &AnalysisPolicy, records: &[ConversationRecord]) -> TimePatterns {
    let mut hourly: BTreeMap<u32, u32> = BTreeMap::new();
    let mut weekday: BTreeMap<String, u32> = BTreeMap::new();

    for record in records {
        *hourly.entry(record.timestamp.hour()).or_insert(0) += 1;
        *weekday
            .entry(record.timestamp.weekday().to_string())
            .or_insert(0) += 1;
    }

    let mut ranked: Vec<(&u32, &u32)> = hourly.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let peak_hours = ranked
        .into_iter()
        .take(policy.peak_hours)
        .map(|(hour, _)| *hour)
        .collect();

    let average_per_day = records.first().zip(records.last()).map_or(0.0, |(first, last)| {
        let days = (last.timestamp.date_naive() - first.timestamp.date_naive())
            .num_days()
            .max(0)
            + 1;
        #[allow(clippy::cast_precision_loss)]
        let average = records.len() as f64 / days as f64;
        (average * 100.0).round() / 100.0
    });

    TimePatterns {
        hourly,
        weekday,
        peak_hours,
        average_per_day,
    }
}

pub(crate) struct PhrasingPatterns {
    pub common_greetings: Vec<String>,
    pub question_types: BTreeMap<String, u32>,
    pub average_utterance_length: f64,
    pub vocabulary_size: usize,
    pub keyword_cloud: BTreeMap<String, u32>,
}

/// Greeting detection, question classification, utterance length, and
/// naive vocabulary size
pub(crate) fn phrasing_patterns(
    policy: &AnalysisPolicy,
    records: &[ConversationRecord],
) -> PhrasingPatterns {
    let mut greeting_counts: BTreeMap<&str, u32> = BTreeMap::new();
    let mut question_types: BTreeMap<String, u32> = BTreeMap::new();
    let mut total_chars = 0usize;
    let mut vocabulary: BTreeSet<String> = BTreeSet::new();
    let mut keyword_counts: BTreeMap<String, u32> = BTreeMap::new();

    for record in records {
        let utterance = record.utterance.to_lowercase();

        // First matching greeting pattern counts once per utterance
        for pattern in &policy.greeting_patterns {
            if utterance.contains(pattern) {
                *greeting_counts.entry(pattern).or_insert(0) += 1;
                break;
            }
        }

        // An utterance may hit several question categories
        if is_question(policy, &utterance) {
            for (q_type, markers) in &policy.question_markers {
                if markers.iter().any(|m| utterance.contains(m)) {
                    *question_types.entry(q_type.as_str().to_string()).or_insert(0) += 1;
                }
            }
        }

        total_chars += record.utterance.chars().count();
        vocabulary.extend(tokenize(&record.utterance));

        for keyword in extract_keywords(policy, &record.utterance) {
            *keyword_counts.entry(keyword).or_insert(0) += 1;
        }
    }

    let mut ranked_greetings: Vec<(&&str, &u32)> = greeting_counts.iter().collect();
    ranked_greetings.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    let common_greetings = ranked_greetings
        .into_iter()
        .take(policy.common_greetings)
        .map(|(pattern, _)| (*pattern).to_string())
        .collect();

    let mut ranked_keywords: Vec<(String, u32)> = keyword_counts.into_iter().collect();
    ranked_keywords.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked_keywords.truncate(policy.keyword_cloud_size);

    #[allow(clippy::cast_precision_loss)]
    let average_utterance_length = if records.is_empty() {
        0.0
    } else {
        let average = total_chars as f64 / records.len() as f64;
        (average * 10.0).round() / 10.0
    };

    PhrasingPatterns {
        common_greetings,
        question_types,
        average_utterance_length,
        vocabulary_size: vocabulary.len(),
        keyword_cloud: ranked_keywords.into_iter().collect(),
    }
}

/// A question contains a question mark or any question-word marker
pub(crate) fn is_question(policy: &AnalysisPolicy, utterance_lower: &str) -> bool {
    utterance_lower.contains('?')
        || policy
            .question_markers
            .iter()
            .any(|(_, markers)| markers.iter().any(|m| utterance_lower.contains(m)))
}

/// Naive tokenization: lowercase alphanumeric runs
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Classify sentiment per utterance against independent keyword lists and
/// derive the interaction style label.
///
/// Decision order: positive share above the threshold reads cheerful, then
/// any question mark reads inquisitive, then high volume reads chatty,
/// otherwise casual.
pub(crate) fn sentiment(
    policy: &AnalysisPolicy,
    records: &[ConversationRecord],
) -> (BTreeMap<String, f64>, InteractionStyle) {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();

    for record in records {
        let utterance = record.utterance.to_lowercase();
        for (class, keywords) in &policy.sentiment_keywords {
            if keywords.iter().any(|k| utterance.contains(k)) {
                *counts.entry((*class).to_string()).or_insert(0) += 1;
            }
        }
    }

    let total: u32 = counts.values().sum::<u32>().max(1);
    let distribution: BTreeMap<String, f64> = counts
        .iter()
        .map(|(class, count)| {
            let pct = f64::from(*count) / f64::from(total) * 100.0;
            (class.clone(), (pct * 10.0).round() / 10.0)
        })
        .collect();

    let positive_pct = distribution.get("positive").copied().unwrap_or(0.0);
    let any_question_mark = records.iter().any(|r| r.utterance.contains('?'));

    let style = if positive_pct > policy.cheerful_positive_pct {
        InteractionStyle::Cheerful
    } else if any_question_mark {
        InteractionStyle::Inquisitive
    } else if records.len() > policy.chatty_min_exchanges {
        InteractionStyle::Chatty
    } else {
        InteractionStyle::Casual
    };

    (distribution, style)
}

/// Group extracted keywords by device location and by time-of-day bucket,
/// keeping the top keywords per bucket
pub(crate) fn bucket_topics(
    policy: &AnalysisPolicy,
    records: &[ConversationRecord],
) -> (BTreeMap<String, Vec<String>>, BTreeMap<String, Vec<String>>) {
    let mut by_location: BTreeMap<String, BTreeMap<String, u32>> = BTreeMap::new();
    let mut by_time: BTreeMap<String, BTreeMap<String, u32>> = BTreeMap::new();

    for record in records {
        let location = record
            .location
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let bucket = TimeOfDay::from_hour(record.timestamp.hour()).as_str();

        for keyword in extract_keywords(policy, &record.utterance) {
            *by_location
                .entry(location.clone())
                .or_default()
                .entry(keyword.clone())
                .or_insert(0) += 1;
            *by_time
                .entry(bucket.to_string())
                .or_default()
                .entry(keyword)
                .or_insert(0) += 1;
        }
    }

    (
        top_per_bucket(by_location, policy.bucket_topics),
        top_per_bucket(by_time, policy.bucket_topics),
    )
}

fn top_per_bucket(
    buckets: BTreeMap<String, BTreeMap<String, u32>>,
    limit: usize,
) -> BTreeMap<String, Vec<String>> {
    buckets
        .into_iter()
        .map(|(bucket, counts)| {
            let mut ranked: Vec<(String, u32)> = counts.into_iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            let top = ranked.into_iter().take(limit).map(|(word, _)| word).collect();
            (bucket, top)
        })
        .collect()
}
