//! End-to-end tests for the conversation memory flow

mod common;

use chrono::Utc;

use hearth::analyzer::build_profile;
use hearth::config::StoreConfig;
use hearth::{AnalysisPolicy, ConversationRecord, ConversationStore};

use common::{setup_system, setup_test_db};

const HW: &str = "D8:0F:99:D8:00:96";

#[test]
fn exchange_flow_produces_profile_and_context() {
    let system = setup_system();

    system.register_device(HW, "Living", Some("1F")).unwrap();
    system.add_exchange(HW, "sunny today", "it sure is", Some("1F")).unwrap();
    system
        .add_exchange(HW, "tell me about space", "gladly", Some("1F"))
        .unwrap();
    system
        .add_exchange(HW, "space again please", "of course", Some("1F"))
        .unwrap();

    // The profile written after the first exchange is still fresh; sweep to
    // fold in the rest
    system.refresh_profiles().unwrap();

    let profile = system.analyzer().load(HW).unwrap().unwrap();
    assert!(profile.favorite_topics.contains(&"space".to_string()));
    assert_eq!(profile.total_exchanges, 3);
    assert!((profile.average_exchanges_per_day - 3.0).abs() < f64::EPSILON);

    let context = system.personalized_context(HW, "fallback", Some("1F"));
    assert!(context.starts_with("Device: Living @ 1F (D8:00:96)\n"));
    assert!(context.contains("space"));
}

#[test]
fn profile_is_pure_function_of_log() {
    let policy = AnalysisPolicy::default();
    let now = Utc::now();
    let records: Vec<ConversationRecord> = (0..10)
        .map(|i| ConversationRecord {
            timestamp: now + chrono::Duration::minutes(i),
            utterance: format!("what about planet {i}?"),
            reply: "interesting".to_string(),
            location: Some("1F".to_string()),
        })
        .collect();

    let a = build_profile(&policy, HW, &records, now);
    let b = build_profile(&policy, HW, &records, now);
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn cap_bounds_history_and_analysis_follows() {
    let pool = setup_test_db();
    let store = ConversationStore::new(
        pool,
        StoreConfig {
            max_history_per_device: 5,
            short_term_minutes: 30,
        },
    );

    for i in 0..20 {
        store.append(HW, &format!("message {i}"), "ok", None).unwrap();
    }

    let all = store.all(HW).unwrap();
    assert_eq!(all.len(), 5);
    assert_eq!(all[0].utterance, "message 15");

    // The profile reflects the capped window, not the lifetime
    let profile = build_profile(&AnalysisPolicy::default(), HW, &all, Utc::now());
    assert_eq!(profile.total_exchanges, 5);
}

#[test]
fn empty_log_is_safe_everywhere() {
    let system = setup_system();
    let unknown = "00:00:00:00:00:00";

    assert!(system.store().all(unknown).unwrap().is_empty());

    let profile = system.analyzer().generate(system.store(), unknown).unwrap();
    assert!(profile.is_empty());

    let insights = system.conversation_insights(unknown).unwrap();
    assert_eq!(insights, vec!["No conversations recorded yet.".to_string()]);

    let context = system.personalized_context(unknown, "Mystery", None);
    assert!(context.starts_with("Device: Mystery (00:00:00)\n"));
}

#[test]
fn export_report_round_trips() {
    let system = setup_system();
    let dir = tempfile::tempdir().unwrap();

    system.register_device(HW, "Living", Some("1F")).unwrap();
    system.add_exchange(HW, "hello there", "hi!", Some("1F")).unwrap();
    system.add_exchange(HW, "how are you?", "great!", Some("1F")).unwrap();
    system.refresh_profiles().unwrap();

    let path = dir.path().join("report.json");
    system.export_device_report(HW, Some(&path)).unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed["device"]["hw_addr"], HW);
    assert_eq!(parsed["records"].as_array().unwrap().len(), 2);
    assert_eq!(parsed["summary"]["total_count"], 2);
    assert_eq!(parsed["profile"]["total_exchanges"], 2);
}

#[test]
fn short_term_memory_feeds_the_context_block() {
    let system = setup_system();

    system.add_exchange(HW, "what is a star?", "a distant sun", None).unwrap();

    let context = system.personalized_context(HW, "fallback", None);
    assert!(context.contains("what is a star?"));
    assert!(context.contains("a distant sun"));
}
