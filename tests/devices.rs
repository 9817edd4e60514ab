//! Device identity and connection tracking tests

mod common;

use common::setup_system;

#[test]
fn hardware_address_is_the_only_identity() {
    let system = setup_system();

    system
        .register_device("d8:0f:99:d8:00:96", "Living", Some("1F"))
        .unwrap();
    system
        .add_exchange("D8:0F:99:D8:00:96", "hello", "hi", None)
        .unwrap();

    // Same address with a new name is the same device, history intact
    let device = system
        .register_device("D8:0F:99:D8:00:96", "Bedroom", Some("2F"))
        .unwrap();
    assert_eq!(device.name, "Bedroom");
    assert_eq!(device.total_connections, 2);
    assert_eq!(system.store().count("d8:0f:99:d8:00:96").unwrap(), 1);
    assert_eq!(system.registry().statistics().unwrap().total_registered, 1);
}

#[test]
fn connection_recording_updates_registry_and_history() {
    let system = setup_system();

    // Unknown device auto-registers on first connection
    system
        .record_connection("AA:BB:CC:DD:EE:FF", "Kitchen", "192.168.1.50", None)
        .unwrap();
    let device = system.registry().get("AA:BB:CC:DD:EE:FF").unwrap().unwrap();
    assert_eq!(device.total_connections, 1);

    system
        .record_connection(
            "AA:BB:CC:DD:EE:FF",
            "Kitchen",
            "192.168.1.50",
            Some(serde_json::json!({"firmware": "1.2.0"})),
        )
        .unwrap();
    let device = system.registry().get("AA:BB:CC:DD:EE:FF").unwrap().unwrap();
    assert_eq!(device.total_connections, 2);
    assert_eq!(system.registry().connection_event_count().unwrap(), 2);
}

#[test]
fn device_stats_combine_registry_store_and_profile() {
    let system = setup_system();

    system
        .register_device("AA:BB:CC:DD:EE:FF", "Desk", None)
        .unwrap();
    system
        .add_exchange("AA:BB:CC:DD:EE:FF", "tell me about space", "sure", None)
        .unwrap();

    let stats = system.device_stats("AA:BB:CC:DD:EE:FF").unwrap();
    assert_eq!(stats.device.unwrap().name, "Desk");
    assert_eq!(stats.display_name, "Desk (DD:EE:FF)");
    assert_eq!(stats.summary.total_count, 1);
    assert!(stats
        .profile
        .unwrap()
        .favorite_topics
        .contains(&"space".to_string()));
}

#[test]
fn active_device_listing_orders_by_recency() {
    let system = setup_system();

    system.register_device("AA:AA:AA:AA:AA:01", "One", None).unwrap();
    system.register_device("AA:AA:AA:AA:AA:02", "Two", None).unwrap();

    let active = system.registry().active_devices(24).unwrap();
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].device.name, "Two");
    assert!(active[0].hours_ago < 1.0);
}
