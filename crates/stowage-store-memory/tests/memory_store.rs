// crates/stowage-store-memory/tests/memory_store.rs
// ============================================================================
// Module: Memory Store Tests
// Description: Contract tests for the cache engine.
// Purpose: Validate values, expiry, lists, key-type exclusivity, and
//          lifecycle of the in-process store.
// ============================================================================

//! Memory store contract tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use serde_json::json;
use stowage_core::ErrorKind;
use stowage_core::ManagerOptions;
use stowage_core::ManagerState;
use stowage_core::SetOptions;
use stowage_core::Store;
use stowage_store_memory::MemoryStore;
use stowage_store_memory::MemoryStoreConfig;

fn store(options: ManagerOptions) -> MemoryStore {
    MemoryStore::new(&MemoryStoreConfig::default(), options).expect("store")
}

fn quiet() -> ManagerOptions {
    ManagerOptions {
        cleanup_enabled: false,
        ..ManagerOptions::default()
    }
}

#[test]
fn values_round_trip_until_deleted() {
    let store = store(quiet());
    let options = SetOptions::new().with_metadata(json!({"v": 1}));
    store.set("k", b"value", &options).expect("set");
    let entry = store.get_entry("k").expect("get").expect("present");
    assert_eq!(entry.value, b"value".to_vec());
    assert_eq!(entry.metadata, Some(json!({"v": 1})));
    assert_eq!(entry.namespace, "default");
    assert!(store.delete("k").expect("delete"));
    assert!(store.fetch("k").expect_err("gone").is_not_found());
}

#[test]
fn expired_values_are_hidden_then_swept() {
    let store = store(ManagerOptions {
        cleanup_interval: Duration::from_millis(10),
        ..ManagerOptions::default()
    });
    let ttl = SetOptions::new().with_ttl(Duration::from_millis(1));
    store.set("short", b"v", &ttl).expect("set");
    thread::sleep(Duration::from_millis(5));
    assert_eq!(store.get("short").expect("get"), None);

    let handle = store.manager().get_connection().expect("handle");
    let deadline = Instant::now() + Duration::from_secs(5);
    while handle.with_pool(|keyspace| Ok(keyspace.len())).expect("len") > 0 {
        assert!(Instant::now() < deadline, "sweep never removed the entry");
        thread::sleep(Duration::from_millis(5));
    }
    store.close();
}

#[test]
fn lists_keep_append_order() {
    let store = store(quiet());
    for value in [b"v1", b"v2", b"v3"] {
        store.list_append("l", value, None).expect("append");
    }
    let entries = store.list_read("l").expect("read");
    assert_eq!(entries.iter().map(|entry| entry.position).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(entries[2].value, b"v3".to_vec());
    assert_eq!(store.list_clear("l").expect("clear"), 3);
    assert_eq!(store.list_len("l").expect("len"), 0);
}

#[test]
fn one_key_holds_one_kind() {
    let store = store(quiet());
    store.set("k", b"v", &SetOptions::new()).expect("set");
    let err = store.list_append("k", b"item", None).expect_err("wrongtype");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(!err.retryable());

    store.list_append("l", b"item", None).expect("append");
    assert_eq!(store.get("l").expect_err("wrongtype").kind(), ErrorKind::Validation);
    store.set("l", b"v", &SetOptions::new()).expect("set replaces list");
    assert_eq!(store.get("l").expect("get"), Some(b"v".to_vec()));
}

#[test]
fn concurrent_appends_never_reuse_positions() {
    let store = Arc::new(store(quiet()));
    let handles: Vec<_> = (0 .. 8)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0 .. 50)
                    .map(|_| store.list_append("events", b"e", None).expect("append"))
                    .collect::<Vec<u64>>()
            })
        })
        .collect();
    let mut positions: Vec<u64> =
        handles.into_iter().flat_map(|handle| handle.join().expect("join")).collect();
    positions.sort_unstable();
    assert_eq!(positions, (0 .. 400).collect::<Vec<u64>>());
}

#[test]
fn keys_filter_namespace_and_limit() {
    let store = store(quiet());
    let ns = SetOptions::new().with_namespace("ns");
    for key in ["b", "a", "c"] {
        store.set(key, b"v", &ns).expect("set");
    }
    assert_eq!(store.keys("ns", 2).expect("keys"), vec!["a", "b"]);
    assert!(store.keys("other", 10).expect("keys").is_empty());
}

#[test]
fn close_discards_the_keyspace() {
    let store = store(quiet());
    store.set("k", b"v", &SetOptions::new()).expect("set");
    store.close();
    store.close();
    assert_eq!(store.manager().state(), ManagerState::Closed);
    assert_eq!(store.get("k").expect_err("closed").kind(), ErrorKind::Connection);
}

#[test]
fn invalid_config_is_rejected() {
    let config = MemoryStoreConfig {
        max_entries: 0,
        ..MemoryStoreConfig::default()
    };
    let Err(err) = MemoryStore::new(&config, quiet()) else {
        panic!("zero capacity accepted");
    };
    assert_eq!(err.kind(), ErrorKind::Validation);
}
