// crates/stowage/tests/registry.rs
// ============================================================================
// Module: Store Registry Tests
// Description: Facade resolution, sharing, and eviction tests.
// Purpose: Validate one manager per configuration across threads and
//          backends.
// ============================================================================

//! ## Overview
//! Exercises [`StoreRegistry`] with the memory and `SQLite` engines:
//! - equal configurations resolve to one shared manager
//! - distinct configurations stay isolated
//! - eviction closes the manager and a later resolve starts fresh

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::sync::Barrier;
use std::thread;

use serde_json::json;
use stowage::BackendKind;
use stowage::ErrorKind;
use stowage::SetOptions;
use stowage::StorageBackend;
use stowage::StorageConfig;
use stowage::StoreRegistry;
use tempfile::TempDir;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn memory_config(name: &str) -> StorageConfig {
    let mut config = StorageConfig::for_backend(StorageBackend::Memory);
    config.memory.name = name.to_string();
    config.cleanup_enabled = false;
    config
}

fn sqlite_config(dir: &TempDir) -> StorageConfig {
    let mut config = StorageConfig::for_backend(StorageBackend::Sqlite);
    config.sqlite.path = dir.path().join("registry.db");
    config.cleanup_enabled = false;
    config
}

#[test]
fn equal_configs_share_one_store() {
    init_tracing();
    let registry = StoreRegistry::new();
    let writer = registry.resolve(&memory_config("shared")).expect("writer");
    let reader = registry.resolve(&memory_config("shared")).expect("reader");
    assert_eq!(registry.len(), 1);

    writer.set("k", b"v", &SetOptions::new()).expect("set");
    assert_eq!(reader.get("k").expect("get"), Some(b"v".to_vec()));
    assert_eq!(reader.backend(), BackendKind::Memory);
}

#[test]
fn concurrent_resolution_registers_once() {
    init_tracing();
    let registry = Arc::new(StoreRegistry::new());
    let barrier = Arc::new(Barrier::new(16));
    let handles: Vec<_> = (0 .. 16)
        .map(|worker| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let store = registry.resolve(&memory_config("race")).expect("resolve");
                store.list_append("events", format!("{worker}").as_bytes(), None).expect("append")
            })
        })
        .collect();
    let mut positions: Vec<u64> =
        handles.into_iter().map(|handle| handle.join().expect("join")).collect();
    positions.sort_unstable();
    assert_eq!(positions, (0 .. 16).collect::<Vec<u64>>());
    assert_eq!(registry.len(), 1);
}

#[test]
fn distinct_configs_are_isolated() {
    let registry = StoreRegistry::new();
    let left = registry.resolve(&memory_config("left")).expect("left");
    let right = registry.resolve(&memory_config("right")).expect("right");
    left.set("k", b"left", &SetOptions::new()).expect("set");
    assert_eq!(right.get("k").expect("get"), None);
    assert_eq!(registry.len(), 2);
}

#[test]
fn invalid_configs_are_rejected_without_registering() {
    let registry = StoreRegistry::new();
    let mut config = memory_config("bad");
    config.memory.max_entries = 0;
    let err = registry.resolve(&config).err().expect("invalid");
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(registry.is_empty());
}

#[test]
fn eviction_closes_the_manager() {
    let registry = StoreRegistry::new();
    let config = memory_config("evict");
    let store = registry.resolve(&config).expect("resolve");
    store.set("k", b"v", &SetOptions::new()).expect("set");

    assert!(registry.evict(&config).expect("evict"));
    assert!(!registry.evict(&config).expect("second evict"));
    assert!(!registry.contains(&config).expect("contains"));
    let err = store.get("k").expect_err("closed");
    assert_eq!(err.kind(), ErrorKind::Connection);

    let fresh = registry.resolve(&config).expect("fresh");
    assert_eq!(fresh.get("k").expect("get"), None);
}

#[test]
fn sqlite_stores_resolve_lazily_and_persist() {
    init_tracing();
    let dir = TempDir::new().expect("tempdir");
    let config = sqlite_config(&dir);
    let registry = StoreRegistry::new();
    let store = registry.resolve(&config).expect("resolve");
    assert!(!dir.path().join("registry.db").exists());

    let options = SetOptions::new().with_metadata(json!({"source": "registry"}));
    store.set("doc", b"body", &options).expect("set");
    let entry = store.get_entry("doc").expect("entry").expect("present");
    assert_eq!(entry.metadata, Some(json!({"source": "registry"})));

    registry.close_all();
    assert!(registry.is_empty());
    let reopened = registry.resolve(&config).expect("reopen");
    assert_eq!(reopened.get("doc").expect("get"), Some(b"body".to_vec()));
}

#[test]
fn dotted_sqlite_paths_share_one_store() {
    init_tracing();
    let dir = TempDir::new().expect("tempdir");
    let plain = sqlite_config(&dir);
    let mut dotted = plain.clone();
    dotted.sqlite.path = dir.path().join(".").join("registry.db");
    let registry = StoreRegistry::new();
    let writer = registry.resolve(&plain).expect("plain");
    let reader = registry.resolve(&dotted).expect("dotted");
    assert_eq!(registry.len(), 1);

    writer.set("k", b"v", &SetOptions::new()).expect("set");
    assert_eq!(reader.get("k").expect("get"), Some(b"v".to_vec()));
    registry.close_all();
}
