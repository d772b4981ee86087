//! End-to-end tests for the storage provider over the in-memory store.
//!
//! Every test builds its own [`MemoryStore`], so they run in parallel with
//! no external services.
//!
//! # Running Tests
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//! - `happy_*` - save / load / sync / query through the provider
//! - `failure_*` - store rejections, disconnection, malformed records
//! - `skew_*` - offset changes and rounding behaviour

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

use skew_store::storage::QueryOptions;
use skew_store::{
    Document, DocumentStore, Error, MemoryStore, ProviderConfig, StorageProvider, StoreError,
    TIMES_KEY,
};

// =============================================================================
// Helpers
// =============================================================================

fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).unwrap()
}

fn setup(offset_ms: i64) -> (Arc<MemoryStore>, StorageProvider) {
    setup_with(offset_ms, ProviderConfig::default())
}

fn setup_with(offset_ms: i64, config: ProviderConfig) -> (Arc<MemoryStore>, StorageProvider) {
    let store = Arc::new(MemoryStore::new());
    store.set_clock_offset_ms(offset_ms);
    let provider = StorageProvider::new(store.clone(), config).unwrap();
    (store, provider)
}

fn doc<const N: usize>(fields: [(&str, Document); N]) -> Document {
    fields.into_iter().collect()
}

// =============================================================================
// Happy Path
// =============================================================================

#[tokio::test]
async fn happy_save_new_record_stores_server_times() {
    let (store, provider) = setup(1_000);
    let created = at(1_700_000_000_000);
    let data = doc([("createdAt", Document::from(created))]);

    let id = provider.save("namespace", None, data.clone()).await.unwrap();

    let raw = store.read("namespace", &id).await.unwrap();
    assert_eq!(raw, Some(json!({"_times": {"createdAt": 1_700_000_001_000_i64}})));
    assert_eq!(provider.load("namespace", &id).await.unwrap(), Some(data));
}

#[tokio::test]
async fn happy_save_load_current_time() {
    let (store, provider) = setup(730);
    let now = Utc::now();
    let data = doc([("seenAt", Document::from(now))]);

    let id = provider.save("namespace", None, data.clone()).await.unwrap();

    let raw = store.read("namespace", &id).await.unwrap().unwrap();
    assert_eq!(raw[TIMES_KEY]["seenAt"], json!(now.timestamp_millis() + 730));
    let loaded = provider.load("namespace", &id).await.unwrap().unwrap();
    assert_eq!(loaded, data);
    assert_eq!(
        loaded.get("seenAt").and_then(Document::as_instant).unwrap().timestamp_millis(),
        now.timestamp_millis()
    );
}

#[tokio::test]
async fn happy_round_trip_at_every_depth() {
    let (_store, provider) = setup(-2_500);

    let shallow = doc([("t", Document::from(at(10_000))), ("name", Document::from("a"))]);
    let one_deep = doc([("meta", doc([("t", Document::from(at(20_000)))]))]);
    let three_deep = doc([(
        "a",
        doc([(
            "b",
            doc([(
                "c",
                doc([("t", Document::from(at(30_000))), ("n", Document::from(3i64))]),
            )]),
        )]),
    )]);
    let mixed = doc([
        ("a", Document::from(at(1_000))),
        ("b", doc([("c", Document::from(at(2_000)))])),
        ("b2", doc([("c2", doc([("d", doc([("e", Document::from(at(3_000)))]))]))])),
    ]);
    let plain = Document::from(json!({"title": "no instants", "tags": ["x", "y"]}));

    for (i, data) in [shallow, one_deep, three_deep, mixed, plain].into_iter().enumerate() {
        let id = format!("rec{i}");
        provider.save("depths", Some(&id), data.clone()).await.unwrap();
        assert_eq!(provider.load("depths", &id).await.unwrap(), Some(data));
    }
}

#[tokio::test]
async fn happy_instants_inside_arrays() {
    let (store, provider) = setup(100);
    let data = doc([(
        "visits",
        Document::Array(vec![
            Document::from(at(1_000)),
            Document::from("skip"),
            Document::from(at(3_000)),
        ]),
    )]);

    provider.save("log", Some("v"), data.clone()).await.unwrap();

    let raw = store.read("log", "v").await.unwrap().unwrap();
    assert_eq!(raw["visits"], json!([null, "skip", null]));
    assert_eq!(raw[TIMES_KEY]["visits"], json!({"0": 1_100, "2": 3_100}));
    assert_eq!(provider.load("log", "v").await.unwrap(), Some(data));
}

#[tokio::test]
async fn happy_query_once_sorted_and_limited() {
    let (_store, provider) = setup(0);
    for (id, score) in [("a", 30i64), ("b", 10), ("c", 20), ("d", 40)] {
        provider
            .save("scores", Some(id), doc([("score", Document::from(score))]))
            .await
            .unwrap();
    }

    let options = QueryOptions::new().sort_by("score").limit(2);
    let result = provider.query_once("scores", &options).await.unwrap();

    let ids: Vec<&str> = result.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["b", "c"]);
}

#[tokio::test]
async fn happy_query_once_by_instant_field() {
    let (_store, provider) = setup(5_000);
    for (id, ms) in [("late", 9_000), ("early", 1_000), ("mid", 4_000)] {
        provider
            .save("events", Some(id), doc([("at", Document::from(at(ms)))]))
            .await
            .unwrap();
    }

    let options = QueryOptions::new().sort_by("_times/at").limit(2);
    let result = provider.query_once("events", &options).await.unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result["early"].get("at"), Some(&Document::from(at(1_000))));
    assert_eq!(result["mid"].get("at"), Some(&Document::from(at(4_000))));
}

#[tokio::test]
async fn happy_sync_sees_later_saves() {
    let (_store, provider) = setup(250);
    provider
        .save("rooms", Some("lobby"), doc([("open", Document::from(true))]))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let initial = provider
        .sync("rooms", "lobby", move |change| {
            let _ = tx.send(change);
        })
        .await
        .unwrap();
    assert_eq!(initial, Some(doc([("open", Document::from(true))])));

    let updated = doc([("open", Document::from(false)), ("closedAt", Document::from(at(5_000)))]);
    provider.save("rooms", Some("lobby"), updated.clone()).await.unwrap();

    let delivered = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(delivered.unwrap(), Some(updated));

    provider.unsync("rooms", "lobby");
    assert_eq!(provider.active_syncs(), 0);
}

#[tokio::test]
async fn happy_query_streams_new_keys() {
    let (_store, provider) = setup(0);
    provider
        .save("tickets", Some("t1"), doc([("status", Document::from("open"))]))
        .await
        .unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let options = QueryOptions::new().sort_by("status").equal_to("open");
    provider
        .query("tickets", &options, move |key| {
            let _ = tx.send(key);
        })
        .await
        .unwrap();

    provider
        .save("tickets", Some("t2"), doc([("status", Document::from("closed"))]))
        .await
        .unwrap();
    provider
        .save("tickets", Some("t3"), doc([("status", Document::from("open"))]))
        .await
        .unwrap();

    assert_eq!(rx.recv().await.unwrap().unwrap(), "t1");
    assert_eq!(rx.recv().await.unwrap().unwrap(), "t3");
    provider.unquery("tickets");
    assert!(rx.try_recv().is_err());
}

// =============================================================================
// Failure Scenarios
// =============================================================================

#[tokio::test]
async fn failure_unrepresentable_key_is_store_error() {
    let (store, provider) = setup(0);
    let data = doc([("bad.key", Document::from(1i64))]);

    let err = provider.save("namespace", Some("1234"), data).await.unwrap_err();

    assert!(matches!(err, Error::Store(StoreError::InvalidData(_))));
    assert!(store.is_empty("namespace"));
}

#[tokio::test]
async fn failure_reserved_key_never_reaches_store() {
    let (store, provider) = setup(0);
    let data = doc([(TIMES_KEY, Document::from(json!({"x": 1})))]);

    let err = provider.save("namespace", None, data).await.unwrap_err();

    assert_eq!(err.kind(), "normalize");
    assert!(store.is_empty("namespace"));
}

#[tokio::test]
async fn failure_disconnected_store() {
    let (store, provider) = setup(0);
    store.set_online(false);

    let save = provider.save("namespace", None, Document::object()).await;
    let load = provider.load("namespace", "x").await;

    assert_eq!(save.unwrap_err(), Error::Store(StoreError::Disconnected));
    assert_eq!(load.unwrap_err(), Error::Store(StoreError::Disconnected));
}

#[tokio::test]
async fn failure_malformed_index_on_load() {
    let (store, provider) = setup(0);
    store
        .update("namespace", "m", json!({"_times": {"at": "yesterday"}}))
        .await
        .unwrap();

    let err = provider.load("namespace", "m").await.unwrap_err();
    assert_eq!(err.kind(), "normalize");
}

#[tokio::test]
async fn failure_invalid_config_rejected() {
    let store = Arc::new(MemoryStore::new());
    let config = ProviderConfig {
        max_depth: 0,
        ..Default::default()
    };

    let err = StorageProvider::new(store, config).err().unwrap();
    assert!(matches!(err, Error::Construction(_)));
}

// =============================================================================
// Clock Skew
// =============================================================================

#[tokio::test]
async fn skew_offset_change_between_save_and_load() {
    let (store, provider) = setup(1_000);
    let data = doc([("at", Document::from(at(50_000)))]);
    provider.save("namespace", Some("s"), data).await.unwrap();

    // Server estimate drifts by 200 ms before the read
    store.set_clock_offset_ms(1_200);

    let loaded = provider.load("namespace", "s").await.unwrap().unwrap();
    assert_eq!(loaded.get("at"), Some(&Document::from(at(49_800))));
}

#[tokio::test]
async fn skew_two_clients_agree_on_server_time() {
    let store = Arc::new(MemoryStore::new());
    let ahead = StorageProvider::new(store.clone(), ProviderConfig::default()).unwrap();

    // Client A's clock reads 10_000 at server time 11_000
    store.set_clock_offset_ms(1_000);
    ahead
        .save("shared", Some("e"), doc([("at", Document::from(at(10_000)))]))
        .await
        .unwrap();

    // Client B's clock reads 12_000 at the same server time
    store.set_clock_offset_ms(-1_000);
    let seen = ahead.load("shared", "e").await.unwrap().unwrap();
    assert_eq!(seen.get("at"), Some(&Document::from(at(12_000))));
}

#[tokio::test]
async fn skew_rounding_policy() {
    let config = ProviderConfig {
        round_to_nearest_second: true,
        ..Default::default()
    };
    let (store, provider) = setup_with(0, config);
    store
        .update("namespace", "r", json!({"_times": {"down": 1_499, "up": 1_500}}))
        .await
        .unwrap();

    let loaded = provider.load("namespace", "r").await.unwrap().unwrap();
    assert_eq!(loaded.get("down"), Some(&Document::from(at(1_000))));
    assert_eq!(loaded.get("up"), Some(&Document::from(at(2_000))));

    let (store, provider) = setup(0);
    store
        .update("namespace", "r", json!({"_times": {"down": 1_499}}))
        .await
        .unwrap();
    let loaded = provider.load("namespace", "r").await.unwrap().unwrap();
    assert_eq!(loaded.get("down"), Some(&Document::from(at(1_499))));
}
