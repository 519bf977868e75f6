//! Integration tests for the public cache API over the file store

use std::fs;
use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;
use reelcache::cache::{FileStore, ManualClock, Substrate, TtlCache};
use serde_json::{json, Value};
use tempfile::TempDir;

fn file_cache(temp_dir: &TempDir, clock: Arc<ManualClock>) -> TtlCache<FileStore> {
    TtlCache::new(FileStore::with_dir(temp_dir.path().to_path_buf())).with_clock(clock)
}

#[test]
fn test_popular_listing_expires_after_six_hours() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let cache = file_cache(&temp_dir, clock.clone());
    let payload = json!({"titles": ["Batman Begins"]});

    cache
        .set("popular_movies_Batman", &payload, Duration::milliseconds(21_600_000))
        .unwrap();
    assert_eq!(cache.get::<Value>("popular_movies_Batman"), Some(payload));

    clock.advance(Duration::milliseconds(21_600_001));
    assert!(cache.get::<Value>("popular_movies_Batman").is_none());
    assert!(!cache
        .stats()
        .keys
        .contains(&"popular_movies_Batman".to_string()));
    assert!(!temp_dir
        .path()
        .join("netflix_cache_popular_movies_Batman.json")
        .exists());
}

#[test]
fn test_stored_file_uses_entry_wire_format() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let clock = Arc::new(ManualClock::new(1_234));
    let cache = file_cache(&temp_dir, clock);

    cache.set("details_tt1", &json!({"Title": "Alien"}), Duration::hours(24)).unwrap();

    let raw = fs::read_to_string(temp_dir.path().join("netflix_cache_details_tt1.json")).unwrap();
    assert_eq!(
        raw,
        r#"{"data":{"Title":"Alien"},"timestamp":1234,"ttl":86400000}"#
    );
    assert_eq!(cache.stats().total_size_bytes, raw.len());
}

#[test]
fn test_truncated_file_is_a_miss_and_removed() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let clock = Arc::new(ManualClock::new(0));
    let cache = file_cache(&temp_dir, clock);
    cache.set("search_alien", &json!([1, 2, 3]), Duration::hours(1)).unwrap();

    let path = temp_dir.path().join("netflix_cache_search_alien.json");
    fs::write(&path, "{\"data\":[1,2").unwrap();

    assert!(cache.get::<Value>("search_alien").is_none());
    assert!(!path.exists());
}

#[test]
fn test_clear_spares_other_namespaces_and_foreign_files() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let shared = Arc::new(Mutex::new(FileStore::with_dir(temp_dir.path().to_path_buf())));
    let movies = TtlCache::on_shared(shared.clone(), "netflix_cache_").unwrap();
    let shows = TtlCache::on_shared(shared.clone(), "shows_cache_").unwrap();

    movies.set("popular", &json!(1), Duration::hours(1)).unwrap();
    shows.set("popular", &json!(2), Duration::hours(1)).unwrap();
    shared.lock().write("settings", "{\"theme\":\"dark\"}").unwrap();

    assert_eq!(movies.clear(), 1);
    assert!(movies.stats().keys.is_empty());
    assert_eq!(shows.get::<Value>("popular"), Some(json!(2)));
    assert!(shared.lock().read("settings").unwrap().is_some());
}

#[test]
fn test_prefix_of_existing_namespace_cannot_share_directory() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let shared = Arc::new(Mutex::new(FileStore::with_dir(temp_dir.path().to_path_buf())));
    let movies = TtlCache::on_shared(shared.clone(), "netflix_cache_").unwrap();
    movies.set("popular", &json!(1), Duration::hours(1)).unwrap();

    assert!(TtlCache::on_shared(shared.clone(), "netflix_").is_err());
    let separate = FileStore::with_dir(temp_dir.path().to_path_buf());
    assert!(TtlCache::with_namespace(separate, "netflix_").is_err());

    assert_eq!(movies.get::<Value>("popular"), Some(json!(1)));
    assert!(temp_dir.path().join("netflix_cache_popular.json").exists());
}
