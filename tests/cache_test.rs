use chrono::{Duration, Utc};
use feed_aggregator::{CacheConfig, FeedCache, FeedItem};

fn item(link: &str) -> FeedItem {
    FeedItem {
        title: format!("Item {}", link),
        link: link.to_string(),
        published_at: Some(Utc::now()),
        source: "test".to_string(),
        summary: "summary".to_string(),
    }
}

#[test]
fn serves_entry_within_ttl() {
    let mut cache = FeedCache::new(CacheConfig::with_ttl(Duration::minutes(10)));
    cache.set("f1", vec![item("https://a.example.com/1")]);

    let entry = cache.get("f1").expect("entry should be fresh");
    assert_eq!(entry.items.len(), 1);
    assert_eq!(entry.items[0].link, "https://a.example.com/1");
}

#[test]
fn expires_entry_after_ttl() {
    let mut cache = FeedCache::new(CacheConfig::with_ttl(Duration::milliseconds(40)));
    cache.set("f1", vec![item("https://a.example.com/1")]);

    std::thread::sleep(std::time::Duration::from_millis(60));
    assert!(cache.get("f1").is_none());
    // The expired entry was evicted on read, not merely hidden.
    assert!(cache.is_empty());
}

#[test]
fn missing_key_is_absent() {
    let mut cache = FeedCache::new(CacheConfig::default());
    assert!(cache.get("nope").is_none());
}

#[test]
fn get_all_concatenates_fresh_and_evicts_expired() {
    let mut cache = FeedCache::new(CacheConfig::with_ttl(Duration::milliseconds(80)));
    cache.set(
        "stale",
        vec![item("https://a.example.com/1"), item("https://a.example.com/2")],
    );
    std::thread::sleep(std::time::Duration::from_millis(110));
    cache.set(
        "fresh",
        vec![
            item("https://b.example.com/1"),
            item("https://b.example.com/2"),
            item("https://b.example.com/3"),
        ],
    );

    let all = cache.get_all();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|i| i.link.starts_with("https://b.")));
    assert_eq!(cache.len(), 1);
}

#[test]
fn set_overwrites_and_restamps() {
    let mut cache = FeedCache::new(CacheConfig::with_ttl(Duration::milliseconds(300)));
    cache.set("f1", vec![item("https://a.example.com/old")]);
    std::thread::sleep(std::time::Duration::from_millis(200));
    cache.set("f1", vec![item("https://a.example.com/new")]);
    std::thread::sleep(std::time::Duration::from_millis(200));

    // 400ms after the first write, but only 200ms after the overwrite.
    let entry = cache.get("f1").expect("restamped entry should be fresh");
    assert_eq!(entry.items[0].link, "https://a.example.com/new");
}

#[test]
fn sweep_drops_expired_entries() {
    let mut cache = FeedCache::new(CacheConfig::with_ttl(Duration::milliseconds(40)));
    cache.set("f1", vec![item("https://a.example.com/1")]);
    cache.set("f2", vec![item("https://b.example.com/1")]);
    std::thread::sleep(std::time::Duration::from_millis(60));

    cache.sweep();
    assert!(cache.is_empty());
}

#[test]
fn ttl_profiles_are_distinct() {
    assert_eq!(CacheConfig::per_feed().ttl, Duration::minutes(10));
    assert_eq!(CacheConfig::aggregate().ttl, Duration::minutes(30));
    assert_eq!(CacheConfig::default().ttl, CacheConfig::per_feed().ttl);
}

#[test]
fn newest_insertion_tracks_latest_write() {
    let mut cache = FeedCache::new(CacheConfig::default());
    assert!(cache.newest_insertion().is_none());

    let before = Utc::now();
    cache.set("f1", vec![item("https://a.example.com/1")]);
    let newest = cache.newest_insertion().expect("one write recorded");
    assert!(newest >= before);
}
