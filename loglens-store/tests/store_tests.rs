use chrono::{DateTime, Duration, TimeZone, Utc};
use loglens_core::record::{NewRecord, RecordId};
use loglens_store::{FileStore, FileStoreOptions, MemoryStore, RecordStore, TimeRange};
use std::sync::Arc;
use tempfile::tempdir;

// ── Helpers ───────────────────────────────────────────────────

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn at(minute: i64) -> DateTime<Utc> {
    base() + Duration::minutes(minute)
}

fn record(minute: i64, service: &str, status: u16) -> NewRecord {
    NewRecord {
        timestamp: at(minute),
        timestamp_inferred: false,
        service: service.to_string(),
        client_ip: "192.0.2.1".to_string(),
        method: "GET".to_string(),
        path: format!("/{service}"),
        status,
        duration_ms: minute as f64 * 0.5,
        raw: format!(r#"{{"RouterName":"{service}","DownstreamStatus":{status}}}"#),
    }
}

fn stores() -> Vec<(&'static str, Arc<dyn RecordStore>, tempfile::TempDir)> {
    let dir = tempdir().unwrap();
    let file: Arc<dyn RecordStore> =
        Arc::new(FileStore::open(dir.path().join("records.jsonl"), FileStoreOptions::default()).unwrap());
    let mem: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    vec![("file", file, dir), ("memory", mem, tempdir().unwrap())]
}

// ── Ids ───────────────────────────────────────────────────────

#[test]
fn append_assigns_monotonic_unique_ids() {
    for (name, store, _dir) in stores() {
        let ids: Vec<RecordId> = (0..5)
            .map(|i| store.append(record(i, "svc", 200)).unwrap())
            .collect();
        assert_eq!(
            ids,
            vec![RecordId(1), RecordId(2), RecordId(3), RecordId(4), RecordId(5)],
            "{name}"
        );
        assert_eq!(store.len().unwrap(), 5, "{name}");
    }
}

#[test]
fn empty_store_answers_empty() {
    for (name, store, _dir) in stores() {
        assert_eq!(store.len().unwrap(), 0, "{name}");
        assert!(store.query(&TimeRange::all(), None).unwrap().is_empty(), "{name}");
        assert!(store.list_recent(10).unwrap().is_empty(), "{name}");
    }
}

// ── Range queries ─────────────────────────────────────────────

#[test]
fn query_from_start_returns_later_records_ascending() {
    for (name, store, _dir) in stores() {
        // inserted out of timestamp order on purpose
        store.append(record(3, "c", 200)).unwrap();
        store.append(record(1, "a", 200)).unwrap();
        store.append(record(2, "b", 500)).unwrap();

        let rows = store.query(&TimeRange::since(at(2)), None).unwrap();
        let services: Vec<&str> = rows.iter().map(|r| r.service.as_str()).collect();
        assert_eq!(services, vec!["b", "c"], "{name}");
        assert_eq!(rows[0].timestamp, at(2));
        assert_eq!(rows[0].status, 500);
    }
}

#[test]
fn query_with_both_bounds_is_inclusive() {
    for (name, store, _dir) in stores() {
        for m in 0..10 {
            store.append(record(m, "svc", 200)).unwrap();
        }
        let rows = store
            .query(&TimeRange::new(Some(at(3)), Some(at(6))), None)
            .unwrap();
        let stamps: Vec<DateTime<Utc>> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![at(3), at(4), at(5), at(6)], "{name}");
    }
}

#[test]
fn query_until_end_excludes_later_records() {
    for (name, store, _dir) in stores() {
        for m in 0..4 {
            store.append(record(m, "svc", 200)).unwrap();
        }
        let rows = store.query(&TimeRange::until(at(1)), None).unwrap();
        assert_eq!(rows.len(), 2, "{name}");
        assert!(rows.iter().all(|r| r.timestamp <= at(1)));
    }
}

#[test]
fn inverted_range_returns_nothing() {
    for (name, store, _dir) in stores() {
        store.append(record(5, "svc", 200)).unwrap();
        let rows = store
            .query(&TimeRange::new(Some(at(9)), Some(at(1))), None)
            .unwrap();
        assert!(rows.is_empty(), "{name}");
    }
}

#[test]
fn query_limit_keeps_earliest_rows() {
    for (name, store, _dir) in stores() {
        for m in 0..6 {
            store.append(record(m, "svc", 200)).unwrap();
        }
        let rows = store.query(&TimeRange::all(), Some(2)).unwrap();
        let stamps: Vec<DateTime<Utc>> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![at(0), at(1)], "{name}");
    }
}

#[test]
fn same_timestamp_records_keep_insertion_order() {
    for (name, store, _dir) in stores() {
        store.append(record(1, "first", 200)).unwrap();
        store.append(record(1, "second", 200)).unwrap();
        let rows = store.query(&TimeRange::all(), None).unwrap();
        assert_eq!(rows[0].service, "first", "{name}");
        assert_eq!(rows[1].service, "second", "{name}");

        let recent = store.list_recent(2).unwrap();
        assert_eq!(recent[0].service, "second", "{name}");
    }
}

#[test]
fn query_is_idempotent() {
    for (name, store, _dir) in stores() {
        for m in [4, 2, 8, 6] {
            store.append(record(m, "svc", 200)).unwrap();
        }
        let range = TimeRange::since(at(3));
        let first = store.query(&range, None).unwrap();
        let second = store.query(&range, None).unwrap();
        assert_eq!(first, second, "{name}");
    }
}

// ── Recent listing ────────────────────────────────────────────

#[test]
fn list_recent_returns_newest_first_full_records() {
    for (name, store, _dir) in stores() {
        for m in 0..5 {
            store.append(record(m, &format!("s{m}"), 200 + m as u16)).unwrap();
        }
        let recent = store.list_recent(2).unwrap();
        assert_eq!(recent.len(), 2, "{name}");
        assert_eq!(recent[0].timestamp, at(4));
        assert_eq!(recent[1].timestamp, at(3));
        assert_eq!(recent[0].service, "s4");
        assert_eq!(recent[0].path, "/s4");
        assert_eq!(recent[0].client_ip, "192.0.2.1");
        assert_eq!(recent[0].raw, r#"{"RouterName":"s4","DownstreamStatus":204}"#);
    }
}

#[test]
fn list_recent_with_large_limit_returns_everything() {
    for (name, store, _dir) in stores() {
        for m in 0..3 {
            store.append(record(m, "svc", 200)).unwrap();
        }
        assert_eq!(store.list_recent(100).unwrap().len(), 3, "{name}");
    }
}

// ── Durability ────────────────────────────────────────────────

#[test]
fn file_store_survives_reopen_and_resumes_ids() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("records.jsonl");
    {
        let store = FileStore::open(&path, FileStoreOptions::default()).unwrap();
        store.append(record(1, "a", 200)).unwrap();
        store.append(record(2, "b", 404)).unwrap();
    }

    let store = FileStore::open(&path, FileStoreOptions::default()).unwrap();
    assert_eq!(store.len().unwrap(), 2);
    let recent = store.list_recent(1).unwrap();
    assert_eq!(recent[0].id, RecordId(2));
    assert_eq!(recent[0].status, 404);

    let id = store.append(record(3, "c", 200)).unwrap();
    assert_eq!(id, RecordId(3));
}

#[test]
fn reopened_file_store_answers_queries_from_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("records.jsonl");
    {
        let store = FileStore::open(&path, FileStoreOptions::default()).unwrap();
        for m in [5, 1, 3] {
            store.append(record(m, &format!("s{m}"), 200 + m as u16)).unwrap();
        }
    }

    let store = FileStore::open(&path, FileStoreOptions::default()).unwrap();
    let rows = store.query(&TimeRange::since(at(2)), None).unwrap();
    let services: Vec<&str> = rows.iter().map(|r| r.service.as_str()).collect();
    assert_eq!(services, vec!["s3", "s5"]);
    assert_eq!(rows[0].status, 203);
    assert_eq!(rows[1].duration_ms, 2.5);

    let recent = store.list_recent(2).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].id, RecordId(1));
    assert_eq!(recent[0].timestamp, at(5));
    assert_eq!(recent[0].path, "/s5");
    assert_eq!(recent[0].raw, r#"{"RouterName":"s5","DownstreamStatus":205}"#);
    assert_eq!(recent[1].id, RecordId(3));

    // records appended after reopen sit beside the replayed ones
    store.append(record(4, "s4", 204)).unwrap();
    let all = store.query(&TimeRange::all(), None).unwrap();
    let stamps: Vec<DateTime<Utc>> = all.iter().map(|r| r.timestamp).collect();
    assert_eq!(stamps, vec![at(1), at(3), at(4), at(5)]);
}

#[test]
fn file_store_drops_torn_tail_and_appends_cleanly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("records.jsonl");
    {
        let store = FileStore::open(&path, FileStoreOptions::default()).unwrap();
        store.append(record(1, "a", 200)).unwrap();
    }
    // Simulate a crash in the middle of writing the next record
    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str(r#"{"id":2,"timestamp":"2024-01"#);
    std::fs::write(&path, content).unwrap();

    let store = FileStore::open(&path, FileStoreOptions::default()).unwrap();
    assert_eq!(store.len().unwrap(), 1);
    store.append(record(2, "b", 200)).unwrap();
    drop(store);

    let reopened = FileStore::open(&path, FileStoreOptions::default()).unwrap();
    assert_eq!(reopened.len().unwrap(), 2);
    let lines = std::fs::read_to_string(&path).unwrap();
    assert_eq!(lines.lines().count(), 2);
}

#[test]
fn file_store_skips_malformed_complete_lines() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("records.jsonl");
    {
        let store = FileStore::open(&path, FileStoreOptions::default()).unwrap();
        store.append(record(1, "a", 200)).unwrap();
    }
    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str("garbage line\n\n");
    std::fs::write(&path, content).unwrap();

    let store = FileStore::open(&path, FileStoreOptions::default()).unwrap();
    assert_eq!(store.len().unwrap(), 1);
    assert_eq!(store.append(record(2, "b", 200)).unwrap(), RecordId(2));
}

#[test]
fn file_store_preserves_inferred_flag_and_fractional_duration() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("records.jsonl");
    let mut rec = record(1, "a", 200);
    rec.timestamp_inferred = true;
    rec.duration_ms = 0.123456;
    {
        let store = FileStore::open(&path, FileStoreOptions::default()).unwrap();
        store.append(rec).unwrap();
    }
    let store = FileStore::open(&path, FileStoreOptions::default()).unwrap();
    let back = &store.list_recent(1).unwrap()[0];
    assert!(back.timestamp_inferred);
    assert_eq!(back.duration_ms, 0.123456);
}

// ── Concurrency ───────────────────────────────────────────────

#[test]
fn concurrent_appends_and_queries_stay_consistent() {
    for (name, store, _dir) in stores() {
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for m in 0..200 {
                    store.append(record(m, "svc", 200)).unwrap();
                }
            })
        };
        let reader = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for _ in 0..50 {
                    let rows = store.query(&TimeRange::all(), None).unwrap();
                    // every visible prefix is complete and ordered
                    assert!(rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
                }
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(store.len().unwrap(), 200, "{name}");
    }
}
