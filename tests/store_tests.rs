mod common;

use chrono::{DateTime, Duration, TimeZone, Utc};
use common::mock_scores;
use gyeolgu::config::{GradingParams, ScoringWeights};
use gyeolgu::grader::{EvaluationResult, Grader};
use gyeolgu::reference::Difficulty;
use gyeolgu::store::{JsonlStore, MemoryStore, SessionQuery, SessionStore};
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use std::thread;

fn result_for(character: &str, previous: Option<f64>) -> EvaluationResult {
    Grader::new(ScoringWeights::default(), &GradingParams::default())
        .unwrap()
        .grade(character, Difficulty::Beginner, 4, mock_scores(), previous)
        .unwrap()
}

fn scored(character: &str, score: f64) -> EvaluationResult {
    let mut r = result_for(character, None);
    r.final_score = score;
    r
}

fn day(d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap()
}

#[test]
fn test_query_filters_and_orders_newest_first() {
    let store = MemoryStore::new();
    let a = store.record_at(&scored("中", 70.0), "a.pgm", day(1, 9)).unwrap();
    let _ = store.record_at(&scored("十", 80.0), "b.pgm", day(1, 10)).unwrap();
    let c = store.record_at(&scored("中", 75.0), "c.pgm", day(2, 9)).unwrap();
    let d = store.record_at(&scored("中", 78.0), "d.pgm", day(3, 9)).unwrap();

    let hits = store.query(&SessionQuery::for_character("中")).unwrap();
    let ids: Vec<_> = hits.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![d, c, a]);

    let page = store
        .query(&SessionQuery::for_character("中").page(1, 1))
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, c);

    let window = store
        .query(&SessionQuery::all().between(Some(day(1, 10)), Some(day(3, 0))))
        .unwrap();
    let images: Vec<&str> = window.iter().map(|s| s.image_ref.as_str()).collect();
    assert_eq!(images, vec!["c.pgm", "b.pgm"]);
}

#[test]
fn test_latest_for_character() {
    let store = MemoryStore::new();
    assert!(store.latest_for("中").unwrap().is_none());
    store.record_at(&scored("中", 60.0), "", day(1, 9)).unwrap();
    store.record_at(&scored("中", 65.0), "", day(2, 9)).unwrap();
    store.record_at(&scored("十", 99.0), "", day(3, 9)).unwrap();
    let latest = store.latest_for("中").unwrap().unwrap();
    assert_eq!(latest.result.final_score, 65.0);
}

#[test]
fn test_aggregate_stats() {
    let store = MemoryStore::new();
    assert_eq!(store.aggregate(None).unwrap().count, 0);
    assert_eq!(store.aggregate(None).unwrap().average, None);

    store.record_at(&scored("中", 70.0), "", day(1, 9)).unwrap();
    store.record_at(&scored("中", 81.0), "", day(3, 9)).unwrap();
    store.record_at(&scored("中", 76.0), "", day(4, 21)).unwrap();
    store.record_at(&scored("十", 90.0), "", day(5, 8)).unwrap();

    let zhong = store.aggregate(Some("中")).unwrap();
    assert_eq!(zhong.count, 3);
    assert_eq!(zhong.average, Some(75.7));
    assert_eq!(zhong.best, Some(81.0));
    assert_eq!(zhong.streak_days, 2);

    let all = store.aggregate(None).unwrap();
    assert_eq!(all.count, 4);
    assert_eq!(all.best, Some(90.0));
    assert_eq!(all.streak_days, 3);
}

#[test]
fn test_concurrent_records_get_distinct_ids() {
    let store = Arc::new(MemoryStore::new());
    let mut handles = Vec::new();
    for t in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            (0..25)
                .map(|i| {
                    store
                        .record(&scored("中", 50.0 + i as f64), &format!("{}-{}", t, i))
                        .unwrap()
                })
                .collect::<Vec<_>>()
        }));
    }
    let ids: Vec<_> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let unique: HashSet<_> = ids.iter().collect();
    assert_eq!(unique.len(), 200);
    assert_eq!(store.len(), 200);
}

#[test]
fn test_jsonl_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history").join("sessions.jsonl");

    let first = {
        let store = JsonlStore::open(&path).unwrap();
        let id = store
            .record_at(&result_for("中", None), "one.pgm", day(1, 9))
            .unwrap();
        store
            .record_at(&result_for("中", Some(76.2)), "two.pgm", day(2, 9))
            .unwrap();
        id
    };

    let store = JsonlStore::open(&path).unwrap();
    let all = store.snapshot().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].id, first);
    assert_eq!(all[0].result, result_for("中", None));
    assert_eq!(all[1].result.improvement, Some(0.0));

    // Ids keep counting after a reopen
    let third = store.record(&result_for("十", None), "three.pgm").unwrap();
    assert!(third > all[1].id);
}

#[test]
fn test_jsonl_drops_torn_last_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.jsonl");
    {
        let store = JsonlStore::open(&path).unwrap();
        store.record_at(&scored("中", 70.0), "a", day(1, 9)).unwrap();
        store.record_at(&scored("中", 71.0), "b", day(2, 9)).unwrap();
    }
    // Crash halfway through the third append
    {
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        write!(f, "{{\"id\":3,\"timestamp\":\"2024-03-0").unwrap();
    }

    let store = JsonlStore::open(&path).unwrap();
    assert_eq!(store.snapshot().unwrap().len(), 2);
    let id = store.record_at(&scored("中", 72.0), "c", day(3, 9)).unwrap();
    assert_eq!(id.0, 3);
    drop(store);

    let reopened = JsonlStore::open(&path).unwrap();
    let scores: Vec<f64> = reopened
        .snapshot()
        .unwrap()
        .iter()
        .map(|s| s.result.final_score)
        .collect();
    assert_eq!(scores, vec![70.0, 71.0, 72.0]);
}

#[test]
fn test_jsonl_keeps_last_entry_missing_newline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.jsonl");
    {
        let store = JsonlStore::open(&path).unwrap();
        store.record_at(&scored("中", 70.0), "a", day(1, 9)).unwrap();
        store.record_at(&scored("中", 71.0), "b", day(2, 9)).unwrap();
    }
    // Lose only the final newline
    let mut bytes = std::fs::read(&path).unwrap();
    assert_eq!(bytes.pop(), Some(b'\n'));
    std::fs::write(&path, &bytes).unwrap();

    let store = JsonlStore::open(&path).unwrap();
    assert_eq!(store.snapshot().unwrap().len(), 2);
    let id = store.record_at(&scored("中", 72.0), "c", day(3, 9)).unwrap();
    assert_eq!(id.0, 3);
    drop(store);

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 3);
    assert!(content.ends_with('\n'));
    let reopened = JsonlStore::open(&path).unwrap();
    let images: Vec<String> = reopened
        .snapshot()
        .unwrap()
        .into_iter()
        .map(|s| s.image_ref)
        .collect();
    assert_eq!(images, vec!["a", "b", "c"]);
}

#[test]
fn test_jsonl_rejects_corrupt_middle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.jsonl");
    {
        let store = JsonlStore::open(&path).unwrap();
        store.record_at(&scored("中", 70.0), "a", day(1, 9)).unwrap();
    }
    {
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "not json").unwrap();
    }
    {
        let store = JsonlStore::open(&path);
        // A damaged final line is tolerated
        assert!(store.is_ok());
    }
    {
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(f, "garbage in the middle").unwrap();
        writeln!(f, "{{}}").unwrap();
    }
    assert!(JsonlStore::open(&path).is_err());
}

#[test]
fn test_jsonl_concurrent_appends_stay_line_delimited() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.jsonl");
    let store = Arc::new(JsonlStore::open(&path).unwrap());

    let start = day(10, 0);
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..10 {
                    let at = start + Duration::minutes((t * 10 + i) as i64);
                    store.record_at(&scored("中", 60.0), "", at).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    drop(store);

    let reopened = JsonlStore::open(&path).unwrap();
    let sessions = reopened.snapshot().unwrap();
    assert_eq!(sessions.len(), 40);
    let ids: HashSet<u64> = sessions.iter().map(|s| s.id.0).collect();
    assert_eq!(ids.len(), 40);
}
