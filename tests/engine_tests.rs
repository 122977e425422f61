mod common;

use common::{render_unit, strokes_from_reference, zhong_image, FailingStore, CELL, PEN};
use gyeolgu::cancel::{CancelFlag, CancelSignal, NeverCancel};
use gyeolgu::config::Config;
use gyeolgu::error::{AlignmentError, EngineError, ExtractionError};
use gyeolgu::guide::CellFrame;
use gyeolgu::metrics::MetricKind;
use gyeolgu::raster::InkImage;
use gyeolgu::reference::ReferenceCatalog;
use gyeolgu::store::{MemoryStore, SessionQuery, SessionStore};
use gyeolgu::Engine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

fn engine_with(store: Arc<dyn SessionStore>) -> Engine {
    Engine::new(Arc::new(ReferenceCatalog::builtin()), Config::default(), store).unwrap()
}

#[test]
fn test_evaluate_zhong_end_to_end() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(store.clone());

    let ev = engine
        .evaluate(&zhong_image(), "中", None, "zhong.pgm", &NeverCancel)
        .unwrap();
    assert!(ev.saved());
    let r = &ev.result;
    assert_eq!(r.character_id, "中");
    assert_eq!(r.stroke_count, 4);
    assert_eq!(r.metrics.len(), 5);
    assert!(r.final_score > 80.0, "score {}", r.final_score);
    assert!(r.grade.starts_with('A') || r.grade.starts_with('B'), "{}", r.grade);
    assert_eq!(r.improvement, None);
    assert!(r.tips.len() <= 3);

    let stored = store.snapshot().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].result, ev.result);
    assert_eq!(stored[0].image_ref, "zhong.pgm");
}

#[test]
fn test_same_image_same_result() {
    let engine = engine_with(Arc::new(MemoryStore::new()));
    let img = zhong_image();
    let a = engine.evaluate(&img, "中", None, "", &NeverCancel).unwrap();
    let b = engine.evaluate(&img, "中", None, "", &NeverCancel).unwrap();
    assert_eq!(a.result.final_score, b.result.final_score);
    assert_eq!(a.result.metrics, b.result.metrics);
    assert_eq!(a.result.tips, b.result.tips);
    // Only the history-dependent part changes
    assert_eq!(b.result.improvement, Some(0.0));
}

#[test]
fn test_improvement_tracks_previous_attempt() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(store.clone());
    let reference = engine.reference("中").unwrap();
    let frame = CellFrame::from_image(CELL, CELL);

    // A sloppy first attempt: everything pushed to the right
    let mut sloppy = strokes_from_reference(&reference, CELL as f64);
    for s in &mut sloppy {
        for p in &mut s.points {
            p.x += 36.0;
        }
    }
    let first = engine
        .evaluate_strokes("中", &sloppy, &frame, None, "first", &NeverCancel)
        .unwrap();
    let clean = strokes_from_reference(&reference, CELL as f64);
    let second = engine
        .evaluate_strokes("中", &clean, &frame, None, "second", &NeverCancel)
        .unwrap();

    let delta = second.result.improvement.expect("delta");
    assert!(delta > 0.0);
    let expected = ((second.result.final_score - first.result.final_score) * 10.0).round() / 10.0;
    assert_eq!(delta, expected);

    let history = store.query(&SessionQuery::for_character("中")).unwrap();
    assert_eq!(history[0].image_ref, "second");
}

#[test]
fn test_failures_record_nothing() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(store.clone());

    let blank = InkImage::blank(CELL, CELL);
    let err = engine
        .evaluate(&blank, "中", None, "", &NeverCancel)
        .unwrap_err();
    assert!(err.is_retake());
    assert!(matches!(err, EngineError::Extraction(ExtractionError::NoInk)));

    // A single bar is not 中 by any stretch
    let bar = render_unit(CELL, &[&[(0.2, 0.5), (0.8, 0.5)]], PEN);
    let err = engine.evaluate(&bar, "中", None, "", &NeverCancel).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Alignment(AlignmentError::StrokeCountMismatch { .. })
    ));

    let err = engine
        .evaluate(&zhong_image(), "龍", None, "", &NeverCancel)
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownCharacter(_)));

    assert!(store.is_empty());
}

#[test]
fn test_store_failure_still_returns_result() {
    let engine = engine_with(Arc::new(FailingStore));
    let ev = engine
        .evaluate(&zhong_image(), "中", None, "", &NeverCancel)
        .unwrap();
    assert!(!ev.saved());
    assert!(ev.session.is_err());
    assert!(ev.result.final_score > 0.0);
    // History was unreadable, so there is nothing to compare against
    assert_eq!(ev.result.improvement, None);
    assert!(ev.result.metric(MetricKind::Shape).is_some());
}

#[test]
fn test_cancelled_evaluation() {
    let store = Arc::new(MemoryStore::new());
    let engine = engine_with(store.clone());
    let flag = CancelFlag::new();
    flag.cancel();
    let err = engine
        .evaluate(&zhong_image(), "中", None, "", &flag)
        .unwrap_err();
    assert!(err.is_cancelled());
    assert!(store.is_empty());
}

/// Holds the first caller inside the extractor until released.
struct Gate {
    entered: Barrier,
    release: AtomicBool,
}

impl CancelSignal for Gate {
    fn is_cancelled(&self) -> bool {
        if !self.release.swap(true, Ordering::SeqCst) {
            self.entered.wait();
            self.entered.wait();
        }
        false
    }
}

#[test]
fn test_second_caller_is_turned_away() {
    let engine = Arc::new(engine_with(Arc::new(MemoryStore::new())));
    let gate = Arc::new(Gate {
        entered: Barrier::new(2),
        release: AtomicBool::new(false),
    });

    let worker = {
        let engine = Arc::clone(&engine);
        let gate = Arc::clone(&gate);
        thread::spawn(move || {
            engine
                .evaluate(&zhong_image(), "中", None, "", gate.as_ref())
                .map(|ev| ev.result.final_score)
        })
    };

    // The worker is now parked inside its evaluation
    gate.entered.wait();
    let err = engine
        .evaluate(&zhong_image(), "中", None, "", &NeverCancel)
        .unwrap_err();
    assert!(matches!(err, EngineError::Busy));
    gate.entered.wait();

    assert!(worker.join().unwrap().is_ok());
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = Config::default();
    config.weights.weight_center = 0.9;
    let res = Engine::new(
        Arc::new(ReferenceCatalog::builtin()),
        config,
        Arc::new(MemoryStore::new()),
    );
    assert!(matches!(res, Err(EngineError::Config(_))));
}
