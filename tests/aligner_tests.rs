mod common;

use common::strokes_from_reference;
use gyeolgu::aligner::ReferenceAligner;
use gyeolgu::cancel::{CancelFlag, NeverCancel};
use gyeolgu::config::AlignmentParams;
use gyeolgu::error::AlignmentError;
use gyeolgu::extractor::CapturedStroke;
use gyeolgu::geometry::{Point, SimilarityTransform};
use gyeolgu::guide::CellFrame;
use gyeolgu::reference::{Difficulty, ReferenceCatalog, ReferenceCharacter};
use rstest::rstest;
use std::sync::Arc;

const SIZE: f64 = 200.0;

fn zhong() -> Arc<ReferenceCharacter> {
    ReferenceCatalog::builtin().get("中").expect("built-in 中")
}

fn aligner() -> ReferenceAligner {
    ReferenceAligner::new(AlignmentParams::default())
}

fn frame() -> CellFrame {
    CellFrame::from_image(SIZE as usize, SIZE as usize)
}

fn close(a: &Point, b: &Point, tol: f64) -> bool {
    a.dist(b) <= tol
}

#[rstest]
#[case(0, false)]
#[case(1, false)]
#[case(2, true)]
#[case(3, true)]
#[case(4, true)]
#[case(5, true)]
#[case(6, true)]
#[case(7, false)]
fn test_stroke_count_tolerance(#[case] captured: usize, #[case] ok: bool) {
    let reference = zhong();
    let result = aligner().check_count(captured, &reference);
    assert_eq!(result.is_ok(), ok, "captured {}: {:?}", captured, result);
    if let Err(AlignmentError::StrokeCountMismatch {
        expected,
        tolerance,
        ..
    }) = result
    {
        assert_eq!(expected, 4);
        assert_eq!(tolerance, 2);
    }
}

#[test]
fn test_align_rejects_far_off_count() {
    let reference = zhong();
    let strokes = strokes_from_reference(&reference, SIZE);
    let err = aligner()
        .align(&strokes[..1], &frame(), &reference, None, &NeverCancel)
        .unwrap_err();
    assert!(matches!(
        err,
        AlignmentError::StrokeCountMismatch { captured: 1, .. }
    ));
}

#[test]
fn test_recovers_similarity_transform() {
    let reference = zhong();
    // Written smaller, tilted by 5° and shifted
    let written = SimilarityTransform {
        rotation: 5f64.to_radians(),
        scale: 150.0,
        tx: 30.0,
        ty: 20.0,
    };
    let strokes: Vec<CapturedStroke> = reference
        .strokes
        .iter()
        .enumerate()
        .map(|(i, s)| CapturedStroke::from_points(i, written.apply_all(&s.points)))
        .collect();

    let set = aligner()
        .align(&strokes, &frame(), &reference, None, &NeverCancel)
        .unwrap();

    assert!(set.residual < 1e-6, "residual {}", set.residual);
    assert!(set.unmatched_reference.is_empty());
    assert_eq!(set.strokes.len(), 4);
    for s in &set.strokes {
        assert_eq!(s.reference_index, s.index);
        assert!(!s.reversed);
        let target = &reference.strokes[s.reference_index].points;
        assert_eq!(s.registered.len(), target.len());
        for (got, want) in s.registered.iter().zip(target) {
            assert!(close(got, want, 1e-6), "{:?} vs {:?}", got, want);
        }
    }
    // Placed points keep the writer's own position in the cell
    assert!(close(
        &set.strokes[0].placed[0],
        &frame().to_cell(&written.apply(&reference.strokes[0].points[0])),
        1e-9
    ));
}

#[test]
fn test_drawing_order_and_direction_do_not_matter() {
    let reference = zhong();
    let mut strokes = strokes_from_reference(&reference, SIZE);
    // Bottom stroke written right to left, then shuffled
    strokes[2].points.reverse();
    let order = [3usize, 2, 0, 1];
    let shuffled: Vec<CapturedStroke> = order
        .iter()
        .enumerate()
        .map(|(i, &j)| {
            let mut s = strokes[j].clone();
            s.index = i;
            s
        })
        .collect();

    let set = aligner()
        .align(&shuffled, &frame(), &reference, None, &NeverCancel)
        .unwrap();

    for s in &set.strokes {
        assert_eq!(s.reference_index, order[s.index]);
        assert_eq!(s.reversed, order[s.index] == 2);
        // Oriented like the reference
        let want = reference.strokes[s.reference_index].points[0];
        assert!(close(&s.registered[0], &want, 1e-6));
    }
}

#[test]
fn test_missing_stroke_is_reported() {
    let reference = zhong();
    let mut strokes = strokes_from_reference(&reference, SIZE);
    strokes.remove(2);
    for (i, s) in strokes.iter_mut().enumerate() {
        s.index = i;
    }

    let set = aligner()
        .align(&strokes, &frame(), &reference, None, &NeverCancel)
        .unwrap();
    assert_eq!(set.unmatched_reference, vec![2]);
    let refs: Vec<usize> = set.strokes.iter().map(|s| s.reference_index).collect();
    assert_eq!(refs, vec![0, 1, 3]);
}

#[test]
fn test_ink_is_kept_in_image_pixels() {
    let reference = zhong();
    let strokes = strokes_from_reference(&reference, SIZE);
    let set = aligner()
        .align(&strokes, &frame(), &reference, None, &NeverCancel)
        .unwrap();
    assert_eq!(set.ink.len(), strokes.len());
    assert_eq!(set.ink[3], strokes[3].points);
    assert_eq!(set.character_id, "中");
}

#[test]
fn test_empty_reference_is_rejected() {
    let empty = ReferenceCharacter {
        id: "空".to_string(),
        name: "empty".to_string(),
        strokes: Vec::new(),
        expected_strokes: 0,
        difficulty: Difficulty::Beginner,
    };
    let strokes = strokes_from_reference(&zhong(), SIZE);
    let err = aligner()
        .align(&strokes, &frame(), &empty, None, &NeverCancel)
        .unwrap_err();
    assert_eq!(err, AlignmentError::EmptyReference("空".to_string()));
}

#[test]
fn test_cancel_stops_alignment() {
    let reference = zhong();
    let strokes = strokes_from_reference(&reference, SIZE);
    let flag = CancelFlag::new();
    flag.cancel();
    let err = aligner()
        .align(&strokes, &frame(), &reference, None, &flag)
        .unwrap_err();
    assert_eq!(err, AlignmentError::Cancelled);
}
