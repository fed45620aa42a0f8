mod common;

use common::det;
use snapscan::engine::yolo::{apply_threshold, sort_detections};

#[test]
fn ordered_by_descending_confidence() {
    let mut detections = vec![det("cat", 0.3, 5), det("dog", 0.9, 1), det("car", 0.6, 3)];
    sort_detections(&mut detections);

    let confidences: Vec<f32> = detections.iter().map(|d| d.confidence).collect();
    assert_eq!(confidences, vec![0.9, 0.6, 0.3]);
}

#[test]
fn confidence_ties_break_by_label_then_x() {
    let mut detections = vec![
        det("dog", 0.5, 40),
        det("cat", 0.5, 30),
        det("cat", 0.5, 10),
        det("cat", 0.8, 99),
    ];
    sort_detections(&mut detections);

    assert_eq!(detections[0].label, "cat");
    assert_eq!(detections[0].confidence, 0.8);
    // Tied at 0.5: cat before dog, lower x first within cat.
    assert_eq!(
        detections[1..]
            .iter()
            .map(|d| (d.label.as_str(), d.bbox.x))
            .collect::<Vec<_>>(),
        vec![("cat", 10), ("cat", 30), ("dog", 40)]
    );
}

#[test]
fn threshold_filters_everything_below() {
    let detections = vec![det("a", 0.2, 0), det("b", 0.25, 0), det("c", 0.7, 0)];

    let kept = apply_threshold(detections, 0.25);
    assert_eq!(kept.len(), 2);
    assert!(kept.iter().all(|d| d.confidence >= 0.25));
}

#[test]
fn raising_threshold_never_adds_detections() {
    let detections = vec![
        det("a", 0.1, 0),
        det("b", 0.3, 0),
        det("c", 0.5, 0),
        det("d", 0.7, 0),
        det("e", 0.9, 0),
    ];

    let mut previous = detections.len();
    for threshold in [0.0, 0.2, 0.4, 0.6, 0.8, 1.0] {
        let kept = apply_threshold(detections.clone(), threshold);
        assert!(kept.len() <= previous);
        assert!(kept.iter().all(|d| d.confidence >= threshold));
        previous = kept.len();
    }
}
