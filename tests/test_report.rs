mod common;

use std::path::Path;

use common::{FailingDetector, StubDetector, det, write_test_image};
use snapscan::report::{analyze, load_report};

#[test]
fn analyze_persists_report_and_annotated_image() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let image_path = dir.path().join("screen.png");
    write_test_image(&image_path)?;
    let output_dir = dir.path().join("out");

    let detector = StubDetector {
        detections: vec![det("person", 0.9, 5), det("laptop", 0.6, 20)],
    };
    let result = analyze(&image_path, &detector, 0.25, &output_dir);

    assert!(result.success);
    assert_eq!(result.objects_count, 2);
    assert_eq!(result.objects_count, result.detections.len());
    assert!(result.message.is_none());

    let annotated = result.visual_feedback.as_deref().expect("annotated image");
    assert!(annotated.exists());
    assert!(annotated.to_string_lossy().ends_with("screen_annotated.png"));
    let report_path = result.report_path.as_deref().expect("report path");
    assert!(report_path.exists());
    Ok(())
}

#[test]
fn report_round_trips_ordered_detections() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let image_path = dir.path().join("screen.png");
    write_test_image(&image_path)?;

    let detector = StubDetector {
        detections: vec![
            det("person", 0.9, 5),
            det("cat", 0.6, 10),
            det("cat", 0.6, 30),
            det("dog", 0.4, 7),
        ],
    };
    let result = analyze(&image_path, &detector, 0.25, dir.path());

    let reloaded = load_report(result.report_path.as_deref().expect("report path"))?;
    assert_eq!(reloaded.detections, result.detections);
    assert_eq!(reloaded.objects_count, result.objects_count);
    Ok(())
}

#[test]
fn analyze_missing_image_fails_as_data() {
    let dir = tempfile::TempDir::new().expect("tempdir");

    let detector = StubDetector {
        detections: vec![det("person", 0.9, 5)],
    };
    let result = analyze(
        Path::new("/nonexistent/screen.png"),
        &detector,
        0.25,
        dir.path(),
    );

    assert!(!result.success);
    assert_eq!(result.objects_count, 0);
    assert!(result.detections.is_empty());
    assert!(
        result
            .message
            .as_deref()
            .unwrap_or_default()
            .contains("invalid image")
    );
}

#[test]
fn engine_failure_becomes_failed_result() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let image_path = dir.path().join("screen.png");
    write_test_image(&image_path)?;

    let result = analyze(&image_path, &FailingDetector, 0.25, dir.path());

    assert!(!result.success);
    assert_eq!(result.objects_count, 0);
    assert!(
        result
            .message
            .as_deref()
            .unwrap_or_default()
            .contains("inference")
    );
    Ok(())
}

#[test]
fn zero_detections_skip_annotated_image() -> anyhow::Result<()> {
    let dir = tempfile::TempDir::new()?;
    let image_path = dir.path().join("screen.png");
    write_test_image(&image_path)?;

    let detector = StubDetector { detections: vec![] };
    let result = analyze(&image_path, &detector, 0.25, dir.path());

    assert!(result.success);
    assert_eq!(result.objects_count, 0);
    assert!(result.visual_feedback.is_none());
    Ok(())
}
