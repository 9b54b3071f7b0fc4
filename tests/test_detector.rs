//! Integration tests for the detector facade.
//!
//! Tests cover:
//! - Mapping native model output into labelled detections
//! - Load failure, retry and single initialization under concurrency
//! - Distinguishing "nothing found" from "detection could not run"

mod common;

use std::sync::atomic::Ordering;

use shelfcheck::{Detector, EngineError, ImageRef, RawDetection};

use common::*;

#[test]
fn test_maps_class_ids_to_labels_in_model_order() -> anyhow::Result<()> {
    let image = create_test_image(64, 48);
    let model = ScriptedModel::new().on_width(64, vec![raw(CHIPS, 0.8), raw(SODA, 0.95)]);
    let detector = Detector::new(ScriptedLoader::new(model));

    let detections = detector.detect(&ImageRef::from(image.path()), 0.25)?;

    let labels: Vec<&str> = detections.iter().map(|d| d.label()).collect();
    assert_eq!(labels, vec!["chips", "soda"]);
    assert_eq!(detections[0].bbox().width(), 30.0);
    assert_eq!(detections[0].bbox().height(), 50.0);
    Ok(())
}

#[test]
fn test_threshold_applies_to_mapped_records() -> anyhow::Result<()> {
    let image = create_test_image(64, 48);
    let model = ScriptedModel::new().on_width(64, vec![raw(SODA, 0.3), raw(JUICE, 0.6)]);
    let detector = Detector::new(ScriptedLoader::new(model));

    let detections = detector.detect(&ImageRef::from(image.path()), 0.5)?;

    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].label(), "juice");
    Ok(())
}

#[test]
fn test_no_objects_is_empty_not_error() -> anyhow::Result<()> {
    let image = create_test_image(32, 32);
    let detector = Detector::new(ScriptedLoader::new(ScriptedModel::new()));

    let detections = detector.detect(&ImageRef::from(image.path()), 0.25)?;

    assert!(detections.is_empty());
    Ok(())
}

#[test]
fn test_model_is_loaded_lazily_and_cached() -> anyhow::Result<()> {
    let image = create_test_image(32, 32);
    let loader = ScriptedLoader::new(ScriptedModel::new());
    let loads = loader.loads.clone();
    let detector = Detector::new(loader);

    assert!(!detector.is_loaded());
    assert_eq!(loads.load(Ordering::SeqCst), 0);

    detector.detect(&ImageRef::from(image.path()), 0.25)?;
    detector.detect(&ImageRef::from(image.path()), 0.25)?;

    assert!(detector.is_loaded());
    assert_eq!(loads.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn test_load_failure_is_model_unavailable_and_retried() {
    let image = create_test_image(32, 32);
    let loader = ScriptedLoader::new(ScriptedModel::new()).failing_first(1);
    let loads = loader.loads.clone();
    let detector = Detector::new(loader);

    let result = detector.detect(&ImageRef::from(image.path()), 0.25);
    assert!(
        matches!(result, Err(EngineError::ModelUnavailable { .. })),
        "expected ModelUnavailable, got {:?}",
        result
    );
    assert!(!detector.is_loaded());

    // Next call retries the load and succeeds
    let result = detector.detect(&ImageRef::from(image.path()), 0.25);
    assert!(result.is_ok());
    assert!(detector.is_loaded());
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[test]
fn test_unreadable_image_is_detection_failed() {
    let detector = Detector::new(ScriptedLoader::new(ScriptedModel::new()));

    let missing = ImageRef::Path("/nonexistent/shelf.png".into());
    let result = detector.detect(&missing, 0.25);
    assert!(matches!(result, Err(EngineError::DetectionFailed { .. })));

    let corrupt = ImageRef::Bytes {
        name: "corrupt.png".to_string(),
        data: b"definitely not an image".to_vec(),
    };
    match detector.detect(&corrupt, 0.25) {
        Err(EngineError::DetectionFailed { image, .. }) => assert_eq!(image, "corrupt.png"),
        other => panic!("expected DetectionFailed, got {:?}", other),
    }
}

#[test]
fn test_inference_error_is_detection_failed() {
    let image = create_test_image(40, 40);
    let model = ScriptedModel::new().failing_on_width(40, "out of memory");
    let detector = Detector::new(ScriptedLoader::new(model));

    let err = detector
        .detect(&ImageRef::from(image.path()), 0.25)
        .unwrap_err();
    assert!(matches!(err, EngineError::DetectionFailed { .. }));
    let source = std::error::Error::source(&err).map(|s| s.to_string());
    assert_eq!(source.as_deref(), Some("out of memory"));
}

#[test]
fn test_unknown_class_or_bad_box_is_invalid_detection() {
    let image = create_test_image(50, 50);

    let model = ScriptedModel::new().on_width(50, vec![raw(7, 0.9)]);
    let detector = Detector::new(ScriptedLoader::new(model));
    let result = detector.detect(&ImageRef::from(image.path()), 0.25);
    assert!(matches!(result, Err(EngineError::InvalidDetection(_))));

    let inverted = RawDetection {
        bbox: [40.0, 10.0, 20.0, 30.0],
        class_id: SODA,
        confidence: 0.9,
    };
    let model = ScriptedModel::new().on_width(50, vec![inverted]);
    let detector = Detector::new(ScriptedLoader::new(model));
    let result = detector.detect(&ImageRef::from(image.path()), 0.25);
    assert!(matches!(result, Err(EngineError::InvalidDetection(_))));
}

#[test]
fn test_decodes_image_bytes() -> anyhow::Result<()> {
    let image = create_test_image(64, 20);
    let data = std::fs::read(image.path())?;
    let model = ScriptedModel::new().on_width(64, raws(SODA, 2));
    let detector = Detector::new(ScriptedLoader::new(model));

    let detections = detector.detect(
        &ImageRef::Bytes {
            name: "upload".to_string(),
            data,
        },
        0.25,
    )?;

    assert_eq!(detections.len(), 2);
    Ok(())
}

#[test]
fn test_concurrent_callers_share_one_load() {
    let image = create_test_image(32, 32);
    let model = ScriptedModel::new().on_width(32, raws(SODA, 1));
    let calls = model.calls.clone();
    let loader = ScriptedLoader::new(model);
    let loads = loader.loads.clone();
    let detector = Detector::new(loader);
    let image_ref = ImageRef::from(image.path());

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                let detections = detector.detect(&image_ref, 0.25).unwrap();
                assert_eq!(detections.len(), 1);
            });
        }
    });

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 8);
}
