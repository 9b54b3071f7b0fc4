use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, ImageBuffer, Rgb};
use shelfcheck::core::db::CatalogDb;
use shelfcheck::{
    BoundingBox, Detection, DetectionModel, LabelMultiset, ModelLoader, RawDetection, aggregate,
};
use tempfile::NamedTempFile;

pub const CLASS_NAMES: [&str; 3] = ["soda", "chips", "juice"];
pub const SODA: usize = 0;
pub const CHIPS: usize = 1;
pub const JUICE: usize = 2;

/// Creates a solid grey PNG of the given size and returns the temp file.
/// The file will be automatically cleaned up when dropped.
pub fn create_test_image(width: u32, height: u32) -> NamedTempFile {
    let img = ImageBuffer::from_fn(width, height, |_, _| Rgb([128u8, 128u8, 128u8]));
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// Creates a CatalogDb in a temporary directory (which must be kept alive).
pub async fn create_test_catalog() -> (CatalogDb, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("catalog.db");
    let catalog = CatalogDb::open(&path)
        .await
        .expect("Failed to create test catalog");
    (catalog, dir)
}

pub fn det(label: &str, confidence: f32) -> Detection {
    Detection::new(label, confidence, BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap()).unwrap()
}

/// Multiset with `count` confident detections per label
pub fn multiset(counts: &[(&str, usize)]) -> LabelMultiset {
    let detections = counts
        .iter()
        .flat_map(|&(label, count)| std::iter::repeat_with(move || det(label, 0.9)).take(count));
    aggregate(detections, 0.0)
}

pub fn raw(class_id: usize, confidence: f32) -> RawDetection {
    RawDetection {
        bbox: [10.0, 10.0, 40.0, 60.0],
        class_id,
        confidence,
    }
}

pub fn raws(class_id: usize, count: usize) -> Vec<RawDetection> {
    (0..count).map(|_| raw(class_id, 0.9)).collect()
}

/// Test double for the detection model.
/// Outputs are keyed by image width so one model can serve several images.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    outputs: HashMap<u32, Result<Vec<RawDetection>, String>>,
    pub calls: Arc<AtomicUsize>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_width(mut self, width: u32, detections: Vec<RawDetection>) -> Self {
        self.outputs.insert(width, Ok(detections));
        self
    }

    pub fn failing_on_width(mut self, width: u32, message: &str) -> Self {
        self.outputs.insert(width, Err(message.to_string()));
        self
    }
}

impl DetectionModel for ScriptedModel {
    fn infer(
        &self,
        image: &DynamicImage,
        confidence_threshold: f32,
    ) -> anyhow::Result<Vec<RawDetection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outputs.get(&image.width()) {
            Some(Ok(detections)) => Ok(detections
                .iter()
                .filter(|d| d.confidence >= confidence_threshold)
                .cloned()
                .collect()),
            Some(Err(message)) => Err(anyhow::anyhow!("{}", message)),
            None => Ok(Vec::new()),
        }
    }

    fn class_names(&self) -> &[String] {
        static NAMES: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        NAMES.get_or_init(|| CLASS_NAMES.iter().map(|s| s.to_string()).collect())
    }
}

/// Loader that counts loads and fails the first `failures` attempts
pub struct ScriptedLoader {
    model: ScriptedModel,
    failures: AtomicUsize,
    pub loads: Arc<AtomicUsize>,
}

impl ScriptedLoader {
    pub fn new(model: ScriptedModel) -> Self {
        Self {
            model,
            failures: AtomicUsize::new(0),
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_first(self, failures: usize) -> Self {
        self.failures.store(failures, Ordering::SeqCst);
        self
    }
}

impl ModelLoader for ScriptedLoader {
    type Model = ScriptedModel;

    fn load(&self) -> anyhow::Result<ScriptedModel> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            anyhow::bail!("weights file is corrupt");
        }
        Ok(self.model.clone())
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}
