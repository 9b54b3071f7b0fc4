//! Detector facade: the single seam between image references and the
//! external object-detection model.
//!
//! [`Detector`] owns the model handle. It loads lazily through a
//! [`ModelLoader`], caches the handle for the life of the detector, and maps
//! the model's native output ([`RawDetection`]) into validated
//! [`Detection`] records.

pub mod annotate;
pub mod preprocessing;
pub mod yolo;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::models::{BoundingBox, Detection};

pub use yolo::{YoloLoader, YoloModel};

/// Native model output for one object
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    /// `[x1, y1, x2, y2]` in source image pixels
    pub bbox: [f32; 4],
    pub class_id: usize,
    pub confidence: f32,
}

/// The external detection collaborator.
///
/// Implementations are shared across threads; one that cannot run
/// concurrently must serialize `infer` internally.
pub trait DetectionModel: Send + Sync {
    fn infer(&self, image: &DynamicImage, confidence_threshold: f32)
        -> anyhow::Result<Vec<RawDetection>>;

    /// Class names indexed by class id
    fn class_names(&self) -> &[String];
}

/// Produces a [`DetectionModel`] on first use
pub trait ModelLoader {
    type Model: DetectionModel;

    fn load(&self) -> anyhow::Result<Self::Model>;

    /// Human-readable identity of the model, used in errors and logs
    fn describe(&self) -> String;
}

/// Image handed to the detector
#[derive(Debug, Clone)]
pub enum ImageRef {
    Path(PathBuf),
    Bytes { name: String, data: Vec<u8> },
}

impl ImageRef {
    pub fn name(&self) -> String {
        match self {
            ImageRef::Path(path) => path.display().to_string(),
            ImageRef::Bytes { name, .. } => name.clone(),
        }
    }

    /// Decode to pixels; failures are reported as [`EngineError::DetectionFailed`]
    pub fn load(&self) -> Result<DynamicImage> {
        let decoded = match self {
            ImageRef::Path(path) => image::open(path),
            ImageRef::Bytes { data, .. } => image::load_from_memory(data),
        };
        decoded.map_err(|e| EngineError::detection_failed(self.name(), e))
    }
}

impl From<PathBuf> for ImageRef {
    fn from(path: PathBuf) -> Self {
        ImageRef::Path(path)
    }
}

impl From<&Path> for ImageRef {
    fn from(path: &Path) -> Self {
        ImageRef::Path(path.to_path_buf())
    }
}

pub struct Detector<L: ModelLoader> {
    loader: L,
    model: Mutex<Option<Arc<L::Model>>>,
}

impl<L: ModelLoader> std::fmt::Debug for Detector<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("model", &self.loader.describe())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl<L: ModelLoader> Detector<L> {
    /// Create an unloaded detector; nothing is loaded until the first call
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            model: Mutex::new(None),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Load the model now instead of on the first detection
    pub fn preload(&self) -> Result<()> {
        self.model().map(|_| ())
    }

    /// Return the cached handle, loading it if needed.
    ///
    /// The lock is held across the load so only one caller initializes;
    /// a failed load leaves the slot empty for the next caller to retry.
    fn model(&self) -> Result<Arc<L::Model>> {
        let mut slot = self.model.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(model) = slot.as_ref() {
            return Ok(Arc::clone(model));
        }

        let description = self.loader.describe();
        info!(model = %description, "loading detection model");
        let model = self.loader.load().map_err(|e| {
            warn!(model = %description, error = %e, "detection model failed to load");
            EngineError::model_unavailable(description.clone(), e)
        })?;

        let model = Arc::new(model);
        *slot = Some(Arc::clone(&model));
        info!(model = %description, "detection model loaded");
        Ok(model)
    }

    /// Detect objects in `image`, dropping those below `confidence_threshold`.
    ///
    /// Records are returned in model order. An empty vector means the model
    /// ran and found nothing.
    pub fn detect(&self, image: &ImageRef, confidence_threshold: f32) -> Result<Vec<Detection>> {
        let model = self.model()?;
        let pixels = image.load()?;
        run_model(model.as_ref(), &image.name(), &pixels, confidence_threshold)
    }

    /// Same as [`Detector::detect`] for an already decoded image
    pub fn detect_image(
        &self,
        name: &str,
        image: &DynamicImage,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>> {
        let model = self.model()?;
        run_model(model.as_ref(), name, image, confidence_threshold)
    }
}

fn run_model<M: DetectionModel + ?Sized>(
    model: &M,
    name: &str,
    image: &DynamicImage,
    confidence_threshold: f32,
) -> Result<Vec<Detection>> {
    debug!(image = name, width = image.width(), height = image.height(), "running detection");
    let raw = model
        .infer(image, confidence_threshold)
        .map_err(|e| EngineError::detection_failed(name, e))?;

    let names = model.class_names();
    let mut detections = Vec::with_capacity(raw.len());
    for item in raw {
        let detection = to_detection(names, item)?;
        if detection.confidence() >= confidence_threshold {
            detections.push(detection);
        }
    }

    info!(image = name, count = detections.len(), "detection complete");
    Ok(detections)
}

fn to_detection(names: &[String], raw: RawDetection) -> Result<Detection> {
    let label = names
        .get(raw.class_id)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| {
            EngineError::InvalidDetection(format!(
                "class index {} has no name in the model's table of {} classes",
                raw.class_id,
                names.len()
            ))
        })?;
    let [x1, y1, x2, y2] = raw.bbox;
    Detection::new(label.clone(), raw.confidence, BoundingBox::new(x1, y1, x2, y2)?)
}
