use std::path::Path;

use anyhow::{Context, anyhow};
use image::DynamicImage;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use tracing::debug;

use crate::config::ModelConfig;
use crate::detection::preprocessing::{self, Letterbox};
use crate::detection::{DetectionModel, ModelLoader, RawDetection};

/// YOLOv8-style detector running on rten.
pub struct YoloModel {
    model: Model,
    class_names: Vec<String>,
    input_size: u32,
    iou_threshold: f32,
}

impl YoloModel {
    pub fn load(config: &ModelConfig) -> anyhow::Result<Self> {
        if !config.model_path.is_file() {
            anyhow::bail!("Model file not found: {}", config.model_path.display());
        }
        let model = Model::load_file(&config.model_path)
            .with_context(|| format!("Failed to load model {:?}", config.model_path))?;
        let class_names = load_labels(&config.labels_path)?;

        Ok(Self {
            model,
            class_names,
            input_size: config.input_size,
            iou_threshold: config.iou_threshold,
        })
    }
}

impl DetectionModel for YoloModel {
    fn infer(
        &self,
        image: &DynamicImage,
        confidence_threshold: f32,
    ) -> anyhow::Result<Vec<RawDetection>> {
        let (canvas, geometry) = preprocessing::letterbox(image, self.input_size);
        let size = self.input_size as usize;
        let input = NdTensor::from_data([1, 3, size, size], preprocessing::to_chw(&canvas));

        let output: NdTensor<f32, 3> = self
            .model
            .run_one(input.view().into(), None)?
            .try_into()
            .map_err(|e| anyhow!("Model output is not a rank-3 f32 tensor: {}", e))?;

        let shape = output.shape();
        let (rows, cols) = (shape[1], shape[2]);
        let data: Vec<f32> = output.iter().copied().take(rows * cols).collect();
        debug!(rows, cols, "decoding model output");

        let candidates = decode_output(&data, rows, cols, &geometry, confidence_threshold)?;
        Ok(non_max_suppression(candidates, self.iou_threshold))
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

/// Loads [`YoloModel`] from a [`ModelConfig`]
#[derive(Debug, Clone)]
pub struct YoloLoader {
    config: ModelConfig,
}

impl YoloLoader {
    pub fn new(config: ModelConfig) -> Self {
        Self { config }
    }
}

impl ModelLoader for YoloLoader {
    type Model = YoloModel;

    fn load(&self) -> anyhow::Result<YoloModel> {
        YoloModel::load(&self.config)
    }

    fn describe(&self) -> String {
        self.config.model_path.display().to_string()
    }
}

/// Read a class-name table, one name per line
pub fn load_labels(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read labels file {:?}", path))?;
    let labels: Vec<String> = content
        .lines()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect();

    if labels.is_empty() {
        anyhow::bail!("Labels file {:?} contains no class names", path);
    }
    Ok(labels)
}

/// Decode a `[4 + classes, anchors]` (or transposed) prediction matrix.
///
/// Boxes are centre/size in network input pixels; the best class score is the confidence.
fn decode_output(
    data: &[f32],
    rows: usize,
    cols: usize,
    geometry: &Letterbox,
    confidence_threshold: f32,
) -> anyhow::Result<Vec<RawDetection>> {
    if data.len() < rows * cols {
        anyhow::bail!("Model output has {} values, expected {}x{}", data.len(), rows, cols);
    }

    // Anchors outnumber features in every YOLOv8 export.
    let channels_first = rows <= cols;
    let (features, anchors) = if channels_first { (rows, cols) } else { (cols, rows) };
    if features < 5 {
        anyhow::bail!("Model output has {} features per anchor, expected at least 5", features);
    }

    let value = |feature: usize, anchor: usize| {
        if channels_first {
            data[feature * cols + anchor]
        } else {
            data[anchor * cols + feature]
        }
    };

    let mut detections = Vec::new();
    for anchor in 0..anchors {
        let (class_id, confidence) = (4..features)
            .map(|feature| (feature - 4, value(feature, anchor)))
            .fold((0usize, f32::MIN), |best, candidate| {
                if candidate.1 > best.1 { candidate } else { best }
            });

        if confidence.is_nan() || confidence < confidence_threshold {
            continue;
        }

        let cx = value(0, anchor);
        let cy = value(1, anchor);
        let w = value(2, anchor);
        let h = value(3, anchor);
        let (x1, y1) = geometry.to_source(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = geometry.to_source(cx + w / 2.0, cy + h / 2.0);

        detections.push(RawDetection {
            bbox: [x1, y1, x2, y2],
            class_id,
            confidence: confidence.min(1.0),
        });
    }

    Ok(detections)
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let intersection = ix * iy;
    let union = area(a) + area(b) - intersection;
    if union <= 0.0 { 0.0 } else { intersection / union }
}

/// Greedy class-wise NMS; output is sorted by descending confidence
fn non_max_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<RawDetection> = Vec::with_capacity(detections.len());
    for det in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == det.class_id && iou(&k.bbox, &det.bbox) > iou_threshold);
        if !suppressed {
            kept.push(det);
        }
    }
    kept
}
