use std::path::{Path, PathBuf};

use image::DynamicImage;
use serde::Serialize;
use tracing::info;

use crate::adherence::{ComparisonResult, LabelMultiset, aggregate, compare};
use crate::detection::{Detector, ImageRef, ModelLoader, annotate};
use crate::error::{EngineError, Result};

/// Everything produced by one planogram/shelf comparison
#[derive(Debug, Clone, Serialize)]
pub struct AdherenceReport {
    pub planogram: LabelMultiset,
    pub shelf: LabelMultiset,
    pub result: ComparisonResult,
}

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Root directory for debug outputs
    pub output_dir: PathBuf,
}

/// Context available to every pipeline run
#[derive(Clone, Debug, Default)]
pub struct PipelineContext {
    pub verbose: bool,
    pub debug: Option<DebugConfig>,
}

/// detect → aggregate → compare, run sequentially for a planogram and a shelf image.
///
/// Either both images are detected and a report is returned, or the first
/// error is returned and no score is produced.
pub struct AdherencePipeline<'d, L: ModelLoader> {
    detector: &'d Detector<L>,
    confidence_threshold: f32,
    context: PipelineContext,
}

impl<'d, L: ModelLoader> AdherencePipeline<'d, L> {
    pub fn new(detector: &'d Detector<L>, confidence_threshold: f32) -> Self {
        Self {
            detector,
            confidence_threshold,
            context: PipelineContext::default(),
        }
    }

    /// Enable verbose output
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.context.verbose = verbose;
        self
    }

    /// Enable debug mode with output directory
    /// The directory must be empty or non-existent
    pub fn with_debug(mut self, output_dir: PathBuf) -> anyhow::Result<Self> {
        if output_dir.exists() {
            let entries = std::fs::read_dir(&output_dir)?;
            if entries.count() > 0 {
                return Err(anyhow::anyhow!(
                    "Debug directory is not empty: {}",
                    output_dir.display()
                ));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }

        self.context.debug = Some(DebugConfig { output_dir });
        Ok(self)
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    /// Detect and aggregate a single image
    pub fn detect_and_aggregate(&self, image: &ImageRef) -> Result<LabelMultiset> {
        let (multiset, _) = self.process_image(image)?;
        Ok(multiset)
    }

    pub fn run(&self, planogram: &ImageRef, shelf: &ImageRef) -> Result<AdherenceReport> {
        let (planogram_set, planogram_pixels) = self.process_image(planogram)?;
        let (shelf_set, shelf_pixels) = self.process_image(shelf)?;

        let result = compare(&planogram_set, &shelf_set);
        info!(
            planogram = %planogram.name(),
            shelf = %shelf.name(),
            score = result.adherence_score,
            matched = result.total_matched,
            expected = result.total_expected,
            "comparison complete"
        );

        let report = AdherenceReport {
            planogram: planogram_set,
            shelf: shelf_set,
            result,
        };

        if let Some(debug) = &self.context.debug {
            self.save_debug_output(&debug.output_dir, &report, &planogram_pixels, &shelf_pixels)?;
        }

        Ok(report)
    }

    fn process_image(&self, image: &ImageRef) -> Result<(LabelMultiset, DynamicImage)> {
        let name = image.name();
        if self.context.verbose {
            info!(image = %name, "detecting objects");
        }

        self.detector.preload()?;
        let pixels = image.load()?;
        let detections = self
            .detector
            .detect_image(&name, &pixels, self.confidence_threshold)?;
        let multiset = aggregate(detections, self.confidence_threshold);

        if self.context.verbose {
            info!(
                image = %name,
                objects = multiset.total(),
                labels = multiset.counts().len(),
                "detection aggregated"
            );
        }
        Ok((multiset, pixels))
    }

    fn save_debug_output(
        &self,
        dir: &Path,
        report: &AdherenceReport,
        planogram: &DynamicImage,
        shelf: &DynamicImage,
    ) -> Result<()> {
        let images = [
            ("planogram.png", planogram, &report.planogram),
            ("shelf.png", shelf, &report.shelf),
        ];
        for (filename, pixels, multiset) in images {
            let path = dir.join(filename);
            annotate::draw_detections(pixels, multiset.details())
                .save(&path)
                .map_err(|e| EngineError::debug_output(&path, e))?;
            if self.context.verbose {
                info!(path = %path.display(), "debug image saved");
            }
        }

        let path = dir.join("report.json");
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| EngineError::debug_output(&path, e))?;
        std::fs::write(&path, json).map_err(|e| EngineError::debug_output(&path, e))?;
        Ok(())
    }
}
