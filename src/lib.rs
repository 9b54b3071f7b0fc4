pub mod adherence;
pub mod config;
pub mod core;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;

pub use adherence::{ComparisonResult, LabelMultiset, aggregate, compare};
pub use config::Config;
pub use detection::{DetectionModel, Detector, ImageRef, ModelLoader, RawDetection};
pub use error::EngineError;
pub use models::{BoundingBox, Detection};
pub use pipeline::{AdherencePipeline, AdherenceReport, DebugConfig, PipelineContext};
