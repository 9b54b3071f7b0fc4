//! Label-count reconciliation between a planogram and a shelf.
//!
//! [`aggregate`] turns one image's detections into a [`LabelMultiset`];
//! [`compare`] reconciles two multisets into a [`ComparisonResult`]. Both are
//! pure and never touch the detection model.

pub mod aggregate;
pub mod compare;

pub use aggregate::{LabelMultiset, aggregate};
pub use compare::{ComparisonResult, compare};
