use serde::{Serialize, Serializer, ser::SerializeStruct};

use crate::error::{EngineError, Result};

/// Axis-aligned box in image pixel space, corners `(x1, y1)` and `(x2, y2)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self> {
        if [x1, y1, x2, y2].iter().any(|v| !v.is_finite()) {
            return Err(EngineError::InvalidDetection(format!(
                "non-finite bounding box ({x1}, {y1}, {x2}, {y2})"
            )));
        }
        if x2 < x1 || y2 < y1 {
            return Err(EngineError::InvalidDetection(format!(
                "degenerate bounding box ({x1}, {y1}, {x2}, {y2})"
            )));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn x1(&self) -> f32 {
        self.x1
    }

    pub fn y1(&self) -> f32 {
        self.y1
    }

    pub fn x2(&self) -> f32 {
        self.x2
    }

    pub fn y2(&self) -> f32 {
        self.y2
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Midpoint of the box, used as the annotation marker
    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// A single labelled, localised, confidence-scored object instance.
///
/// Values are validated on construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    label: String,
    confidence: f32,
    bbox: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Result<Self> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(EngineError::InvalidDetection("empty label".to_string()));
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(EngineError::InvalidDetection(format!(
                "confidence {confidence} for '{label}' is outside [0, 1]"
            )));
        }
        Ok(Self {
            label,
            confidence,
            bbox,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn width(&self) -> f32 {
        self.bbox.width()
    }

    pub fn height(&self) -> f32 {
        self.bbox.height()
    }

    pub fn area(&self) -> f32 {
        self.bbox.area()
    }
}

impl Serialize for Detection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Detection", 6)?;
        state.serialize_field("label", &self.label)?;
        state.serialize_field("confidence", &self.confidence)?;
        state.serialize_field("box", &[self.bbox.x1, self.bbox.y1, self.bbox.x2, self.bbox.y2])?;
        state.serialize_field("width", &self.width())?;
        state.serialize_field("height", &self.height())?;
        state.serialize_field("area", &self.area())?;
        state.end()
    }
}
