use crate::error::CodecError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Scores produced by one inference, index-aligned with the graph labels.
pub type ProbabilityVector = Vec<f32>;

/// Normalized, fixed-shape graph input for one image
#[derive(Clone, Debug, PartialEq)]
pub struct InputTensor {
    shape: Vec<usize>,
    data: Arc<[f32]>,
}

impl InputTensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, CodecError> {
        let expected: usize = shape.iter().product();
        if shape.is_empty() || expected != data.len() {
            return Err(CodecError::Shape {
                shape,
                len: data.len(),
            });
        }
        Ok(Self {
            shape,
            data: data.into(),
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One ranked prediction
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RankedEntry {
    pub label: String,
    pub weight: f32,
}

impl RankedEntry {
    pub fn new(label: impl Into<String>, weight: f32) -> Self {
        Self {
            label: label.into(),
            weight,
        }
    }
}

/// Ranked predictions, highest weight first
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct PredictionResult {
    entries: Vec<RankedEntry>,
}

impl PredictionResult {
    pub(crate) fn from_entries(entries: Vec<RankedEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[RankedEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RankedEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn best(&self) -> Option<&RankedEntry> {
        self.entries.first()
    }
}

impl<'a> IntoIterator for &'a PredictionResult {
    type Item = &'a RankedEntry;
    type IntoIter = std::slice::Iter<'a, RankedEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            writeln!(
                f,
                "\t[Top-{}] {:2.1}% likely {}",
                i + 1,
                entry.weight * 100.0,
                entry.label
            )?;
        }
        Ok(())
    }
}

/// A stored sample image. Never mutated after insertion.
#[derive(Clone, Debug)]
pub struct ImageRecord {
    pub id: String,
    pub raw: Bytes,
    pub tensor: InputTensor,
}

impl ImageRecord {
    pub fn new(id: impl Into<String>, raw: impl Into<Bytes>, tensor: InputTensor) -> Self {
        Self {
            id: id.into(),
            raw: raw.into(),
            tensor,
        }
    }
}
