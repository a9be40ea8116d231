//! Raw image bytes to graph input
//!
//! The Inception graph was trained on 224x224 RGB images where every channel
//! value `v` was mapped to `(v - 117) / 1`, batched as `[1, H, W, 3]`.

use crate::error::CodecError;
use crate::types::InputTensor;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Turns encoded image bytes into a graph input tensor.
pub trait TensorCodec: Send + Sync {
    fn normalize(&self, raw: &[u8]) -> Result<InputTensor, CodecError>;
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// `[1, H, W, 3]`, TensorFlow graphs
    #[default]
    Nhwc,
    /// `[1, 3, H, W]`, most ONNX exports
    Nchw,
}

impl FromStr for TensorLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nhwc" => Ok(TensorLayout::Nhwc),
            "nchw" => Ok(TensorLayout::Nchw),
            other => Err(format!("unknown tensor layout '{other}'")),
        }
    }
}

/// Decode, resize and normalize with the `image` crate
#[derive(Clone, Debug)]
pub struct ImageCodec {
    pub width: u32,
    pub height: u32,
    pub mean: f32,
    pub scale: f32,
    pub layout: TensorLayout,
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
            mean: 117.0,
            scale: 1.0,
            layout: TensorLayout::Nhwc,
        }
    }
}

impl ImageCodec {
    /// Shape of every tensor this codec produces
    pub fn input_shape(&self) -> Vec<usize> {
        let (h, w) = (self.height as usize, self.width as usize);
        match self.layout {
            TensorLayout::Nhwc => vec![1, h, w, 3],
            TensorLayout::Nchw => vec![1, 3, h, w],
        }
    }
}

impl TensorCodec for ImageCodec {
    fn normalize(&self, raw: &[u8]) -> Result<InputTensor, CodecError> {
        if self.width == 0 || self.height == 0 {
            return Err(CodecError::InvalidParameters(format!(
                "input size {}x{}",
                self.width, self.height
            )));
        }
        if self.scale == 0.0 || !self.scale.is_finite() {
            return Err(CodecError::InvalidParameters(format!(
                "scale {}",
                self.scale
            )));
        }

        let img = image::load_from_memory(raw)?;
        let rgb = img
            .resize_exact(self.width, self.height, FilterType::Triangle)
            .to_rgb8();

        let normalize = |v: u8| (v as f32 - self.mean) / self.scale;
        let data: Vec<f32> = match self.layout {
            TensorLayout::Nhwc => rgb.as_raw().iter().copied().map(normalize).collect(),
            TensorLayout::Nchw => {
                let plane = (self.width * self.height) as usize;
                let mut data = vec![0.0; plane * 3];
                for (i, px) in rgb.pixels().enumerate() {
                    for c in 0..3 {
                        data[c * plane + i] = normalize(px[c]);
                    }
                }
                data
            }
        };

        InputTensor::new(self.input_shape(), data)
    }
}
