#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use inception_core::{
    CodecConfig, GraphBackend, InferenceEngine, InferenceError, InputTensor, ProbabilityVector,
    ServingConfig,
};
use std::io::Cursor;
use std::path::Path;

/// Scores every input the same way.
pub struct FixedBackend(pub Vec<f32>);

impl GraphBackend for FixedBackend {
    fn execute(&self, _: &InputTensor) -> Result<ProbabilityVector, InferenceError> {
        Ok(self.0.clone())
    }
}

pub struct FailingBackend;

impl GraphBackend for FailingBackend {
    fn execute(&self, _: &InputTensor) -> Result<ProbabilityVector, InferenceError> {
        Err(InferenceError::Execution("device lost".to_string()))
    }
}

pub fn labels() -> Vec<String> {
    ["cat", "dog", "bird"].iter().map(|s| s.to_string()).collect()
}

/// cat 0.1, dog 0.0001, bird 0.85
pub fn engine() -> InferenceEngine {
    InferenceEngine::from_backend(Box::new(FixedBackend(vec![0.1, 0.0001, 0.85])), labels())
        .unwrap()
}

pub fn write_jpeg(path: &Path) {
    RgbImage::from_pixel(8, 8, Rgb([200, 30, 30])).save(path).unwrap();
}

pub fn png_bytes() -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([20, 120, 220])))
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Image directory with `a.jpg` and `b.jpg`
pub fn image_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_jpeg(&dir.path().join("a.jpg"));
    write_jpeg(&dir.path().join("b.jpg"));
    dir
}

pub fn config(image_dir: &Path) -> ServingConfig {
    ServingConfig {
        image_dir: image_dir.to_path_buf(),
        codec: CodecConfig {
            width: 4,
            height: 4,
            ..CodecConfig::default()
        },
        top_k: 3,
        ..ServingConfig::default()
    }
}
