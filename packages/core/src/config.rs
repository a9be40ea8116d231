use crate::codec::{ImageCodec, TensorLayout};
use crate::engine::{GraphConfig, GraphFormat};
use crate::error::ConfigError;
use crate::ranking::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_TOP_K, Ranker};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Where the graph and its labels live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_graph_file")]
    pub graph_file: String,
    /// One label per graph output. Pad with blank lines when the graph emits
    /// more scores than there are class names; the stock inception5h graph
    /// emits 1008 against 1001 lines.
    #[serde(default = "default_labels_file")]
    pub labels_file: String,
    /// Overrides the format's default input operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_op: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_op: Option<String>,
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("./model-data/inception/")
}
fn default_graph_file() -> String {
    "tensorflow_inception_graph.pb".to_string()
}
fn default_labels_file() -> String {
    "imagenet_comp_graph_label_strings.txt".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: default_model_dir(),
            graph_file: default_graph_file(),
            labels_file: default_labels_file(),
            input_op: None,
            output_op: None,
        }
    }
}

/// Input geometry and normalization of the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodecConfig {
    #[serde(default = "default_input_side")]
    pub width: u32,
    #[serde(default = "default_input_side")]
    pub height: u32,
    #[serde(default = "default_mean")]
    pub mean: f32,
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub layout: TensorLayout,
}

fn default_input_side() -> u32 {
    224
}
fn default_mean() -> f32 {
    117.0
}
fn default_scale() -> f32 {
    1.0
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            width: default_input_side(),
            height: default_input_side(),
            mean: default_mean(),
            scale: default_scale(),
            layout: TensorLayout::default(),
        }
    }
}

impl CodecConfig {
    pub fn build(&self) -> ImageCodec {
        ImageCodec {
            width: self.width,
            height: self.height,
            mean: self.mean,
            scale: self.scale,
            layout: self.layout,
        }
    }

    pub fn input_shape(&self) -> Vec<usize> {
        self.build().input_shape()
    }
}

/// Everything the serving pipeline needs, fixed for the process lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServingConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default = "default_image_dir")]
    pub image_dir: PathBuf,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    /// Classify this file once at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predict_file: Option<PathBuf>,
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("/tmp/imgs/")
}
fn default_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "jpeg".to_string()]
}
fn default_top_k() -> usize {
    DEFAULT_TOP_K
}
fn default_confidence_threshold() -> f32 {
    DEFAULT_CONFIDENCE_THRESHOLD
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            codec: CodecConfig::default(),
            image_dir: default_image_dir(),
            extensions: default_extensions(),
            top_k: default_top_k(),
            confidence_threshold: default_confidence_threshold(),
            predict_file: None,
        }
    }
}

impl ServingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        fn parsed<T: FromStr>(
            get: &dyn Fn(&str) -> Option<String>,
            key: &str,
            default: T,
        ) -> Result<T, ConfigError> {
            match get(key) {
                Some(v) => v
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string())),
                None => Ok(default),
            }
        }

        let defaults = ServingConfig::default();

        let model = ModelConfig {
            dir: get("MODEL_DIR").map(PathBuf::from).unwrap_or(defaults.model.dir),
            graph_file: get("MODEL_GRAPH_FILE").unwrap_or(defaults.model.graph_file),
            labels_file: get("MODEL_LABELS_FILE").unwrap_or(defaults.model.labels_file),
            input_op: get("MODEL_INPUT_OP"),
            output_op: get("MODEL_OUTPUT_OP"),
        };

        let codec = CodecConfig {
            width: parsed(&get, "MODEL_INPUT_WIDTH", defaults.codec.width)?,
            height: parsed(&get, "MODEL_INPUT_HEIGHT", defaults.codec.height)?,
            mean: parsed(&get, "MODEL_INPUT_MEAN", defaults.codec.mean)?,
            scale: parsed(&get, "MODEL_INPUT_SCALE", defaults.codec.scale)?,
            layout: match get("MODEL_INPUT_LAYOUT") {
                Some(v) => v
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("MODEL_INPUT_LAYOUT".to_string()))?,
                None => defaults.codec.layout,
            },
        };

        let extensions = match get("IMAGE_EXTENSIONS") {
            Some(v) => v
                .split(',')
                .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
            None => defaults.extensions,
        };
        if extensions.is_empty() {
            return Err(ConfigError::InvalidValue("IMAGE_EXTENSIONS".to_string()));
        }

        let top_k = parsed(&get, "TOP_K", defaults.top_k)?;
        if top_k == 0 {
            return Err(ConfigError::InvalidValue("TOP_K".to_string()));
        }
        let confidence_threshold =
            parsed(&get, "CONFIDENCE_THRESHOLD", defaults.confidence_threshold)?;
        if !confidence_threshold.is_finite() {
            return Err(ConfigError::InvalidValue("CONFIDENCE_THRESHOLD".to_string()));
        }

        Ok(ServingConfig {
            model,
            codec,
            image_dir: get("IMAGE_DIR").map(PathBuf::from).unwrap_or(defaults.image_dir),
            extensions,
            top_k,
            confidence_threshold,
            predict_file: get("PREDICT_FILE").map(PathBuf::from),
        })
    }

    pub fn ranker(&self) -> Ranker {
        Ranker::new(self.top_k, self.confidence_threshold)
    }

    /// Graph wiring: configured op names, else the defaults of the graph's format.
    pub fn graph_config(&self) -> GraphConfig {
        let (input, output) = GraphFormat::from_path(&self.model.dir.join(&self.model.graph_file))
            .map(|format| format.default_ops())
            .unwrap_or((None, None));
        GraphConfig {
            input_op: self.model.input_op.clone().or(input.map(str::to_string)),
            output_op: self.model.output_op.clone().or(output.map(str::to_string)),
            input_shape: self.codec.input_shape(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<ServingConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServingConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_inception_model() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.top_k, 5);
        assert_eq!(config.confidence_threshold, 0.0005);
        assert_eq!(config.codec.input_shape(), vec![1, 224, 224, 3]);
        assert_eq!(config.extensions, vec!["jpg", "jpeg"]);

        let graph = config.graph_config();
        assert_eq!(graph.input_op.as_deref(), Some("input"));
        assert_eq!(graph.output_op.as_deref(), Some("output"));
    }

    #[test]
    fn reads_overrides() {
        let config = from_pairs(&[
            ("MODEL_DIR", "/models/mobilenet"),
            ("MODEL_GRAPH_FILE", "mobilenet.onnx"),
            ("MODEL_INPUT_LAYOUT", "nchw"),
            ("IMAGE_EXTENSIONS", ".PNG, jpg"),
            ("TOP_K", "3"),
            ("CONFIDENCE_THRESHOLD", "0.01"),
        ])
        .unwrap();

        assert_eq!(config.model.dir, PathBuf::from("/models/mobilenet"));
        assert_eq!(config.extensions, vec!["png", "jpg"]);
        assert_eq!(config.ranker(), Ranker::new(3, 0.01));

        let graph = config.graph_config();
        assert_eq!(graph.input_op, None);
        assert_eq!(graph.input_shape, vec![1, 3, 224, 224]);
    }

    #[test]
    fn rejects_invalid_values() {
        for (key, value) in [
            ("TOP_K", "five"),
            ("TOP_K", "0"),
            ("MODEL_INPUT_WIDTH", "-1"),
            ("MODEL_INPUT_LAYOUT", "hwc"),
            ("CONFIDENCE_THRESHOLD", "NaN"),
            ("IMAGE_EXTENSIONS", " , "),
        ] {
            let err = from_pairs(&[(key, value)]).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue(ref k) if k == key), "{key}={value}");
        }
    }
}
