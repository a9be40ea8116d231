//! Presenters for the HTML page and the JSON API

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use inception_core::{Prediction, PredictionResult, Presenter};
use minijinja::{Environment, Value, context};
use serde::Serialize;
use std::convert::Infallible;

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

/// JSON body of every prediction endpoint
#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    pub predictions: PredictionResult,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPresenter;

impl Presenter for JsonPresenter {
    type Output = PredictionResponse;
    type Error = Infallible;

    fn render(&self, prediction: Prediction) -> Result<PredictionResponse, Infallible> {
        Ok(PredictionResponse {
            image_id: prediction.image_id,
            predictions: prediction.result,
            elapsed_ms: prediction.elapsed.as_secs_f64() * 1000.0,
        })
    }
}

/// Renders the image inline next to its ranked labels.
pub struct HtmlPresenter {
    env: Environment<'static>,
    hostname: String,
}

#[derive(Serialize)]
struct Row<'a> {
    rank: usize,
    label: &'a str,
    percent: String,
}

impl HtmlPresenter {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        env.add_template("index.html", INDEX_TEMPLATE)?;
        Ok(Self {
            env,
            hostname: hostname(),
        })
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }
}

impl Presenter for HtmlPresenter {
    type Output = String;
    type Error = minijinja::Error;

    fn render(&self, prediction: Prediction) -> Result<String, minijinja::Error> {
        let rows: Vec<Row> = prediction
            .result
            .iter()
            .enumerate()
            .map(|(i, entry)| Row {
                rank: i + 1,
                label: &entry.label,
                percent: format!("{:.1}", entry.weight * 100.0),
            })
            .collect();

        let mime = image::guess_format(&prediction.raw)
            .map(|format| format.to_mime_type())
            .unwrap_or("image/jpeg");

        self.env.get_template("index.html")?.render(context! {
            image_id => prediction.image_id,
            image => Value::from_safe_string(STANDARD.encode(&prediction.raw)),
            mime => Value::from_safe_string(mime.to_string()),
            predictions => rows,
            elapsed_ms => format!("{:5.2}", prediction.elapsed.as_secs_f64() * 1000.0),
            hostname => &self.hostname,
        })
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
