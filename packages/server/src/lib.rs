//! Inception Serve HTTP server
//!
//! Serves predictions from [`inception_core`] over HTTP:
//! - `GET /` renders a random stored image with its top labels as HTML
//! - `GET /predict` and `GET /images/{id}/predict` return JSON
//! - `POST /predict` classifies an uploaded image
//!
//! ## Usage
//!
//! ```rust,ignore
//! use inception_server::{build_state, server_router};
//!
//! let state = build_state(&ServingConfig::from_env()?)?;
//! let app = server_router(state);
//! ```

pub mod error;
pub mod render;
pub mod router;
pub mod startup;

pub use error::{ServerError, StartupError};
pub use render::{HtmlPresenter, JsonPresenter, PredictionResponse};
pub use router::{HealthResponse, ServerState, server_router};
pub use startup::{assemble_dispatcher, build_dispatcher, build_state, predict_file};
