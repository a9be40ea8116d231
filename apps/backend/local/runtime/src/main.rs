#[cfg(not(any(all(target_os = "macos", target_arch = "aarch64"), target_os = "ios")))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use axum::middleware;
use axum::routing::get;
use dotenv::dotenv;
use inception_server::{build_state, server_router};

mod config;
mod metrics;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    metrics::init_telemetry()?;

    tracing::info!("Starting Inception Serve runtime");

    let config = config::Config::from_env()?;
    tracing::info!(
        port = config.port,
        model_dir = %config.serving.model.dir.display(),
        image_dir = %config.serving.image_dir.display(),
        top_k = config.serving.top_k,
        "Loaded configuration"
    );

    // Graph compilation and image decoding are CPU bound
    let serving = config.serving.clone();
    let state = tokio::task::spawn_blocking(move || build_state(&serving)).await??;

    let app = server_router(state)
        .route("/metrics", get(metrics::handler))
        .layer(middleware::from_fn(metrics::track_requests));

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Runtime listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    opentelemetry::global::shutdown_tracer_provider();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
