//! Genre prediction service entry point.
//!
//! Loads the model once, warms it up, then serves `/predict` until SIGINT or
//! SIGTERM.

mod routes;
mod settings;
mod state;
mod temp_upload;
mod ui;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use genre_core::{
    inference::stub::StubModel, GenreClassifier, ModelHandle, OnnxGenreModel, PipelineConfig,
};
use settings::{load_settings, ServerSettings, SETTINGS_PATH_ENV};
use state::AppState;
use tracing::{info, warn};

fn load_model(settings: &ServerSettings) -> Result<ModelHandle> {
    if settings.model_path.exists() {
        info!("loading OnnxGenreModel from {:?}", settings.model_path);
        let model = OnnxGenreModel::load(settings.onnx_config())
            .with_context(|| format!("loading model {:?}", settings.model_path))?;
        return Ok(ModelHandle::new(model));
    }
    if settings.allow_stub_model {
        warn!(
            "model file not found at {:?}; using StubModel",
            settings.model_path
        );
        return Ok(ModelHandle::new(StubModel::default()));
    }
    bail!(
        "model file not found at {:?} (set GENRE_MODEL_PATH, or GENRE_ALLOW_STUB_MODEL=1 for a placeholder)",
        settings.model_path
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genre_server=info,genre_core=info,tower_http=info".into()),
        )
        .init();

    info!("genre-server starting");
    let settings_path = std::env::var_os(SETTINGS_PATH_ENV).map(PathBuf::from);
    let settings = load_settings(settings_path.as_deref());
    info!(
        settings_path = ?settings_path,
        model_path = ?settings.model_path,
        bind_addr = %settings.bind_addr,
        max_upload_mb = settings.max_upload_mb,
        ort_ep = %settings.ort_ep,
        "settings loaded"
    );

    if let Some(dir) = settings.temp_dir.as_ref() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating upload temp dir {dir:?}"))?;
    }

    let model = load_model(&settings)?;
    let classifier = GenreClassifier::new(model, PipelineConfig::default())
        .context("building classifier")?;
    {
        let classifier = classifier.clone();
        tokio::task::spawn_blocking(move || classifier.warm_up())
            .await
            .context("warm-up task panicked")?
            .context("model warm-up failed")?;
    }

    let bind_addr = settings.bind_addr.clone();
    let app = routes::router(AppState::new(classifier, settings));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {bind_addr}"))?;
    info!("listening on http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        sigterm.recv().await;
                    }
                    Err(e) => {
                        warn!("failed to install SIGTERM handler: {e}");
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
