//! Shared server state, cloned into every handler by axum's `State` extractor.

use std::sync::Arc;

use genre_core::GenreClassifier;

use crate::settings::ServerSettings;

#[derive(Clone)]
pub struct AppState {
    /// Loaded once at startup; every request classifies through this handle.
    pub classifier: GenreClassifier,
    pub settings: Arc<ServerSettings>,
}

impl AppState {
    pub fn new(classifier: GenreClassifier, settings: ServerSettings) -> Self {
        Self {
            classifier,
            settings: Arc::new(settings),
        }
    }
}
