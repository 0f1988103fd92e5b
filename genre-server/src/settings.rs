//! Server settings: optional JSON file, then `GENRE_*` environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use genre_core::inference::onnx::{OrtExecutionPreference, DEFAULT_MODEL_FILE};
use genre_core::OnnxModelConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable naming the settings file.
pub const SETTINGS_PATH_ENV: &str = "GENRE_SETTINGS";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_MAX_UPLOAD_MB: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct ServerSettings {
    pub model_path: PathBuf,
    pub bind_addr: String,
    pub max_upload_mb: usize,
    /// Directory for upload scratch files. `None` uses the system temp dir.
    pub temp_dir: Option<PathBuf>,
    pub ort_ep: String,
    pub ort_intra_threads: Option<usize>,
    /// Serve with `StubModel` when the model file is missing.
    pub allow_stub_model: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_FILE),
            bind_addr: DEFAULT_BIND_ADDR.into(),
            max_upload_mb: DEFAULT_MAX_UPLOAD_MB,
            temp_dir: None,
            ort_ep: "auto".into(),
            ort_intra_threads: None,
            allow_stub_model: false,
        }
    }
}

impl ServerSettings {
    pub fn normalize(&mut self) {
        self.bind_addr = self.bind_addr.trim().to_string();
        if self.bind_addr.is_empty() {
            self.bind_addr = DEFAULT_BIND_ADDR.into();
        }
        if self.model_path.as_os_str().is_empty() {
            self.model_path = PathBuf::from(DEFAULT_MODEL_FILE);
        }
        self.max_upload_mb = self.max_upload_mb.clamp(1, 1024);
        self.ort_ep = normalize_ort_ep(&self.ort_ep);
        self.ort_intra_threads = self.ort_intra_threads.map(|n| n.clamp(1, 32));
        self.temp_dir = self
            .temp_dir
            .take()
            .filter(|p| !p.as_os_str().is_empty());
    }

    /// Apply `GENRE_*` overrides. `lookup` is `std::env::var` outside tests.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("GENRE_MODEL_PATH") {
            self.model_path = PathBuf::from(v.trim());
        }
        if let Some(v) = lookup("GENRE_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = lookup("GENRE_MAX_UPLOAD_MB") {
            match v.trim().parse::<usize>() {
                Ok(mb) => self.max_upload_mb = mb,
                Err(_) => warn!(value = %v, "ignoring invalid GENRE_MAX_UPLOAD_MB"),
            }
        }
        if let Some(v) = lookup("GENRE_TEMP_DIR") {
            self.temp_dir = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = lookup("GENRE_ORT_EP") {
            self.ort_ep = v;
        }
        if let Some(v) = lookup("GENRE_ORT_INTRA_THREADS") {
            match v.trim().parse::<usize>() {
                Ok(n) => self.ort_intra_threads = Some(n),
                Err(_) => warn!(value = %v, "ignoring invalid GENRE_ORT_INTRA_THREADS"),
            }
        }
        if let Some(v) = lookup("GENRE_ALLOW_STUB_MODEL") {
            self.allow_stub_model = parse_flag(&v);
        }
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }

    pub fn onnx_config(&self) -> OnnxModelConfig {
        OnnxModelConfig {
            model_path: self.model_path.clone(),
            execution: OrtExecutionPreference::parse(&self.ort_ep),
            intra_threads: self.ort_intra_threads,
            ..OnnxModelConfig::default()
        }
    }
}

pub fn normalize_ort_ep(raw: &str) -> String {
    match raw.trim().to_ascii_lowercase().as_str() {
        "cpu" => "cpu".into(),
        _ => "auto".into(),
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Read `path` (if any), apply environment overrides, normalise.
///
/// A missing or unparsable file falls back to defaults with a warning.
pub fn load_settings(path: Option<&Path>) -> ServerSettings {
    load_settings_with(path, |key| std::env::var(key).ok())
}

fn load_settings_with(
    path: Option<&Path>,
    lookup: impl Fn(&str) -> Option<String>,
) -> ServerSettings {
    let mut settings = match path {
        Some(path) => match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str::<ServerSettings>(&raw).unwrap_or_else(|e| {
                warn!(path = ?path, "invalid settings file, using defaults: {e}");
                ServerSettings::default()
            }),
            Err(e) => {
                warn!(path = ?path, "settings file unreadable, using defaults: {e}");
                ServerSettings::default()
            }
        },
        None => ServerSettings::default(),
    };
    settings.apply_env_overrides(lookup);
    settings.normalize();
    settings
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_json_keeps_defaults() {
        let settings: ServerSettings =
            serde_json::from_str(r#"{"bindAddr":"0.0.0.0:9000","allowStubModel":true}"#).unwrap();
        assert_eq!(settings.bind_addr, "0.0.0.0:9000");
        assert!(settings.allow_stub_model);
        assert_eq!(settings.max_upload_mb, 64);
        assert_eq!(settings.model_path, PathBuf::from("trained_model.onnx"));
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("GENRE_MODEL_PATH", " /models/genre.onnx "),
            ("GENRE_MAX_UPLOAD_MB", "8"),
            ("GENRE_ORT_EP", "CPU"),
            ("GENRE_ORT_INTRA_THREADS", "not-a-number"),
            ("GENRE_ALLOW_STUB_MODEL", "yes"),
        ]
        .into_iter()
        .collect();

        let mut settings = ServerSettings::default();
        settings.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));
        settings.normalize();

        assert_eq!(settings.model_path, PathBuf::from("/models/genre.onnx"));
        assert_eq!(settings.max_upload_bytes(), 8 * 1024 * 1024);
        assert_eq!(settings.ort_ep, "cpu");
        assert_eq!(settings.ort_intra_threads, None);
        assert!(settings.allow_stub_model);
        assert_eq!(settings.onnx_config().execution, OrtExecutionPreference::Cpu);
    }

    #[test]
    fn normalize_clamps_and_trims() {
        let mut settings = ServerSettings {
            bind_addr: "   ".into(),
            max_upload_mb: 0,
            ort_ep: "directml".into(),
            ort_intra_threads: Some(500),
            temp_dir: Some(PathBuf::new()),
            ..ServerSettings::default()
        };
        settings.normalize();
        assert_eq!(settings.bind_addr, "127.0.0.1:8000");
        assert_eq!(settings.max_upload_mb, 1);
        assert_eq!(settings.ort_ep, "auto");
        assert_eq!(settings.ort_intra_threads, Some(32));
        assert_eq!(settings.temp_dir, None);
    }

    #[test]
    fn file_then_env_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"bindAddr":"0.0.0.0:9000","maxUploadMb":16}"#).unwrap();

        let settings = load_settings_with(Some(&path), |k| {
            (k == "GENRE_MAX_UPLOAD_MB").then(|| "32".to_string())
        });
        assert_eq!(settings.bind_addr, "0.0.0.0:9000");
        assert_eq!(settings.max_upload_mb, 32);
    }

    #[test]
    fn unparsable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let settings = load_settings_with(Some(&path), |_| None);
        assert_eq!(settings, ServerSettings::default());

        let missing = load_settings_with(Some(&dir.path().join("absent.json")), |_| None);
        assert_eq!(missing, ServerSettings::default());
    }
}
