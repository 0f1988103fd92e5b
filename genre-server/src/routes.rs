//! HTTP surface: `POST /predict`, `GET /health`, `GET /`.
//!
//! Every `/predict` failure (missing field, oversize body, undecodable audio,
//! inference error) is reported as `500 {"error": "..."}`.

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use genre_core::{Genre, GenreError, GenrePrediction};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::state::AppState;
use crate::temp_upload::classify_upload;
use crate::ui;

pub fn router(state: AppState) -> Router {
    let body_limit = state.settings.max_upload_bytes();
    Router::new()
        .route("/", get(ui::index))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predicted_genre: Genre,
    pub confidence: f64,
}

impl From<GenrePrediction> for PredictResponse {
    fn from(p: GenrePrediction) -> Self {
        Self {
            predicted_genre: p.genre,
            confidence: p.confidence,
        }
    }
}

/// Failure reported to clients as `500 {"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    message: String,
}

impl ApiError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<GenreError> for ApiError {
    fn from(e: GenreError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        Self::new(e.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        Self::new(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        warn!(error = %self.message, "prediction request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

async fn predict(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let mut multipart = multipart?;

    // First field carrying data is the upload.
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        let file_name = field.file_name().map(str::to_owned);
        let data = field.bytes().await?;
        if !data.is_empty() {
            upload = Some((file_name, data));
            break;
        }
    }
    let (file_name, data) = upload.ok_or_else(|| ApiError::new("no file uploaded"))?;
    info!(file = ?file_name, bytes = data.len(), "prediction request");

    let prediction = classify_upload(
        state.classifier.clone(),
        state.settings.temp_dir.clone(),
        file_name,
        data,
    )
    .await?;
    Ok(Json(prediction.into()))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "model": state.classifier.model().describe(),
        "labels": Genre::ALL.iter().map(|g| g.as_str()).collect::<Vec<_>>(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use genre_core::inference::stub::StubModel;
    use genre_core::{GenreClassifier, ModelHandle, PipelineConfig};
    use tower::ServiceExt;

    use crate::settings::ServerSettings;

    const BOUNDARY: &str = "genre-test-boundary";
    const SR: u32 = 16_000;

    fn wav(samples: &[f32]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SR,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn silence(secs: usize) -> Vec<u8> {
        wav(&vec![0.0; SR as usize * secs])
    }

    fn tone(secs: usize) -> Vec<u8> {
        let samples: Vec<f32> = (0..SR as usize * secs)
            .map(|i| 0.4 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / SR as f32).sin())
            .collect();
        wav(&samples)
    }

    /// PCM16 WAV whose header says whatever the caller wants.
    fn raw_wav(channels: u16, sample_rate: u32, samples: &[i16]) -> Vec<u8> {
        let data_len = (samples.len() * 2) as u32;
        let block_align = channels.wrapping_mul(2);
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVEfmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&sample_rate.wrapping_mul(block_align as u32).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn predict_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/predict")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn app_with(settings: ServerSettings) -> Router {
        let classifier = GenreClassifier::new(
            ModelHandle::new(StubModel::default()),
            PipelineConfig::default(),
        )
        .unwrap();
        router(AppState::new(classifier, settings))
    }

    fn app() -> Router {
        app_with(ServerSettings::default())
    }

    async fn json_of(response: Response) -> (StatusCode, serde_json::Value) {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn predict_returns_genre_and_confidence() {
        let response = app()
            .oneshot(predict_request(multipart_body("file", "quiet.wav", &silence(6))))
            .await
            .unwrap();
        let (status, json) = json_of(response).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["predicted_genre"], "blues");
        assert_eq!(json["confidence"], 0.9);
    }

    #[tokio::test]
    async fn any_field_name_accepted() {
        let response = app()
            .oneshot(predict_request(multipart_body("audio", "loud.wav", &tone(3))))
            .await
            .unwrap();
        let (status, json) = json_of(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["predicted_genre"], "classical");
    }

    #[tokio::test]
    async fn undecodable_upload_is_structured_500() {
        let response = app()
            .oneshot(predict_request(multipart_body(
                "file",
                "broken.mp3",
                b"definitely not audio at all",
            )))
            .await
            .unwrap();
        let (status, json) = json_of(response).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().is_some_and(|e| !e.is_empty()));
    }

    #[tokio::test]
    async fn hostile_wav_headers_are_structured_500() {
        let cases = [
            ("gigahertz.wav", raw_wav(1, 1_000_000_000, &[1_000; 16])),
            ("zero-rate.wav", raw_wav(1, 0, &[1_000; 16])),
            ("channels.wav", raw_wav(u16::MAX, 44_100, &[1_000; 16])),
        ];
        let app = app();
        for (name, bytes) in cases {
            let response = app
                .clone()
                .oneshot(predict_request(multipart_body("file", name, &bytes)))
                .await
                .unwrap();
            let (status, json) = json_of(response).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{name}");
            assert!(
                json["error"].as_str().is_some_and(|e| !e.is_empty()),
                "{name}: {json}"
            );
        }

        // The service keeps answering after the rejected uploads.
        let response = app
            .oneshot(predict_request(multipart_body("file", "ok.wav", &silence(2))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_file_is_structured_500() {
        let body = format!("--{BOUNDARY}--\r\n").into_bytes();
        let response = app().oneshot(predict_request(body)).await.unwrap();
        let (status, json) = json_of(response).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "no file uploaded");
    }

    #[tokio::test]
    async fn non_multipart_body_is_structured_500() {
        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let (status, json) = json_of(app().oneshot(request).await.unwrap()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn oversize_upload_is_structured_500() {
        let app = app_with(ServerSettings {
            max_upload_mb: 1,
            ..ServerSettings::default()
        });
        let big = vec![0u8; 2 * 1024 * 1024];
        let response = app
            .oneshot(predict_request(multipart_body("file", "big.wav", &big)))
            .await
            .unwrap();
        let (status, json) = json_of(response).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn concurrent_requests_are_independent() {
        let scratch = tempfile::tempdir().unwrap();
        let app = app_with(ServerSettings {
            temp_dir: Some(scratch.path().to_path_buf()),
            ..ServerSettings::default()
        });
        let quiet = silence(5);
        let loud = tone(5);

        let mut tasks = Vec::new();
        for i in 0..8 {
            // Same client filename on every request.
            let body = if i % 2 == 0 {
                multipart_body("file", "clip.wav", &quiet)
            } else {
                multipart_body("file", "clip.wav", &loud)
            };
            let app = app.clone();
            tasks.push(tokio::spawn(async move {
                let response = app.oneshot(predict_request(body)).await.unwrap();
                (i, json_of(response).await)
            }));
        }

        for task in tasks {
            let (i, (status, json)) = task.await.unwrap();
            assert_eq!(status, StatusCode::OK, "request {i}");
            let expected = if i % 2 == 0 { "blues" } else { "classical" };
            assert_eq!(json["predicted_genre"], expected, "request {i}");
        }

        let leftovers = std::fs::read_dir(scratch.path()).unwrap().count();
        assert_eq!(leftovers, 0, "scratch files left behind");
    }

    #[tokio::test]
    async fn scratch_file_removed_after_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let app = app_with(ServerSettings {
            temp_dir: Some(scratch.path().to_path_buf()),
            ..ServerSettings::default()
        });
        let response = app
            .oneshot(predict_request(multipart_body("file", "bad.wav", b"RIFFjunk")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn health_reports_model_and_labels() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let (status, json) = json_of(app().oneshot(request).await.unwrap()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["labels"].as_array().unwrap().len(), 6);
        assert_eq!(json["labels"][0], "blues");
        assert!(json["model"].as_str().unwrap().contains("stub"));
    }

    #[tokio::test]
    async fn index_serves_upload_page() {
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(std::str::from_utf8(&body).unwrap().contains("/predict"));
    }
}
