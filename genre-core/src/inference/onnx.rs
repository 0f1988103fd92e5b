//! Genre CNN backend via the `ort` crate.
//!
//! Targets a `tf2onnx` export of the Keras classifier:
//! - input  `[N,150,150,1]` f32 (NHWC mel images)
//! - output `[N,6]` f32 softmax scores in [`Genre::ALL`](crate::Genre::ALL) order
//!
//! Input/output names are read from the graph, not hard-coded. `ort` needs
//! `&mut Session` to run, so the session lives behind a `parking_lot::Mutex`
//! and concurrent requests take turns on the forward pass only; decoding and
//! feature extraction stay parallel.

use std::path::{Path, PathBuf};

use ndarray::{Array2, Array4};
use ort::ep;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::{Session, SessionInputValue};
use ort::value::Value;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::{
    error::{GenreError, Result},
    inference::GenreModel,
    prediction::Genre,
};

/// File name used when no explicit model path is configured.
pub const DEFAULT_MODEL_FILE: &str = "trained_model.onnx";

// ── Model config ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtExecutionPreference {
    /// Let ONNX Runtime pick its default providers.
    Auto,
    /// Force the CPU execution provider.
    Cpu,
}

impl OrtExecutionPreference {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cpu" => Self::Cpu,
            _ => Self::Auto,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OnnxModelConfig {
    pub model_path: PathBuf,
    pub execution: OrtExecutionPreference,
    /// `None` picks a value from the number of logical cores.
    pub intra_threads: Option<usize>,
    /// Expected `(height, width)` of each input image.
    pub input_size: (usize, usize),
}

impl Default for OnnxModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_FILE),
            execution: OrtExecutionPreference::Auto,
            intra_threads: None,
            input_size: (150, 150),
        }
    }
}

fn create_session(config: &OnnxModelConfig) -> Result<Session> {
    let logical_cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    let intra_threads = config
        .intra_threads
        .unwrap_or_else(|| logical_cores.clamp(1, 8))
        .clamp(1, 32);

    let mut builder = SessionBuilder::new()
        .map_err(|e| GenreError::OnnxSession(e.to_string()))?
        .with_intra_threads(intra_threads)
        .map_err(|e| GenreError::OnnxSession(e.to_string()))?
        .with_optimization_level(GraphOptimizationLevel::All)
        .map_err(|e| GenreError::OnnxSession(e.to_string()))?;
    info!(intra_threads, logical_cores, "ONNX session threading configured");

    if config.execution == OrtExecutionPreference::Cpu {
        info!("ONNX EP preference=cpu");
        builder = builder
            .with_execution_providers([ep::CPU::default().build()])
            .map_err(|e| GenreError::OnnxSession(e.to_string()))?;
    }

    builder
        .commit_from_file(&config.model_path)
        .map_err(|e| GenreError::OnnxSession(e.to_string()))
}

// ── OnnxGenreModel ───────────────────────────────────────────────────────────

pub struct OnnxGenreModel {
    model_path: PathBuf,
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_size: (usize, usize),
}

impl OnnxGenreModel {
    /// Load and validate the model at `config.model_path`.
    ///
    /// # Errors
    /// - `GenreError::ModelNotFound` if the file does not exist.
    /// - `GenreError::OnnxSession` if ONNX Runtime rejects it, or its
    ///   declared input/output shapes contradict `[N,H,W,1] → [N,6]`.
    pub fn load(config: OnnxModelConfig) -> Result<Self> {
        let path = config.model_path.as_path();
        if !path.exists() {
            return Err(GenreError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }

        let size_mb = std::fs::metadata(path)
            .map(|m| m.len() as f64 / 1_048_576.0)
            .unwrap_or(0.0);
        info!("=== Genre ONNX Model Startup Report ===");
        info!("  path: {:?}", path);
        info!("  size: {:.2} MB", size_mb);

        let session = create_session(&config)?;

        info!("  inputs:");
        for input in session.inputs().iter() {
            info!("    {}", input.name());
        }
        info!("  outputs:");
        for output in session.outputs().iter() {
            info!("    {}", output.name());
        }

        let input = session
            .inputs()
            .first()
            .ok_or_else(|| GenreError::OnnxSession("model declares no inputs".into()))?;
        let input_name = input.name().to_string();
        if let Some(shape) = input.dtype().tensor_shape() {
            check_input_shape(&shape[..], config.input_size)?;
        }

        let output = session
            .outputs()
            .first()
            .ok_or_else(|| GenreError::OnnxSession("model declares no outputs".into()))?;
        let output_name = output.name().to_string();
        if let Some(shape) = output.dtype().tensor_shape() {
            check_output_shape(&shape[..])?;
        }

        Ok(Self {
            model_path: config.model_path.clone(),
            session: Mutex::new(session),
            input_name,
            output_name,
            input_size: config.input_size,
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

/// Dynamic (`-1`) dimensions always pass.
fn check_input_shape(shape: &[i64], (height, width): (usize, usize)) -> Result<()> {
    let expected = [height as i64, width as i64, 1];
    let matches = shape.len() == 4
        && shape[1..]
            .iter()
            .zip(expected.iter())
            .all(|(&got, &want)| got < 0 || got == want);
    if matches {
        Ok(())
    } else {
        Err(GenreError::OnnxSession(format!(
            "model input shape {shape:?} does not accept [N,{height},{width},1]"
        )))
    }
}

fn check_output_shape(shape: &[i64]) -> Result<()> {
    match shape.last() {
        Some(&classes) if shape.len() == 2 && (classes < 0 || classes as usize == Genre::COUNT) => {
            Ok(())
        }
        _ => Err(GenreError::OnnxSession(format!(
            "model output shape {shape:?} is not [N,{}]",
            Genre::COUNT
        ))),
    }
}

impl GenreModel for OnnxGenreModel {
    fn warm_up(&self) -> Result<()> {
        let (h, w) = self.input_size;
        let dummy = Array4::<f32>::zeros((1, h, w, 1));
        let out = self.predict(dummy)?;
        info!(classes = out.ncols(), "=== OnnxGenreModel warm-up complete ===");
        Ok(())
    }

    fn predict(&self, batch: Array4<f32>) -> Result<Array2<f32>> {
        let rows = batch.dim().0;
        let value = Value::from_array(batch)
            .map_err(|e: ort::Error| GenreError::OnnxSession(e.to_string()))?;
        let inputs: Vec<(String, SessionInputValue<'_>)> =
            vec![(self.input_name.clone(), SessionInputValue::from(value))];

        let mut session = self.session.lock();
        let outputs = session
            .run(inputs)
            .map_err(|e| GenreError::Inference(e.to_string()))?;
        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| GenreError::Inference(e.to_string()))?;

        let cols = shape.last().copied().unwrap_or(0).max(0) as usize;
        if cols == 0 || data.len() != rows * cols {
            return Err(GenreError::Inference(format!(
                "unexpected output shape {:?} for batch of {rows}",
                &shape[..]
            )));
        }
        debug!(rows, cols, "forward pass complete");

        Array2::from_shape_vec((rows, cols), data.to_vec())
            .map_err(|e| GenreError::Inference(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("onnx ({})", self.model_path.display())
    }
}
