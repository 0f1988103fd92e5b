//! # genre-core
//!
//! Music genre classification engine.
//!
//! ## Architecture
//!
//! ```text
//! bytes / path → audio::decode → AudioSignal (mono, native rate)
//!                                     │
//!                          buffering::ChunkPlan (4 s window, 2 s hop)
//!                                     │
//!                 features::mel → features::resize (150×150×1 per chunk)
//!                                     │
//!                       GenreModel::predict ([N,150,150,1] → [N,6])
//!                                     │
//!                      prediction::aggregate → GenrePrediction
//! ```
//!
//! The model handle is immutable and shared; every request owns its own
//! signal, chunks and batch.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod buffering;
pub mod engine;
pub mod error;
pub mod features;
pub mod inference;
pub mod prediction;

// Convenience re-exports for downstream crates
pub use audio::AudioSignal;
pub use engine::{GenreClassifier, PipelineConfig};
pub use error::GenreError;
pub use inference::{GenreModel, ModelHandle};
pub use prediction::{Genre, GenrePrediction};

#[cfg(feature = "onnx")]
pub use inference::{OnnxGenreModel, OnnxModelConfig};
