//! Overlapping fixed-length windows over a decoded signal.

pub mod chunk;

pub use chunk::{chunk_count, Chunk, ChunkPlan};
