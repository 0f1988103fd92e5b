//! Chunk boundaries for the windowed classifier.
//!
//! With `chunk_len = chunk_secs * sr` and `stride = (chunk_secs - overlap_secs) * sr`:
//!
//! ```text
//! num_chunks = ceil((total - chunk_len) / stride) + 1
//! chunk i    = [i * stride, i * stride + chunk_len) ∩ [0, total)
//! ```
//!
//! Signals no longer than one chunk always produce exactly one chunk; a
//! signal shorter than `chunk_len` is zero-padded up to it. Later chunks are
//! clipped at the end of the signal, never padded.

use std::borrow::Cow;
use std::ops::Range;

use crate::error::{GenreError, Result};

/// Number of windows for `total` samples. Never zero.
pub fn chunk_count(total: usize, chunk_len: usize, stride: usize) -> usize {
    if total <= chunk_len || stride == 0 {
        1
    } else {
        (total - chunk_len).div_ceil(stride) + 1
    }
}

/// Precomputed window layout for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total: usize,
    chunk_len: usize,
    stride: usize,
    count: usize,
}

/// One window of samples. Borrowed from the signal unless it had to be padded.
#[derive(Debug, Clone)]
pub struct Chunk<'a> {
    pub index: usize,
    pub start: usize,
    pub samples: Cow<'a, [f32]>,
}

impl ChunkPlan {
    /// Lay out windows of `chunk_secs` with `overlap_secs` shared between
    /// neighbours.
    ///
    /// # Errors
    /// - `GenreError::EmptyAudio` when `total` is zero.
    /// - `GenreError::InvalidConfig` when the overlap is not shorter than the chunk.
    pub fn new(total: usize, sample_rate: u32, chunk_secs: u32, overlap_secs: u32) -> Result<Self> {
        if total == 0 {
            return Err(GenreError::EmptyAudio);
        }
        if chunk_secs == 0 || overlap_secs >= chunk_secs {
            return Err(GenreError::InvalidConfig(format!(
                "overlap ({overlap_secs} s) must be shorter than chunk ({chunk_secs} s)"
            )));
        }
        let chunk_len = (chunk_secs as usize)
            .checked_mul(sample_rate as usize)
            .ok_or_else(|| GenreError::InvalidConfig("chunk length overflows".into()))?;
        let stride = chunk_len - overlap_secs as usize * sample_rate as usize;
        if stride == 0 {
            return Err(GenreError::InvalidConfig("chunk stride is zero".into()));
        }
        Ok(Self {
            total,
            chunk_len,
            stride,
            count: chunk_count(total, chunk_len, stride),
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// True when the whole signal is shorter than one chunk.
    pub fn needs_padding(&self) -> bool {
        self.total < self.chunk_len
    }

    /// Sample range of chunk `index`, clipped to the signal.
    pub fn range(&self, index: usize) -> Range<usize> {
        let start = (index * self.stride).min(self.total);
        let end = (start + self.chunk_len).min(self.total);
        start..end
    }

    /// Iterate chunks over `samples`, which must be the signal this plan was
    /// built for.
    pub fn chunks<'a>(&self, samples: &'a [f32]) -> impl Iterator<Item = Chunk<'a>> + 'a {
        let plan = *self;
        (0..plan.count).map(move |index| {
            let range = plan.range(index);
            let start = range.start;
            let slice = &samples[range];
            let samples = if plan.needs_padding() {
                let mut padded = slice.to_vec();
                padded.resize(plan.chunk_len, 0.0);
                Cow::Owned(padded)
            } else {
                Cow::Borrowed(slice)
            };
            Chunk {
                index,
                start,
                samples,
            }
        })
    }
}
