//! Bilinear image resize with half-pixel centres and no antialiasing.
//!
//! Output pixel `o` samples the source at `(o + 0.5) * in / out - 0.5`; the
//! lower neighbour is clamped at 0 and the upper at `in - 1`.

use ndarray::{Array2, ArrayView2};

use crate::error::{GenreError, Result};

#[derive(Debug, Clone, Copy)]
struct Tap {
    lower: usize,
    upper: usize,
    lerp: f32,
}

fn axis_taps(in_size: usize, out_size: usize) -> Vec<Tap> {
    let scale = in_size as f32 / out_size as f32;
    let last = in_size as isize - 1;
    (0..out_size)
        .map(|o| {
            let src = (o as f32 + 0.5) * scale - 0.5;
            let floor = src.floor();
            Tap {
                lower: (floor as isize).clamp(0, last) as usize,
                upper: (src.ceil() as isize).clamp(0, last) as usize,
                lerp: src - floor,
            }
        })
        .collect()
}

/// Resize a 2-D image to `(out_h, out_w)`.
///
/// # Errors
/// Returns `GenreError::FeatureExtraction` when either side of the input or
/// requested output is zero.
pub fn resize_bilinear(input: ArrayView2<'_, f32>, out_h: usize, out_w: usize) -> Result<Array2<f32>> {
    let (in_h, in_w) = input.dim();
    if in_h == 0 || in_w == 0 || out_h == 0 || out_w == 0 {
        return Err(GenreError::FeatureExtraction(format!(
            "cannot resize {in_h}x{in_w} to {out_h}x{out_w}"
        )));
    }

    let ys = axis_taps(in_h, out_h);
    let xs = axis_taps(in_w, out_w);

    Ok(Array2::from_shape_fn((out_h, out_w), |(y, x)| {
        let ty = ys[y];
        let tx = xs[x];
        let top_left = input[[ty.lower, tx.lower]];
        let top_right = input[[ty.lower, tx.upper]];
        let bottom_left = input[[ty.upper, tx.lower]];
        let bottom_right = input[[ty.upper, tx.upper]];
        let top = top_left + (top_right - top_left) * tx.lerp;
        let bottom = bottom_left + (bottom_right - bottom_left) * tx.lerp;
        top + (bottom - top) * ty.lerp
    }))
}
