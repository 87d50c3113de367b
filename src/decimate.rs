/*
 *  decimate.rs
 *
 *  shmscope - eyes on the server
 *  (c) 2025 the shmscope authors
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

//! Frame-to-pixel reduction for one channel row.
//!
//! Below one frame per pixel we plot every frame; at or above it we fold
//! each pixel column's frames into a min/max pair, so a single-sample
//! transient still shows up no matter how hard the row is squeezed.

/// One bucket-mode output column: a vertical stroke at pixel `x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Column {
    pub x: u32,
    pub min: f32,
    pub max: f32,
}

/// Decimated geometry for one channel, still in sample/frame units; the
/// renderer owns the pixel transform.
#[derive(Debug, Clone, PartialEq)]
pub enum Trace {
    /// Nothing to draw (under 2 frames, or a zero-width surface).
    Empty,
    /// One `[frame_index, sample]` vertex per frame.
    Points(Vec<[f32; 2]>),
    /// One min/max column per output pixel.
    Columns(Vec<Column>),
}

/// Reduce one channel row to at most `width` pixels worth of geometry.
pub fn decimate(samples: &[f32], width: u32) -> Trace {
    let frames = samples.len();
    if frames < 2 || width == 0 {
        return Trace::Empty;
    }
    if frames < width as usize {
        Trace::Points(plot_points(samples))
    } else {
        Trace::Columns(min_max_columns(samples, width))
    }
}

fn plot_points(samples: &[f32]) -> Vec<[f32; 2]> {
    samples
        .iter()
        .enumerate()
        .map(|(f, &v)| [f as f32, v])
        .collect()
}

fn min_max_columns(samples: &[f32], width: u32) -> Vec<Column> {
    let frames = samples.len();
    let ppf = width as f32 / frames as f32;

    let mut cols = Vec::with_capacity(width as usize);
    let mut f = 1usize; // next frame to consume; pixels are 1-indexed here
    for p in 1..=width {
        // seed with the previous bucket's last frame so adjacent columns
        // stay vertically connected
        let mut min = samples[f - 1];
        let mut max = min;

        while f < frames && (f as f32) * ppf < p as f32 {
            let d = samples[f];
            if d < min {
                min = d;
            } else if d > max {
                max = d;
            }
            f += 1;
        }

        cols.push(Column { x: p - 1, min, max });
    }
    cols
}
