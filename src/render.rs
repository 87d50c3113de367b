/*
 *  render.rs
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

//! Scene assembly: decimated channel geometry, transformed into the
//! target area and stroked with embedded-graphics primitives.

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, Polyline, PrimitiveStyle, Rectangle};

use crate::config::{RenderConfig, TraceStyle};
use crate::decimate::{Trace, decimate};
use crate::reader::FrameSnapshot;

/// Paint one scene. The background always fills `area`; the waveform is
/// drawn only when a snapshot with frames is present. Geometry is
/// recomputed from scratch each pass; nothing survives to the next poll.
pub fn draw<D>(
    display: &mut D,
    area: Rectangle,
    cfg: &RenderConfig,
    snapshot: Option<&FrameSnapshot<'_>>,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    area.into_styled(PrimitiveStyle::with_fill(cfg.background))
        .draw(display)?;

    let Some(snap) = snapshot else {
        return Ok(());
    };
    if snap.frames() == 0 || snap.channels() == 0 {
        return Ok(());
    }

    match cfg.style {
        TraceStyle::Separated => draw_1d(display, area, cfg, snap, false),
        TraceStyle::Overlapped => draw_1d(display, area, cfg, snap, true),
        TraceStyle::Vector => draw_2d(display, area, cfg, snap),
    }
}

fn channel_color(colors: &[Rgb888], ch: usize) -> Rgb888 {
    colors.get(ch).copied().unwrap_or(Rgb888::WHITE)
}

/// Time-domain styles. Each channel decimates independently; separated
/// mode stacks one band per channel, overlapped mode draws everything
/// onto one full-height band.
fn draw_1d<D>(
    display: &mut D,
    area: Rectangle,
    cfg: &RenderConfig,
    snap: &FrameSnapshot<'_>,
    overlapped: bool,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let channels = snap.channels();
    let width = area.size.width;

    // positive samples plot upward, hence the negated ratio
    let mut y_ratio = -cfg.y_zoom * area.size.height as f32 * 0.5;
    let mut band = area.size.height as f32;
    if !overlapped {
        y_ratio /= channels as f32;
        band /= channels as f32;
    }

    let style = |color| PrimitiveStyle::with_stroke(color, 1);

    for ch in 0..channels {
        let row = snap.channel(ch);
        let y_origin =
            area.top_left.y as f32 + band * if overlapped { 0.5 } else { ch as f32 + 0.5 };
        let color = channel_color(&cfg.colors, ch);

        match decimate(row, width) {
            Trace::Empty => {}
            Trace::Points(pts) => {
                let pitch = cfg.x_zoom * width as f32 / (row.len() - 1) as f32;
                let x0 = area.top_left.x as f32;
                let points: Vec<Point> = pts
                    .iter()
                    .map(|&[f, v]| {
                        Point::new(
                            (x0 + (cfg.x_offset + f) * pitch).round() as i32,
                            (y_origin + v * y_ratio).round() as i32,
                        )
                    })
                    .collect();
                Polyline::new(&points).into_styled(style(color)).draw(display)?;
            }
            Trace::Columns(cols) => {
                for col in &cols {
                    let x = area.top_left.x + col.x as i32;
                    let top = (y_origin + col.max * y_ratio).round() as i32;
                    let bottom = (y_origin + col.min * y_ratio).round() as i32;
                    Line::new(Point::new(x, top), Point::new(x, bottom))
                        .into_styled(style(color))
                        .draw(display)?;
                }
            }
        }
    }
    Ok(())
}

/// Vector style: channel 0 on x, channel 1 on y (0 when absent). Both
/// axes carry sample values, so `y_zoom` scales both, square against the
/// smaller surface dimension to keep the plot undistorted.
fn draw_2d<D>(
    display: &mut D,
    area: Rectangle,
    cfg: &RenderConfig,
    snap: &FrameSnapshot<'_>,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb888>,
{
    let color = channel_color(&cfg.colors, 0);
    let min_size = area.size.width.min(area.size.height) as f32;
    let x_ratio = cfg.y_zoom * min_size * 0.5;
    let y_ratio = -x_ratio;
    let center = area.center();

    let xs = snap.channel(0);
    let ys = (snap.channels() >= 2).then(|| snap.channel(1));

    let points: Vec<Point> = (0..snap.frames())
        .map(|f| {
            let x = xs[f];
            let y = ys.map(|row| row[f]).unwrap_or(0.0);
            Point::new(
                (center.x as f32 + x * x_ratio).round() as i32,
                (center.y as f32 + y * y_ratio).round() as i32,
            )
        })
        .collect();

    Polyline::new(&points)
        .into_styled(PrimitiveStyle::with_stroke(color, 1))
        .draw(display)
}
