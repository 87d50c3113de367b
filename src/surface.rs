/*
 *  surface.rs
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

use core::convert::Infallible;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::PixelColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;

/// A runtime-sized framebuffer for embedded-graphics. Sized at startup
/// from the configured surface geometry, unlike the const-generic
/// framebuffer crates.
#[derive(Debug, Clone)]
pub struct FrameSurface<C: PixelColor> {
    buf: Vec<C>,
    width: u32,
    height: u32,
}

impl<C: PixelColor> FrameSurface<C> {
    pub fn new(width: u32, height: u32, fill: C) -> Self {
        Self {
            buf: vec![fill; (width * height) as usize],
            width,
            height,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Full drawable area, for hosts that render edge to edge.
    pub fn frame(&self) -> Rectangle {
        Rectangle::new(Point::zero(), Size::new(self.width, self.height))
    }

    /// Pixel at (x, y); None outside the surface.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Option<C> {
        (x < self.width && y < self.height)
            .then(|| self.buf[(y * self.width + x) as usize])
    }

    /// One row of pixels, top to bottom.
    pub fn row(&self, y: u32) -> &[C] {
        let start = (y * self.width) as usize;
        &self.buf[start..start + self.width as usize]
    }

    pub fn fill(&mut self, color: C) {
        self.buf.fill(color);
    }

    #[inline]
    fn index(&self, p: Point) -> Option<usize> {
        if p.x < 0 || p.y < 0 {
            return None;
        }
        let (x, y) = (p.x as u32, p.y as u32);
        (x < self.width && y < self.height).then(|| (y * self.width + x) as usize)
    }
}

impl<C: PixelColor> OriginDimensions for FrameSurface<C> {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl<C: PixelColor> DrawTarget for FrameSurface<C> {
    type Color = C;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, c) in pixels {
            if let Some(i) = self.index(p) {
                self.buf[i] = c;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color);
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        // fast path for the background fill every render pass starts with
        let clipped = area.intersection(&self.frame());
        if clipped.size.width == 0 || clipped.size.height == 0 {
            return Ok(());
        }
        let x0 = clipped.top_left.x as usize;
        let w = clipped.size.width as usize;
        for row in 0..clipped.size.height as usize {
            let base = (clipped.top_left.y as usize + row) * self.width as usize + x0;
            self.buf[base..base + w].fill(color);
        }
        Ok(())
    }
}
