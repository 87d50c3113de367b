/*
 *  reader.rs
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

//! Per-buffer reader bound to an open scope segment.

use log::warn;
use std::sync::Arc;
use std::sync::atomic::{Ordering, fence};
use thiserror::Error;

use crate::shm::{BufferDesc, ScopeShm, layout};

#[derive(Debug, Error)]
pub enum BindError {
    #[error("no scope buffer at index {index} (segment has {count})")]
    NoSuchBuffer { index: u32, count: usize },
}

/// Result of one non-blocking pull.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pull {
    /// The writer published since our last pull and frames are available.
    pub fresh: bool,
    /// Currently populated frames, clamped to the buffer capacity.
    pub frames: usize,
}

impl Pull {
    const NOTHING: Pull = Pull { fresh: false, frames: 0 };
}

/// Reader for one scope buffer. Binding against a bad index yields a
/// reader that is invalid forever; nothing here retries. Rebinding means
/// dropping this reader and binding a fresh one.
pub struct ScopeBufferReader {
    shm: Arc<ScopeShm>,
    binding: Result<BufferDesc, BindError>,
    last_seq: Option<u32>,
    frames: usize,
}

impl ScopeBufferReader {
    pub fn bind(shm: &Arc<ScopeShm>, index: u32) -> Self {
        let binding = match shm.desc(index as usize) {
            Some(desc) => Ok(desc),
            None => {
                let err = BindError::NoSuchBuffer { index, count: shm.buffer_count() };
                warn!("scope reader: {err}");
                Err(err)
            }
        };
        Self { shm: Arc::clone(shm), binding, last_seq: None, frames: 0 }
    }

    #[inline]
    pub fn valid(&self) -> bool {
        self.binding.is_ok()
    }

    pub fn bind_error(&self) -> Option<&BindError> {
        self.binding.as_ref().err()
    }

    pub fn channels(&self) -> usize {
        self.binding.as_ref().map(|d| d.channels).unwrap_or(0)
    }

    pub fn max_frames(&self) -> usize {
        self.binding.as_ref().map(|d| d.max_frames).unwrap_or(0)
    }

    /// Non-blocking query of the writer's publish state. Never waits on
    /// the producer; on an invalid reader this is a no-op.
    pub fn pull(&mut self) -> Pull {
        let Ok(desc) = &self.binding else {
            return Pull::NOTHING;
        };

        let seq = self.shm.read_u32(desc.header_off + layout::SEQUENCE_OFF);
        let count = self.shm.read_u32(desc.header_off + layout::FRAME_COUNT_OFF) as usize;
        // order the header words before any sample reads this tick
        fence(Ordering::Acquire);

        // A writer wilder than the contract still can't make us read past
        // the row; the excess frames simply aren't visible.
        let frames = count.min(desc.max_frames);
        let fresh = frames > 0 && self.last_seq != Some(seq);

        self.last_seq = Some(seq);
        self.frames = frames;
        Pull { fresh, frames }
    }

    /// View of the frames reported by the last `pull`. None when nothing
    /// is available. The view is only meaningful until the next pull; a
    /// concurrent publish can tear it (accepted, see `shm`).
    pub fn snapshot(&self) -> Option<FrameSnapshot<'_>> {
        let desc = self.binding.as_ref().ok()?;
        if self.frames == 0 {
            return None;
        }
        Some(FrameSnapshot { shm: &self.shm, desc: *desc, frames: self.frames })
    }
}

/// Non-owning, bounds-checked view of the channel-major sample matrix.
/// Shape is `channels x max_frames`; only the leading `frames()` entries
/// of each row are valid to read.
#[derive(Clone, Copy)]
pub struct FrameSnapshot<'a> {
    shm: &'a ScopeShm,
    desc: BufferDesc,
    frames: usize,
}

impl<'a> FrameSnapshot<'a> {
    #[inline]
    pub fn channels(&self) -> usize {
        self.desc.channels
    }

    #[inline]
    pub fn max_frames(&self) -> usize {
        self.desc.max_frames
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Valid prefix of channel `ch`.
    ///
    /// Panics if `ch >= channels()`.
    #[inline]
    pub fn channel(&self, ch: usize) -> &'a [f32] {
        self.shm.channel_samples(&self.desc, ch, self.frames)
    }
}
