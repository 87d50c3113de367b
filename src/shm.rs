/*
 *  shm.rs
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

//! Consumer side of the server's scope-buffer segment.
//!
//! The audio server publishes one segment file per instance into
//! `/dev/shm` and keeps writing sample frames into it while it runs.
//! We map the file read-only and pull whatever is currently visible;
//! there is no lock and no barrier between writer and reader, so a
//! frame caught mid-update is an accepted approximation.

use log::debug;
use memmap2::{Mmap, MmapOptions};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::ptr;
use std::slice;
use thiserror::Error;

use crate::shm_path::{segment_path, segment_path_in};

/// Byte layout shared with the server's writer. Kept public so an
/// out-of-process producer (or a test fixture) can agree with the reader
/// byte for byte.
pub mod layout {
    /// "SCP1" in the segment's first word.
    pub const SCOPE_MAGIC: u32 = 0x5343_5031;
    pub const SCOPE_VERSION: u32 = 1;

    /// Sanity caps; a header outside these is treated as corrupt.
    pub const MAX_BUFFERS: u32 = 128;
    pub const MAX_CHANNELS: u32 = 64;
    pub const MAX_FRAMES_CAP: u32 = 1 << 20;

    /// Segment header: magic, version, buffer_count, pad. All u32.
    pub const SEGMENT_HEADER_BYTES: usize = 16;
    pub const MAGIC_OFF: usize = 0;
    pub const VERSION_OFF: usize = 4;
    pub const BUFFER_COUNT_OFF: usize = 8;

    /// Per-buffer header: channels, max_frames, frame_count, sequence.
    /// `sequence` is bumped by the writer on every publish; `frame_count`
    /// is the currently populated prefix of each channel row.
    pub const BUFFER_HEADER_BYTES: usize = 16;
    pub const CHANNELS_OFF: usize = 0;
    pub const MAX_FRAMES_OFF: usize = 4;
    pub const FRAME_COUNT_OFF: usize = 8;
    pub const SEQUENCE_OFF: usize = 12;

    pub fn buffer_header_offset(index: usize) -> usize {
        SEGMENT_HEADER_BYTES + index * BUFFER_HEADER_BYTES
    }

    /// First data byte; buffer data blocks follow the header table in
    /// index order, each `channels * max_frames` little-endian f32,
    /// channel-major with row stride `max_frames`.
    pub fn data_region_offset(buffer_count: usize) -> usize {
        SEGMENT_HEADER_BYTES + buffer_count * BUFFER_HEADER_BYTES
    }
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("no scope segment at {path}")]
    NotFound { path: PathBuf },
    #[error("scope segment too small: {len} bytes, layout needs {need}")]
    TooSmall { len: usize, need: usize },
    #[error("bad segment magic 0x{found:08x}")]
    BadMagic { found: u32 },
    #[error("unsupported segment version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("corrupt segment header: {0}")]
    Corrupt(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolved geometry of one scope buffer inside the segment.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BufferDesc {
    pub channels: usize,
    pub max_frames: usize,
    pub header_off: usize,
    pub data_off: usize,
}

/// An open connection to a server's scope segment. Owns the mapping;
/// readers hold it through an `Arc` and can never outlive it.
#[derive(Debug)]
pub struct ScopeShm {
    _mmap: Mmap, // keep mapping alive
    path: PathBuf,
    base: *const u8,
    len: usize,
    descs: Vec<BufferDesc>,
}

// Read-only access to a mapping we own; the writer lives in another
// process and we only ever observe its words.
unsafe impl Send for ScopeShm {}
unsafe impl Sync for ScopeShm {}

impl ScopeShm {
    /// Connect to the segment a server on `port` publishes under `/dev/shm`.
    pub fn connect(port: u16) -> Result<Self, ConnectError> {
        Self::open_path(&segment_path(port))
    }

    /// Same, with a non-default segment directory (tests, relocated tmpfs).
    pub fn connect_in(dir: &Path, port: u16) -> Result<Self, ConnectError> {
        Self::open_path(&segment_path_in(dir, port))
    }

    /// Map an explicit segment file and validate its header table.
    pub fn open_path(path: &Path) -> Result<Self, ConnectError> {
        let file = OpenOptions::new().read(true).open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConnectError::NotFound { path: path.to_path_buf() }
            } else {
                ConnectError::Io(e)
            }
        })?;

        let len = file.metadata()?.len() as usize;
        if len < layout::SEGMENT_HEADER_BYTES {
            return Err(ConnectError::TooSmall { len, need: layout::SEGMENT_HEADER_BYTES });
        }

        // Safety: we map the whole file read-only and never resize it.
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        let base = mmap.as_ptr();

        let shm = Self { _mmap: mmap, path: path.to_path_buf(), base, len, descs: Vec::new() };
        let descs = shm.validate_and_index()?;
        debug!(
            "scope segment {} mapped: {} buffer(s), {} bytes",
            shm.path.display(),
            descs.len(),
            len
        );
        Ok(Self { descs, ..shm })
    }

    /// Walk the header table once, sanity-check every declared geometry
    /// and precompute data offsets. Geometry words are written once by
    /// the server before it announces the segment, so plain reads are
    /// fine here; only `frame_count`/`sequence` churn afterwards.
    fn validate_and_index(&self) -> Result<Vec<BufferDesc>, ConnectError> {
        let magic = self.read_u32(layout::MAGIC_OFF);
        if magic != layout::SCOPE_MAGIC {
            return Err(ConnectError::BadMagic { found: magic });
        }
        let version = self.read_u32(layout::VERSION_OFF);
        if version != layout::SCOPE_VERSION {
            return Err(ConnectError::UnsupportedVersion {
                found: version,
                supported: layout::SCOPE_VERSION,
            });
        }

        let buffer_count = self.read_u32(layout::BUFFER_COUNT_OFF);
        if buffer_count > layout::MAX_BUFFERS {
            return Err(ConnectError::Corrupt(format!(
                "buffer count {buffer_count} exceeds cap {}",
                layout::MAX_BUFFERS
            )));
        }
        let buffer_count = buffer_count as usize;

        let table_end = layout::data_region_offset(buffer_count);
        if self.len < table_end {
            return Err(ConnectError::TooSmall { len: self.len, need: table_end });
        }

        let mut descs = Vec::with_capacity(buffer_count);
        let mut data_off = table_end;
        for index in 0..buffer_count {
            let header_off = layout::buffer_header_offset(index);
            let channels = self.read_u32(header_off + layout::CHANNELS_OFF);
            let max_frames = self.read_u32(header_off + layout::MAX_FRAMES_OFF);

            if !header_looks_good(channels, max_frames) {
                return Err(ConnectError::Corrupt(format!(
                    "buffer {index}: {channels} channel(s) x {max_frames} frame(s)"
                )));
            }

            let bytes = channels as usize * max_frames as usize * size_of::<f32>();
            let end = data_off
                .checked_add(bytes)
                .ok_or_else(|| ConnectError::Corrupt(format!("buffer {index}: size overflow")))?;
            if end > self.len {
                return Err(ConnectError::TooSmall { len: self.len, need: end });
            }

            descs.push(BufferDesc {
                channels: channels as usize,
                max_frames: max_frames as usize,
                header_off,
                data_off,
            });
            data_off = end;
        }

        Ok(descs)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn buffer_count(&self) -> usize {
        self.descs.len()
    }

    pub(crate) fn desc(&self, index: usize) -> Option<BufferDesc> {
        self.descs.get(index).copied()
    }

    /// Volatile word read; the writer mutates `frame_count`/`sequence`
    /// behind our back and the compiler must not cache them.
    #[inline]
    pub(crate) fn read_u32(&self, off: usize) -> u32 {
        debug_assert!(off + size_of::<u32>() <= self.len);
        // Safety: offset validated against the mapped length.
        unsafe { ptr::read_volatile(self.base.add(off) as *const u32) }
    }

    /// Leading `frames` samples of channel `ch`, bounds-checked against
    /// the geometry fixed at connect time.
    #[inline]
    pub(crate) fn channel_samples(&self, desc: &BufferDesc, ch: usize, frames: usize) -> &[f32] {
        assert!(ch < desc.channels, "channel {ch} out of {}", desc.channels);
        assert!(frames <= desc.max_frames);
        let off = desc.data_off + ch * desc.max_frames * size_of::<f32>();
        debug_assert!(off + frames * size_of::<f32>() <= self.len);
        // Safety: the row lies inside the mapping (validated at connect);
        // f32 needs 4-byte alignment and all offsets are multiples of 16.
        // Concurrent writer updates can tear the values we read, which is
        // the accepted best-effort contract of this protocol.
        unsafe { slice::from_raw_parts(self.base.add(off) as *const f32, frames) }
    }
}

#[inline]
fn header_looks_good(channels: u32, max_frames: u32) -> bool {
    (1..=layout::MAX_CHANNELS).contains(&channels)
        && (1..=layout::MAX_FRAMES_CAP).contains(&max_frames)
}
