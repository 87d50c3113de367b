//! A stand-in audio server for the integration suite: publishes a scope
//! segment into a private directory using the crate's public layout
//! contract, then feeds frames into it the way the real producer would.

use memmap2::MmapMut;
use shmscope::shm::layout;
use shmscope::shm_path::segment_path_in;
use std::fs::OpenOptions;
use std::path::Path;
use tempfile::TempDir;

pub struct FakeServer {
    dir: TempDir,
    port: u16,
    bufs: Vec<(u32, u32)>,
    map: MmapMut,
    seqs: Vec<u32>,
}

impl FakeServer {
    pub fn start(port: u16, bufs: &[(u32, u32)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = segment_path_in(dir.path(), port);

        let data_bytes: usize = bufs
            .iter()
            .map(|&(ch, mf)| (ch * mf) as usize * size_of::<f32>())
            .sum();
        let total = layout::data_region_offset(bufs.len()) + data_bytes;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .unwrap();
        file.set_len(total as u64).unwrap();
        let mut map = unsafe { MmapMut::map_mut(&file).unwrap() };

        put_u32(&mut map, layout::MAGIC_OFF, layout::SCOPE_MAGIC);
        put_u32(&mut map, layout::VERSION_OFF, layout::SCOPE_VERSION);
        put_u32(&mut map, layout::BUFFER_COUNT_OFF, bufs.len() as u32);
        for (i, &(ch, mf)) in bufs.iter().enumerate() {
            let h = layout::buffer_header_offset(i);
            put_u32(&mut map, h + layout::CHANNELS_OFF, ch);
            put_u32(&mut map, h + layout::MAX_FRAMES_OFF, mf);
        }

        Self {
            dir,
            port,
            bufs: bufs.to_vec(),
            map,
            seqs: vec![0; bufs.len()],
        }
    }

    pub fn shm_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn data_off(&self, index: usize) -> usize {
        let mut off = layout::data_region_offset(self.bufs.len());
        for &(ch, mf) in &self.bufs[..index] {
            off += (ch * mf) as usize * size_of::<f32>();
        }
        off
    }

    /// Write one row per channel into buffer `index` and publish their
    /// common length.
    pub fn publish(&mut self, index: usize, rows: &[&[f32]]) {
        let (channels, max_frames) = self.bufs[index];
        assert_eq!(rows.len(), channels as usize);
        let base = self.data_off(index);
        for (ch, row) in rows.iter().enumerate() {
            assert!(row.len() <= max_frames as usize);
            for (f, v) in row.iter().enumerate() {
                let off = base + (ch * max_frames as usize + f) * size_of::<f32>();
                self.map[off..off + 4].copy_from_slice(&v.to_le_bytes());
            }
        }
        let frames = rows.first().map(|r| r.len()).unwrap_or(0) as u32;
        self.publish_count(index, frames);
    }

    /// Publish a bare frame count (for probing consumer-side clamping).
    pub fn publish_count(&mut self, index: usize, frame_count: u32) {
        self.seqs[index] += 1;
        let seq = self.seqs[index];
        let h = layout::buffer_header_offset(index);
        put_u32(&mut self.map, h + layout::FRAME_COUNT_OFF, frame_count);
        put_u32(&mut self.map, h + layout::SEQUENCE_OFF, seq);
    }
}

fn put_u32(map: &mut MmapMut, off: usize, v: u32) {
    map[off..off + 4].copy_from_slice(&v.to_le_bytes());
}
