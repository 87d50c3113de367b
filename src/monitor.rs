/*
 *  monitor.rs
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

//! Lifecycle glue: one monitor owns one connection, one reader and the
//! poll scheduler, and hands the host a tick/render pair. Everything
//! runs on the host's thread; no lock anywhere.

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::config::RenderConfig;
use crate::pacer::PollScheduler;
use crate::reader::ScopeBufferReader;
use crate::render;
use crate::shm::{ConnectError, ScopeShm};
use crate::shm_path::DEFAULT_SHM_DIR;

#[derive(Debug, Error)]
pub enum StartError {
    #[error("server port not set")]
    NoPort,
    #[error("buffer index not set")]
    NoBuffer,
    #[error(transparent)]
    Connect(#[from] ConnectError),
}

/// Rejections of settings that are immutable while running.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error("cannot change server port while running")]
    RunningPortChange,
}

pub struct ScopeMonitor {
    port: Option<u16>,
    buffer_index: Option<u32>,
    shm_dir: PathBuf,
    config: RenderConfig,
    shm: Option<Arc<ScopeShm>>,
    reader: Option<ScopeBufferReader>,
    scheduler: PollScheduler,
    running: bool,
}

impl ScopeMonitor {
    pub fn new(config: RenderConfig) -> Self {
        let scheduler = PollScheduler::new(config.interval_ms as u64);
        Self {
            port: None,
            buffer_index: None,
            shm_dir: PathBuf::from(DEFAULT_SHM_DIR),
            config,
            shm: None,
            reader: None,
            scheduler,
            running: false,
        }
    }

    /// Where segments are looked up; defaults to `/dev/shm`.
    pub fn set_shm_dir(&mut self, dir: impl Into<PathBuf>) {
        self.shm_dir = dir.into();
    }

    /// The endpoint is fixed for the lifetime of a session; stop first
    /// to move to another server.
    pub fn set_server_port(&mut self, port: u16) -> Result<(), MonitorError> {
        if self.running {
            warn!("scope: cannot change server port while running");
            return Err(MonitorError::RunningPortChange);
        }
        self.port = Some(port);
        Ok(())
    }

    /// Select the scope buffer. While running this releases the current
    /// reader before binding the new index, so nothing leaks.
    pub fn set_buffer_index(&mut self, index: u32) {
        if self.running {
            self.reader = None;
            if let Some(shm) = &self.shm {
                self.reader = Some(ScopeBufferReader::bind(shm, index));
            }
        }
        self.buffer_index = Some(index);
    }

    /// Swap the render configuration; the poll interval follows it.
    pub fn set_config(&mut self, config: RenderConfig) {
        self.scheduler.set_interval_ms(config.interval_ms as i64);
        self.config = config;
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn update_interval_ms(&self) -> u64 {
        self.scheduler.interval_ms()
    }

    pub fn set_update_interval_ms(&mut self, interval_ms: i64) {
        self.scheduler.set_interval_ms(interval_ms);
        self.config.interval_ms = interval_ms.max(0) as u32;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn channels(&self) -> usize {
        self.reader.as_ref().map(|r| r.channels()).unwrap_or(0)
    }

    pub fn max_frames(&self) -> usize {
        self.reader.as_ref().map(|r| r.max_frames()).unwrap_or(0)
    }

    /// Connect and bind, then arm the scheduler. A no-op when already
    /// running. On failure nothing is left behind: the monitor stays
    /// stopped and idle.
    pub fn start(&mut self) -> Result<(), StartError> {
        if self.running {
            return Ok(());
        }
        let port = self.port.ok_or(StartError::NoPort)?;
        let index = self.buffer_index.ok_or(StartError::NoBuffer)?;

        let shm = Arc::new(ScopeShm::connect_in(&self.shm_dir, port)?);
        let reader = ScopeBufferReader::bind(&shm, index);
        if !reader.valid() {
            // keep running with the dead reader; it pulls nothing, ever
            warn!("scope: buffer {index} not present in segment {}", shm.path().display());
        }

        info!("scope monitor started (port {port}, buffer {index})");
        self.shm = Some(shm);
        self.reader = Some(reader);
        self.scheduler.set_interval_ms(self.config.interval_ms as i64);
        self.scheduler.start();
        self.running = true;
        Ok(())
    }

    /// Idempotent. Halts the scheduler and releases reader and mapping;
    /// no tick fires afterward.
    pub fn stop(&mut self) {
        // reader first; it holds the mapping alive
        self.reader = None;
        self.shm = None;
        self.scheduler.stop();
        if self.running {
            info!("scope monitor stopped");
        }
        self.running = false;
    }

    /// One cooperative pass: when the poll deadline elapsed, pull; true
    /// means fresh frames arrived and the host should redraw.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> bool {
        if !self.scheduler.due_at(now) {
            return false;
        }
        match self.reader.as_mut() {
            Some(reader) => reader.pull().fresh,
            None => false,
        }
    }

    /// Paint the current scene: background always, waveform only while
    /// running with frames available.
    pub fn render<D>(&self, display: &mut D, area: Rectangle) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = Rgb888>,
    {
        let snapshot = if self.running {
            self.reader.as_ref().and_then(|r| r.snapshot())
        } else {
            None
        };
        render::draw(display, area, &self.config, snapshot.as_ref())
    }

    pub fn segment_path(&self) -> Option<&Path> {
        self.shm.as_deref().map(|s| s.path())
    }
}

impl Drop for ScopeMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraceStyle;
    use crate::shm::test_segment::{Writer, segment_bytes};
    use crate::shm_path::segment_path_in;
    use crate::surface::FrameSurface;
    use std::fs;
    use std::time::Duration;

    const PORT: u16 = 57110;

    fn seed_segment(dir: &Path, bufs: &[(u32, u32)]) {
        fs::write(segment_path_in(dir, PORT), segment_bytes(bufs)).unwrap();
    }

    fn monitor_in(dir: &Path) -> ScopeMonitor {
        let mut m = ScopeMonitor::new(RenderConfig::default());
        m.set_shm_dir(dir);
        m.set_server_port(PORT).unwrap();
        m.set_buffer_index(0);
        m
    }

    #[test]
    fn unreachable_endpoint_stays_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let mut m = monitor_in(dir.path());

        match m.start() {
            Err(StartError::Connect(ConnectError::NotFound { .. })) => {}
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(!m.is_running());
        // ticks never fire on a stopped monitor
        assert!(!m.tick_at(Instant::now() + Duration::from_secs(1)));

        // and render degrades to background only
        let mut s = FrameSurface::new(8, 8, Rgb888::WHITE);
        let frame = s.frame();
        m.render(&mut s, frame).unwrap();
        assert_eq!(s.get(4, 4), Some(Rgb888::BLACK));
    }

    #[test]
    fn start_requires_port_and_buffer() {
        let mut m = ScopeMonitor::new(RenderConfig::default());
        assert!(matches!(m.start(), Err(StartError::NoPort)));
        m.set_server_port(PORT).unwrap();
        assert!(matches!(m.start(), Err(StartError::NoBuffer)));
    }

    #[test]
    fn port_change_rejected_while_running() {
        let dir = tempfile::tempdir().unwrap();
        seed_segment(dir.path(), &[(1, 16)]);
        let mut m = monitor_in(dir.path());
        m.start().unwrap();

        assert_eq!(m.set_server_port(57120), Err(MonitorError::RunningPortChange));
        // still on the original segment
        assert!(
            m.segment_path()
                .is_some_and(|p| p.ends_with("scsynth-scope-57110"))
        );

        m.stop();
        m.set_server_port(57120).unwrap();
    }

    #[test]
    fn stop_twice_is_stop_once() {
        let dir = tempfile::tempdir().unwrap();
        seed_segment(dir.path(), &[(1, 16)]);
        let mut m = monitor_in(dir.path());
        m.start().unwrap();

        m.stop();
        assert!(!m.is_running());
        assert!(m.segment_path().is_none());
        m.stop();
        assert!(!m.is_running());
        assert!(m.segment_path().is_none());
        assert!(!m.tick_at(Instant::now() + Duration::from_secs(1)));
    }

    #[test]
    fn tick_reports_fresh_data_once() {
        let dir = tempfile::tempdir().unwrap();
        let bufs = [(1u32, 32u32)];
        seed_segment(dir.path(), &bufs);
        let mut m = monitor_in(dir.path());
        m.set_update_interval_ms(0); // tick on every pass
        m.start().unwrap();

        // nothing published yet
        assert!(!m.tick());

        let mut w = Writer::open(&segment_path_in(dir.path(), PORT), 0, &bufs);
        w.publish(&[&[0.25, -0.25, 0.5]]);
        assert!(m.tick());
        // no republish: no redraw requested
        assert!(!m.tick());
    }

    #[test]
    fn rebind_while_running_switches_buffers() {
        let dir = tempfile::tempdir().unwrap();
        let bufs = [(1u32, 16u32), (4u32, 64u32)];
        seed_segment(dir.path(), &bufs);
        let mut m = monitor_in(dir.path());
        m.start().unwrap();
        assert_eq!((m.channels(), m.max_frames()), (1, 16));

        m.set_buffer_index(1);
        assert_eq!((m.channels(), m.max_frames()), (4, 64));
        assert!(m.is_running());

        // out-of-range rebind leaves a permanently dead reader
        m.set_buffer_index(9);
        assert_eq!(m.channels(), 0);
        assert!(!m.tick_at(Instant::now() + Duration::from_secs(1)));
    }

    #[test]
    fn start_is_a_noop_while_running() {
        let dir = tempfile::tempdir().unwrap();
        seed_segment(dir.path(), &[(1, 16)]);
        let mut m = monitor_in(dir.path());
        m.start().unwrap();
        m.start().unwrap();
        assert!(m.is_running());
    }

    #[test]
    fn end_to_end_render_pass() {
        let dir = tempfile::tempdir().unwrap();
        let bufs = [(2u32, 512u32)];
        seed_segment(dir.path(), &bufs);

        let mut m = ScopeMonitor::new(RenderConfig {
            style: TraceStyle::Separated,
            colors: vec![Rgb888::CSS_ORANGE],
            ..Default::default()
        });
        m.set_shm_dir(dir.path());
        m.set_server_port(PORT).unwrap();
        m.set_buffer_index(0);
        m.set_update_interval_ms(0);
        m.start().unwrap();

        let silence = vec![0.0f32; 500];
        let mut w = Writer::open(&segment_path_in(dir.path(), PORT), 0, &bufs);
        w.publish(&[&silence, &silence]);
        assert!(m.tick());

        let mut s = FrameSurface::new(200, 100, Rgb888::BLACK);
        let frame = s.frame();
        m.render(&mut s, frame).unwrap();
        // channel 0 in the configured color, channel 1 in fallback white
        assert_eq!(s.get(100, 25), Some(Rgb888::CSS_ORANGE));
        assert_eq!(s.get(100, 75), Some(Rgb888::WHITE));
    }
}
