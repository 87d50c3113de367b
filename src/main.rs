/*
 *  main.rs
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

use anyhow::Context;
use chrono::Local;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use env_logger::Env;
use log::{info, warn};
use std::path::Path;
use std::thread::sleep;
use std::time::Duration;

use shmscope::config::{self, AppConfig};
use shmscope::monitor::ScopeMonitor;
use shmscope::surface::FrameSurface;
use shmscope::shm_path;

include!(concat!(env!("OUT_DIR"), "/build_info.rs"));

/// Host-loop nap between cooperative passes; the poll scheduler decides
/// when a pass actually pulls.
const LOOP_NAP: Duration = Duration::from_millis(2);

fn main() -> anyhow::Result<()> {
    let app = config::load().context("loading configuration")?;

    env_logger::Builder::from_env(Env::default().default_filter_or(app.log_level.clone())).init();
    info!("{} v.{} built {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), BUILD_DATE);

    let port = resolve_port(&app)?;
    info!("monitoring server port {port}, scope buffer {}", app.buffer_index);

    let mut monitor = ScopeMonitor::new(app.render.clone());
    monitor.set_server_port(port)?;
    monitor.set_buffer_index(app.buffer_index);
    monitor.start().context("connecting to scope segment")?;
    info!(
        "connected: {} channel(s), {} frame(s) capacity",
        monitor.channels(),
        monitor.max_frames()
    );

    let mut surface = FrameSurface::new(app.width, app.height, app.render.background);
    let mut redraws: u64 = 0;

    loop {
        if monitor.tick() {
            let frame = surface.frame();
            monitor.render(&mut surface, frame)?;
            redraws += 1;

            if let Some(dir) = app.snapshot_dir.as_deref() {
                if let Err(e) = save_snapshot(&surface, dir, redraws) {
                    warn!("snapshot failed: {e:#}");
                }
            }
            if app.count.is_some_and(|n| redraws >= n) {
                break;
            }
        }
        sleep(LOOP_NAP);
    }

    info!("done after {redraws} redraw(s)");
    monitor.stop();
    Ok(())
}

/// Use the configured port, or fall back to the newest published segment.
fn resolve_port(app: &AppConfig) -> anyhow::Result<u16> {
    if let Some(port) = app.server_port {
        return Ok(port);
    }
    let found = shm_path::find_newest_segment().context("discovering a scope segment")?;
    let port = shm_path::port_of_segment(&found)
        .with_context(|| format!("unparseable segment name {}", found.display()))?;
    info!("discovered segment {}", found.display());
    Ok(port)
}

/// Dump the surface as a timestamped PNG.
fn save_snapshot(surface: &FrameSurface<Rgb888>, dir: &Path, n: u64) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    let path = dir.join(format!("scope-{stamp}-{n:05}.png"));

    let mut img = image::RgbImage::new(surface.width(), surface.height());
    for (x, y, px) in img.enumerate_pixels_mut() {
        // surface pixels are always in range for its own geometry
        if let Some(c) = surface.get(x, y) {
            *px = image::Rgb([c.r(), c.g(), c.b()]);
        }
    }
    img.save(&path).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
