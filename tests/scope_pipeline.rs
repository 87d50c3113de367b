//! End-to-end: fake server segment -> connect -> bind -> publish ->
//! tick -> render, through the public API only.

mod common;

use common::FakeServer;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use shmscope::{
    ConnectError, FrameSurface, RenderConfig, ScopeBufferReader, ScopeMonitor, ScopeShm,
    StartError, TraceStyle,
};
use std::sync::Arc;

const PORT: u16 = 57110;

fn monitor_for(server: &FakeServer, config: RenderConfig) -> ScopeMonitor {
    let mut m = ScopeMonitor::new(config);
    m.set_shm_dir(server.shm_dir());
    m.set_server_port(server.port()).unwrap();
    m.set_buffer_index(0);
    // drive ticks from the test loop, not wall-clock
    m.set_update_interval_ms(0);
    m
}

#[test]
fn separated_scene_from_live_segment() {
    // 2 channels, 512-frame ring, 500 frames published onto a 200px
    // surface: bucket mode with exactly one column per pixel
    let mut server = FakeServer::start(PORT, &[(2, 512)]);
    let mut monitor = monitor_for(
        &server,
        RenderConfig {
            colors: vec![Rgb888::CSS_ORANGE],
            ..Default::default()
        },
    );
    monitor.start().unwrap();
    assert_eq!(monitor.channels(), 2);
    assert_eq!(monitor.max_frames(), 512);

    // nothing published yet: no redraw, background only
    assert!(!monitor.tick());
    let mut surface = FrameSurface::new(200, 100, Rgb888::RED);
    let frame = surface.frame();
    monitor.render(&mut surface, frame).unwrap();
    assert_eq!(surface.get(100, 25), Some(Rgb888::BLACK));

    let silence = vec![0.0f32; 500];
    server.publish(0, &[&silence, &silence]);
    assert!(monitor.tick());
    monitor.render(&mut surface, frame).unwrap();

    // flatlines at both band centers; channel 1 past the color list
    assert_eq!(surface.get(100, 25), Some(Rgb888::CSS_ORANGE));
    assert_eq!(surface.get(100, 75), Some(Rgb888::WHITE));
    // one redraw per publish
    assert!(!monitor.tick());
}

#[test]
fn point_mode_scene() {
    // 50 frames on 200px: point mode, pitch 200/49
    let mut server = FakeServer::start(PORT, &[(1, 64)]);
    let mut monitor = monitor_for(
        &server,
        RenderConfig { style: TraceStyle::Overlapped, ..Default::default() },
    );
    monitor.start().unwrap();

    let silence = vec![0.0f32; 50];
    server.publish(0, &[&silence]);
    assert!(monitor.tick());

    let mut surface = FrameSurface::new(200, 100, Rgb888::BLACK);
    let frame = surface.frame();
    monitor.render(&mut surface, frame).unwrap();
    // the polyline spans the full width at the midline
    for x in [0u32, 99, 199] {
        assert_eq!(surface.get(x, 50), Some(Rgb888::WHITE), "x={x}");
    }
    assert_eq!(surface.get(100, 10), Some(Rgb888::BLACK));
}

#[test]
fn vector_scene_plots_phase() {
    let mut server = FakeServer::start(PORT, &[(2, 32)]);
    let mut monitor = monitor_for(
        &server,
        RenderConfig { style: TraceStyle::Vector, ..Default::default() },
    );
    monitor.start().unwrap();

    // constant (0.5, -0.5): one spot below-right of center
    server.publish(0, &[&[0.5f32; 8], &[-0.5f32; 8]]);
    assert!(monitor.tick());

    let mut surface = FrameSurface::new(100, 100, Rgb888::BLACK);
    let frame = surface.frame();
    monitor.render(&mut surface, frame).unwrap();
    // center (49,49), both offsets 0.5 * 50 = 25, y inverted
    assert_eq!(surface.get(74, 74), Some(Rgb888::WHITE));
    assert_eq!(surface.get(49, 49), Some(Rgb888::BLACK));
}

#[test]
fn unreachable_endpoint_degrades_cleanly() {
    // a directory with no segment at all
    let dir = tempfile::tempdir().unwrap();
    let mut monitor = ScopeMonitor::new(RenderConfig::default());
    monitor.set_shm_dir(dir.path());
    monitor.set_server_port(PORT).unwrap();
    monitor.set_buffer_index(0);

    match monitor.start() {
        Err(StartError::Connect(ConnectError::NotFound { .. })) => {}
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert!(!monitor.is_running());
    assert!(!monitor.tick());

    let mut surface = FrameSurface::new(32, 32, Rgb888::WHITE);
    let frame = surface.frame();
    monitor.render(&mut surface, frame).unwrap();
    assert_eq!(surface.get(16, 16), Some(Rgb888::BLACK));
}

#[test]
fn overclaiming_writer_is_clamped() {
    let mut server = FakeServer::start(PORT, &[(1, 512)]);
    server.publish_count(0, 9999);

    let shm = Arc::new(ScopeShm::connect_in(server.shm_dir(), server.port()).unwrap());
    let mut reader = ScopeBufferReader::bind(&shm, 0);
    let pull = reader.pull();
    assert!(pull.fresh);
    assert_eq!(pull.frames, 512);
    assert_eq!(reader.snapshot().unwrap().frames(), 512);
}

#[test]
fn rebind_while_running_tracks_the_new_buffer() {
    let mut server = FakeServer::start(PORT, &[(1, 64), (2, 128)]);
    let mut monitor = monitor_for(&server, RenderConfig::default());
    monitor.start().unwrap();
    assert_eq!((monitor.channels(), monitor.max_frames()), (1, 64));

    server.publish(1, &[&[0.0f32; 100], &[0.0f32; 100]]);
    monitor.set_buffer_index(1);
    assert_eq!((monitor.channels(), monitor.max_frames()), (2, 128));
    assert!(monitor.tick());

    let mut surface = FrameSurface::new(100, 100, Rgb888::BLACK);
    let frame = surface.frame();
    monitor.render(&mut surface, frame).unwrap();
    // two separated bands from the freshly bound buffer
    assert_eq!(surface.get(50, 25), Some(Rgb888::WHITE));
    assert_eq!(surface.get(50, 75), Some(Rgb888::WHITE));
}

#[test]
fn stop_releases_the_segment_and_stays_stopped() {
    let mut server = FakeServer::start(PORT, &[(1, 64)]);
    let mut monitor = monitor_for(&server, RenderConfig::default());
    monitor.start().unwrap();
    server.publish(0, &[&[0.0f32; 32]]);
    assert!(monitor.tick());

    monitor.stop();
    monitor.stop();
    assert!(!monitor.is_running());
    server.publish(0, &[&[0.0f32; 32]]);
    assert!(!monitor.tick());

    // restart picks the session back up
    monitor.start().unwrap();
    server.publish(0, &[&[0.0f32; 32]]);
    assert!(monitor.tick());
}
