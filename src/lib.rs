//! shmscope - eyes on the server
//!
//! Real-time consumer of the scope buffers a SuperCollider-style audio
//! server publishes into shared memory. The crate connects to a segment,
//! pulls whatever frames are currently visible without ever blocking on
//! the producer, decimates them to the pixel width of a drawing surface
//! and strokes the result onto any `embedded_graphics::DrawTarget`.
//!
//! The usual wiring is one [`ScopeMonitor`] per scope view:
//!
//! ```no_run
//! use embedded_graphics::pixelcolor::Rgb888;
//! use embedded_graphics::prelude::RgbColor;
//! use shmscope::{FrameSurface, RenderConfig, ScopeMonitor};
//!
//! let mut monitor = ScopeMonitor::new(RenderConfig::default());
//! monitor.set_server_port(57110)?;
//! monitor.set_buffer_index(0);
//! monitor.start()?;
//!
//! let mut surface = FrameSurface::new(640, 256, Rgb888::BLACK);
//! loop {
//!     if monitor.tick() {
//!         let frame = surface.frame();
//!         monitor.render(&mut surface, frame)?;
//!         // hand the surface to the host
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(2));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod decimate;
pub mod monitor;
pub mod pacer;
pub mod reader;
pub mod render;
pub mod shm;
pub mod shm_path;
pub mod surface;

pub use config::{AppConfig, ConfigError, RenderConfig, TraceStyle};
pub use monitor::{MonitorError, ScopeMonitor, StartError};
pub use pacer::PollScheduler;
pub use reader::{BindError, FrameSnapshot, Pull, ScopeBufferReader};
pub use shm::{ConnectError, ScopeShm};
pub use surface::FrameSurface;
