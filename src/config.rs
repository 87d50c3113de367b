use clap::{ArgAction, Parser, ValueEnum, ValueHint};
use dirs_next::home_dir;
use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::*;
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::pacer::DEFAULT_INTERVAL_MS;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Scene style. The wire-facing numeric surface is 0/1/2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TraceStyle {
    /// One horizontal band per channel.
    Separated,
    /// All channels share the full-height band.
    Overlapped,
    /// Channel 0 against channel 1 (Lissajous).
    Vector,
}

impl TraceStyle {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(TraceStyle::Separated),
            1 => Some(TraceStyle::Overlapped),
            2 => Some(TraceStyle::Vector),
            _ => None,
        }
    }
}

/// Everything the renderer needs for one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub style: TraceStyle,
    pub x_offset: f32,
    pub y_offset: f32,
    pub x_zoom: f32,
    pub y_zoom: f32,
    /// Per-channel trace colors; channels past the end draw white.
    pub colors: Vec<Rgb888>,
    pub background: Rgb888,
    pub interval_ms: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            style: TraceStyle::Separated,
            x_offset: 0.0,
            y_offset: 0.0,
            x_zoom: 1.0,
            y_zoom: 1.0,
            colors: Vec::new(),
            background: Rgb888::BLACK,
            interval_ms: DEFAULT_INTERVAL_MS as u32,
        }
    }
}

/// Parse `#rrggbb` (or bare `rrggbb`). An unparseable entry degrades to
/// black rather than failing the whole list.
pub fn parse_color(s: &str) -> Option<Rgb888> {
    let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
    Some(Rgb888::new(r, g, b))
}

fn color_or_black(s: &str) -> Rgb888 {
    parse_color(s).unwrap_or_else(|| {
        warn!("invalid color '{s}', substituting black");
        Rgb888::BLACK
    })
}

/// File-level configuration. All fields are Options so CLI flags can be
/// layered on top.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub buffer_index: Option<u32>,
    pub style: Option<TraceStyle>,
    pub update_interval_ms: Option<i64>,
    pub x_zoom: Option<f32>,
    pub y_zoom: Option<f32>,
    pub x_offset: Option<f32>,
    pub y_offset: Option<f32>,
    pub colors: Option<Vec<String>>,
    pub background: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// CLI overrides (highest precedence).
#[derive(Debug, Parser, Clone)]
#[command(name = "shmscope", about = "Headless shared-memory oscilloscope", version)]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Server port; discovered from /dev/shm when omitted
    #[arg(short = 'p', long)]
    pub port: Option<u16>,
    /// Scope buffer index inside the segment
    #[arg(short = 'b', long)]
    pub buffer: Option<u32>,
    #[arg(long, value_enum)]
    pub style: Option<TraceStyle>,
    /// Poll interval in milliseconds (negative clamps to 0)
    #[arg(long, allow_negative_numbers = true)]
    pub interval_ms: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    pub x_zoom: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    pub y_zoom: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    pub x_offset: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    pub y_offset: Option<f32>,
    /// Per-channel trace colors, comma-separated #rrggbb
    #[arg(long, value_delimiter = ',')]
    pub colors: Option<Vec<String>>,
    #[arg(long)]
    pub background: Option<String>,
    /// Render surface geometry
    #[arg(long)]
    pub width: Option<u32>,
    #[arg(long)]
    pub height: Option<u32>,
    /// Write a PNG of every redraw into this directory
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub snapshot_dir: Option<PathBuf>,
    /// Exit after this many redraws
    #[arg(long)]
    pub count: Option<u64>,
    /// Dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Effective application configuration after merging and validation.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub server_port: Option<u16>,
    pub buffer_index: u32,
    pub render: RenderConfig,
    pub width: u32,
    pub height: u32,
    pub snapshot_dir: Option<PathBuf>,
    pub count: Option<u64>,
}

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 256;

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<AppConfig, ConfigError> {
    let cli = Cli::parse();

    // 1) file defaults, 2) YAML (explicit path or search)
    let mut file = FileConfig::default();
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            merge(&mut file, read_yaml(p)?);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        merge(&mut file, read_yaml(&p)?);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut file, &cli);

    if cli.dump_config {
        let s = serde_yaml::to_string(&file)?;
        println!("{s}");
        std::process::exit(0);
    }

    // 4) realize + validate
    let app = realize(file, &cli)?;
    Ok(app)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/shmscope/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/shmscope/config.yaml");
        if p.exists() {
            return Some(p);
        }
        let p = home.join(".config/shmscope.yaml");
        if p.exists() {
            return Some(p);
        }
    }
    // project local
    for candidate in &["shmscope.yaml", "config/shmscope.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return Some(p);
        }
    }
    None
}

fn read_yaml(path: &Path) -> Result<FileConfig, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: FileConfig = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut FileConfig, src: FileConfig) {
    macro_rules! take {
        ($field:ident) => {
            if src.$field.is_some() {
                dst.$field = src.$field;
            }
        };
    }
    take!(log_level);
    take!(server_port);
    take!(buffer_index);
    take!(style);
    take!(update_interval_ms);
    take!(x_zoom);
    take!(y_zoom);
    take!(x_offset);
    take!(y_offset);
    take!(colors);
    take!(background);
    take!(width);
    take!(height);
}

fn apply_cli_overrides(cfg: &mut FileConfig, cli: &Cli) {
    merge(
        cfg,
        FileConfig {
            log_level: cli.log_level.clone(),
            server_port: cli.port,
            buffer_index: cli.buffer,
            style: cli.style,
            update_interval_ms: cli.interval_ms,
            x_zoom: cli.x_zoom,
            y_zoom: cli.y_zoom,
            x_offset: cli.x_offset,
            y_offset: cli.y_offset,
            colors: cli.colors.clone(),
            background: cli.background.clone(),
            width: cli.width,
            height: cli.height,
        },
    );
}

/// Turn the merged file-level view into validated runtime configuration.
fn realize(file: FileConfig, cli: &Cli) -> Result<AppConfig, ConfigError> {
    let mut render = RenderConfig::default();
    if let Some(style) = file.style {
        render.style = style;
    }
    if let Some(ms) = file.update_interval_ms {
        // negative clamps to 0, matching the widget surface
        render.interval_ms = ms.max(0) as u32;
    }
    if let Some(z) = file.x_zoom {
        render.x_zoom = z;
    }
    if let Some(z) = file.y_zoom {
        render.y_zoom = z;
    }
    if let Some(o) = file.x_offset {
        render.x_offset = o;
    }
    if let Some(o) = file.y_offset {
        render.y_offset = o;
    }
    if let Some(colors) = &file.colors {
        render.colors = colors.iter().map(|s| color_or_black(s)).collect();
    }
    if let Some(bg) = &file.background {
        render.background = color_or_black(bg);
    }

    let app = AppConfig {
        log_level: file.log_level.unwrap_or_else(|| "info".into()),
        server_port: file.server_port,
        buffer_index: file.buffer_index.unwrap_or(0),
        render,
        width: file.width.unwrap_or(DEFAULT_WIDTH),
        height: file.height.unwrap_or(DEFAULT_HEIGHT),
        snapshot_dir: cli.snapshot_dir.clone(),
        count: cli.count,
    };
    validate(&app)?;
    Ok(app)
}

fn validate(cfg: &AppConfig) -> Result<(), ConfigError> {
    if cfg.width == 0 || cfg.height == 0 {
        return Err(ConfigError::Validation(format!(
            "surface geometry {}x{} is empty",
            cfg.width, cfg.height
        )));
    }
    for (name, v) in [
        ("x_zoom", cfg.render.x_zoom),
        ("y_zoom", cfg.render.y_zoom),
        ("x_offset", cfg.render.x_offset),
        ("y_offset", cfg.render.y_offset),
    ] {
        if !v.is_finite() {
            return Err(ConfigError::Validation(format!("{name} must be finite")));
        }
    }
    Ok(())
}
