use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Segment names follow `scsynth-scope-<port>`.
pub const SEGMENT_PREFIX: &str = "scsynth-scope-";

/// Default location for the server's published segments.
pub const DEFAULT_SHM_DIR: &str = "/dev/shm";

/// Path of the segment a server on `port` would publish into `dir`.
pub fn segment_path_in(dir: &Path, port: u16) -> PathBuf {
    dir.join(format!("{SEGMENT_PREFIX}{port}"))
}

pub fn segment_path(port: u16) -> PathBuf {
    segment_path_in(Path::new(DEFAULT_SHM_DIR), port)
}

/// Scan `dir` for scope segments and return the most recently touched one.
/// Useful when the server port is not known up front.
pub fn find_newest_segment_in(dir: &Path) -> io::Result<PathBuf> {
    let mut best: Option<(PathBuf, SystemTime)> = None;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(SEGMENT_PREFIX) {
            continue;
        }
        let meta = entry.metadata()?;
        let mtime = meta.modified().unwrap_or(UNIX_EPOCH);

        match &mut best {
            None => best = Some((entry.path(), mtime)),
            Some((_, best_time)) if mtime > *best_time => best = Some((entry.path(), mtime)),
            _ => {}
        }
    }

    best.map(|(p, _)| p).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no scope segment found in {}", dir.display()),
        )
    })
}

pub fn find_newest_segment() -> io::Result<PathBuf> {
    find_newest_segment_in(Path::new(DEFAULT_SHM_DIR))
}

/// Recover the server port from a segment path, if the name parses.
pub fn port_of_segment(path: &Path) -> Option<u16> {
    path.file_name()?
        .to_str()?
        .strip_prefix(SEGMENT_PREFIX)?
        .parse()
        .ok()
}
