//! Output folder and clip file naming.
//!
//! Nothing here ever overwrites: collisions are resolved by appending a
//! timestamp (folders) or a counter (folders and clips).

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Local;
use larvacut_models::Centroid;

use crate::error::{MediaError, MediaResult};

/// Upper bound on `_<n>` suffixes tried before giving up.
const MAX_SUFFIX: u32 = 10_000;

/// Base name used for the output folder and clip names: the file name
/// without its last extension, with every remaining dot removed.
///
/// `2023.05.14.tank2.avi` becomes `20230514tank2`.
pub fn video_base_name(video_path: &Path) -> String {
    let file_name = video_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = match file_name.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => file_name.as_str(),
    };
    let base: String = stem.chars().filter(|&c| c != '.').collect();
    if base.is_empty() {
        "video".to_string()
    } else {
        base
    }
}

/// Create `<root>/<name>`, falling back to `<name><HHMMSS>` and then
/// `<name><HHMMSS>_<n>` if the folder already exists.
pub fn create_unique_dir(root: &Path, name: &str) -> MediaResult<PathBuf> {
    std::fs::create_dir_all(root)?;

    let first = root.join(name);
    if try_create_dir(&first)? {
        return Ok(first);
    }

    let stamped = format!("{name}{}", Local::now().format("%H%M%S"));
    let candidate = root.join(&stamped);
    if try_create_dir(&candidate)? {
        return Ok(candidate);
    }

    for n in 1..=MAX_SUFFIX {
        let candidate = root.join(format!("{stamped}_{n}"));
        if try_create_dir(&candidate)? {
            return Ok(candidate);
        }
    }
    Err(MediaError::internal(format!(
        "no free output folder name for {} under {}",
        name,
        root.display()
    )))
}

/// `Ok(false)` when the directory already exists.
fn try_create_dir(path: &Path) -> MediaResult<bool> {
    match std::fs::create_dir(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(MediaError::from(e)),
    }
}

/// `<base>_f<start_frame>_x<cx>_y<cy>`, the clip name without extension.
pub fn clip_stem(base: &str, start_frame: u64, centroid: Centroid) -> String {
    format!("{base}_f{start_frame}_x{}_y{}", centroid.cx, centroid.cy)
}

/// First free clip file name in `dir` for `stem`, adding `_<n>` on collision.
///
/// A name is taken if it exists on disk or is in `reserved`.
pub fn unique_clip_name(
    dir: &Path,
    stem: &str,
    extension: &str,
    reserved: &HashSet<String>,
) -> MediaResult<String> {
    let free = |name: &String| !reserved.contains(name) && !dir.join(name).exists();

    let name = format!("{stem}.{extension}");
    if free(&name) {
        return Ok(name);
    }
    for n in 1..=MAX_SUFFIX {
        let name = format!("{stem}_{n}.{extension}");
        if free(&name) {
            return Ok(name);
        }
    }
    Err(MediaError::internal(format!("no free clip name for {stem} in {}", dir.display())))
}

/// Remove a file, treating an already missing file as success.
pub fn remove_if_exists(path: &Path) -> MediaResult<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(MediaError::from(e)),
    }
}
