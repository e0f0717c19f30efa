//! Output-path computation and collision-safe write rules.
//!
//! The output tree is `<output>/<domain>[/<timestamp>]/<subdir>/<filename>`,
//! with the timestamp layer present only in `all` mode. Because different
//! snapshots can need the same path as both a file and a directory, the
//! write path repairs collisions before any byte lands on disk.

use std::path::{Path, PathBuf};

use tracing::debug;

use waybackup_core::{Mode, url_split};

/// Windows refuses paths beyond this length.
pub const NT_MAX_PATH: usize = 255;

/// Compute the output file for a snapshot.
///
/// `url_archive` is the canonical archive URL; the origin part after the
/// `id_/` marker decides domain, subdir and filename (defaulting to
/// `index.html` when the origin path has no final segment).
pub fn output_path(output: &Path, mode: Mode, url_archive: &str, timestamp: &str) -> PathBuf {
    let origin = url_archive
        .split_once("id_/")
        .map_or(url_archive, |(_, rest)| rest);
    let split = url_split(origin, true);

    let mut dir = output.join(&split.domain);
    if mode.timestamped_layout() {
        dir = dir.join(timestamp);
    }
    if !split.subdir.is_empty() {
        dir = dir.join(&split.subdir);
    }
    dir.join(&split.filename)
}

/// Whether the path would exceed the Windows path-length limit.
pub fn path_too_long(path: &Path) -> bool {
    cfg!(windows) && path.as_os_str().len() > NT_MAX_PATH
}

/// Minimal magic-bytes check: does this body look like HTML?
///
/// Only used to pick between `index.html` and a basename-derived filename
/// when a write target collides with a directory.
pub fn sniff_is_html(body: &[u8]) -> bool {
    let body = body.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(body);
    let trimmed: Vec<u8> = body
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take(16)
        .map(|b| b.to_ascii_lowercase())
        .collect();

    [
        b"<!doctype html".as_slice(),
        b"<html",
        b"<head",
        b"<body",
        b"<script",
        b"<!--",
    ]
    .iter()
    .any(|marker| trimmed.starts_with(marker))
}

/// Repair collisions around `output_file` and return the path the body
/// should actually be written to.
///
/// Two cases:
/// - the parent directory currently is a *file*: move it aside, create the
///   directory, and rename the old file into it (`index.html` when its body
///   sniffs as HTML, the directory's basename otherwise)
/// - `output_file` itself currently is a *directory*: the file lands inside
///   it, as `index.html` when the new body sniffs as HTML, as the
///   directory's basename otherwise
pub fn prepare_target(output_file: &Path, body: &[u8]) -> std::io::Result<PathBuf> {
    if let Some(dir) = output_file.parent() {
        if dir.is_file() {
            relocate_blocking_file(dir)?;
        } else {
            std::fs::create_dir_all(dir)?;
        }
    }

    if output_file.is_dir() {
        let name = if sniff_is_html(body) {
            "index.html".to_string()
        } else {
            basename(output_file)
        };
        return Ok(output_file.join(name));
    }

    Ok(output_file.to_path_buf())
}

/// A prior fetch stored a bare resource where a directory is now needed:
/// move the file aside, create the directory, move the file back in.
fn relocate_blocking_file(dir: &Path) -> std::io::Result<()> {
    let mut aside = dir.as_os_str().to_owned();
    aside.push("_exist");
    let aside = PathBuf::from(aside);

    std::fs::rename(dir, &aside)?;
    std::fs::create_dir_all(dir)?;

    let body = std::fs::read(&aside)?;
    let name = if sniff_is_html(&body) {
        "index.html".to_string()
    } else {
        basename(dir)
    };

    let target = dir.join(name);
    debug!(from = %aside.display(), to = %target.display(), "moved blocking file into directory");
    std::fs::rename(&aside, target)
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "index.html".to_string(), |n| n.to_string_lossy().into_owned())
}
