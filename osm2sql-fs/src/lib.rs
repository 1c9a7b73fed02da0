//! Filesystem helpers for osm2sql, built on `cap-std` and `camino`.
//!
//! Inputs are opened and output locations prepared through capability
//! handles rooted at the nearest ambient directory, so the rest of the
//! workspace never touches `std::fs` directly.
#![forbid(unsafe_code)]

use std::io;
use std::path::Component;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

/// Open an input file for reading.
pub fn open_input(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Whether `path` names an existing regular file.
///
/// A missing file or parent directory is `Ok(false)`; other failures are
/// returned.
pub fn is_regular_file(path: &Utf8Path) -> io::Result<bool> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let Some(name) = path.file_name() else {
        return Ok(false);
    };
    let dir = match fs_utf8::Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    match dir.metadata(name) {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Create every missing directory above `path`.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() {
        return Ok(());
    }
    let (base, relative) = split_root(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base.create_dir_all(&relative)
}

/// Split a directory path into a capability for its root (`/`, a Windows
/// drive, or `.`) and the remaining relative path.
fn split_root(dir: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let root = match dir.as_std_path().components().next() {
        Some(Component::Prefix(prefix)) => {
            let prefix = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            Utf8PathBuf::from(format!("{prefix}{}", std::path::MAIN_SEPARATOR))
        }
        Some(Component::RootDir) => Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string()),
        _ => Utf8PathBuf::from("."),
    };
    let relative = if root.as_str() == "." {
        dir.to_path_buf()
    } else {
        dir.strip_prefix(&root)
            .map_err(|_| io::Error::other(format!("cannot strip {root} from {dir}")))?
            .to_path_buf()
    };
    let base = fs_utf8::Dir::open_ambient_dir(&root, ambient_authority())?;
    Ok((base, relative))
}
