//! Small filesystem helpers built on capability-scoped directory handles.
//!
//! Every helper opens the parent directory with ambient authority and then
//! operates on the file name inside it, so callers only ever hand over one
//! absolute or relative path.

use std::io;

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir, fs_utf8::OpenOptions};

use crate::error::ContainerError;

fn split(path: &Utf8Path) -> io::Result<(&Utf8Path, &str)> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("path is missing a file name: {path}"),
        )
    })?;
    Ok((parent, file_name))
}

/// Reads `path` to a string, returning `None` when the file (or its parent
/// directory) does not exist.
///
/// Invalid UTF-8 is replaced rather than rejected: logs are read while their
/// producer is still appending, so a read may end inside a multi-byte
/// character, and lease files may carry hostnames in any encoding.
///
/// # Errors
///
/// Returns [`ContainerError::Io`] for any failure other than "not found".
pub fn read_optional(path: &Utf8Path) -> Result<Option<String>, ContainerError> {
    let io_error = |err: io::Error| ContainerError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    let (parent, file_name) = split(path).map_err(io_error)?;
    let dir = match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_error(err)),
    };
    match dir.read(file_name) {
        Ok(raw) => Ok(Some(String::from_utf8_lossy(&raw).into_owned())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_error(err)),
    }
}

/// Reports whether `path` exists.
///
/// # Errors
///
/// Propagates permission and other I/O failures; a missing parent directory
/// counts as "does not exist".
pub fn path_exists(path: &Utf8Path) -> io::Result<bool> {
    let (parent, file_name) = split(path)?;
    match Dir::open_ambient_dir(parent, ambient_authority()) {
        Ok(dir) => dir.try_exists(file_name),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Opens `path` for appending, creating it when absent.
///
/// # Errors
///
/// Returns the underlying I/O error when the parent directory cannot be
/// opened or the file cannot be created.
pub fn open_append(path: &Utf8Path) -> io::Result<std::fs::File> {
    let (parent, file_name) = split(path)?;
    let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    let file = dir.open_with(file_name, &options)?;
    Ok(file.into_std())
}
