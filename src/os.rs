//! Thin layer over operating system services: working directory, location of
//! the running executable and directory manipulation.
//!
//! Paths handed out by this module use forward slashes, see [`crate::path`].

use crate::error::{Error, Result};
use crate::path;
use std::fs;
use std::io;

/// Absolute path of the current working directory, without trailing
/// separator (unless it is the root itself).
pub fn cwd() -> Result<String> {
    let dir = std::env::current_dir()?;
    path::to_unix(&dir.to_string_lossy(), true)
}

/// Absolute path of the running executable.
///
/// On Linux the path is obtained by resolving `/proc/self/exe`.
pub fn exepath() -> Result<String> {
    let exe = std::env::current_exe()?;
    path::to_absolute_cwd(&exe.to_string_lossy())
}

/// Name of the running executable, without `.exe`/`.com` on Windows.
pub fn exename() -> Result<String> {
    let name = path::basename(&exepath()?)?;
    if cfg!(windows) {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".exe") || lower.ends_with(".com") {
            return Ok(name[..name.len() - 4].to_string());
        }
    }
    Ok(name)
}

/// Directory of the running executable.
pub fn exedir() -> Result<String> {
    path::dirname(&exepath()?)
}

/// Value of a symbolic link.
///
/// Always empty on Windows.
pub fn readlink(link: &str) -> Result<String> {
    if cfg!(windows) {
        return Ok(String::new());
    }
    let value = fs::read_link(link)?;
    Ok(value.to_string_lossy().into_owned())
}

fn dir_builder(recursive: bool) -> fs::DirBuilder {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(recursive);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder
}

/// Create a single directory. The parent must exist, `dir` must not.
///
/// An empty path is a no-op.
pub fn mkdir(dir: &str) -> Result<()> {
    if dir.is_empty() {
        return Ok(());
    }
    tracing::debug!(dir = %dir, "creating directory");
    dir_builder(false).create(dir)?;
    Ok(())
}

/// Create a directory including any missing parents.
///
/// Succeeds if the directory exists already; fails if `dir` names an
/// existing non-directory.
pub fn makedirs(dir: &str) -> Result<()> {
    if dir.is_empty() || path::is_dir(dir) {
        return Ok(());
    }
    tracing::debug!(dir = %dir, "creating directory tree");
    dir_builder(true).create(dir)?;
    Ok(())
}

/// Remove an empty directory.
pub fn rmdir(dir: &str) -> Result<()> {
    tracing::debug!(dir = %dir, "removing directory");
    fs::remove_dir(dir)?;
    Ok(())
}

/// Remove a directory together with everything below it.
///
/// Symbolic links inside the tree are removed, never followed.
pub fn rmtree(dir: &str) -> Result<()> {
    let meta = fs::symlink_metadata(dir)?;
    if !meta.is_dir() {
        return Err(io::Error::other(format!("{dir} is not a directory")).into());
    }
    tracing::debug!(dir = %dir, "removing directory tree");
    fs::remove_dir_all(dir)?;
    Ok(())
}

/// Remove everything inside a directory, keeping the directory itself.
///
/// Keeps going when an entry cannot be removed and reports the first failure
/// at the end.
pub fn emptydir(dir: &str) -> Result<()> {
    let mut first_error: Option<Error> = None;
    for entry in fs::read_dir(dir)? {
        let removed = entry.and_then(|entry| {
            let path = entry.path();
            if fs::symlink_metadata(&path)?.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            }
        });
        if let Err(e) = removed {
            tracing::warn!(dir = %dir, error = %e, "failed to remove directory entry");
            if first_error.is_none() {
                first_error = Some(e.into());
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
