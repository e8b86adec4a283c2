//! Syntactic manipulation of path strings.
//!
//! Paths are plain strings in which both the forward slash (`/`) and the
//! backslash (`\`) separate components. None of the functions here touch the
//! filesystem, except [`real_path`] and the existence checks at the bottom of
//! the module.
//!
//! A path has a *root*, which is `"./"` for relative paths, `"/"` for absolute
//! paths and `"X:/"` for paths with a drive specification on hosts that know
//! drive letters. On other hosts the drive `C:` is accepted and treated as `/`,
//! every other drive letter is rejected as an invalid path.

use crate::error::{Error, Result};
use crate::os;
use regex::Regex;
use std::sync::LazyLock;

/// Maximum number of symbolic links followed by [`real_path`].
pub const MAX_LINK_DEPTH: usize = 100;

/// One path component followed by the (collapsed) separator run after it.
static COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^/\\]+)([/\\]+)?").expect("component pattern is valid"));

fn is_sep(c: char) -> bool {
    c == '/' || c == '\\'
}

fn has_drive(path: &str) -> bool {
    path.as_bytes().get(1) == Some(&b':')
}

// ===========================================================================
// validation
// ===========================================================================

/// Whether a string is a valid path identifier.
///
/// This does not check whether anything exists at that path. With `strict`
/// set, a drive specification other than `C:` is considered invalid on hosts
/// without drive letters.
pub fn is_valid(path: &str, strict: bool) -> bool {
    let bytes = path.as_bytes();
    if bytes.is_empty() || bytes[0] == b':' || path.contains("::") {
        return false;
    }
    if has_drive(path) {
        if !bytes[0].is_ascii_alphabetic() {
            return false;
        }
        if bytes.len() == 2 || !is_sep(bytes[2] as char) {
            return false;
        }
        if strict && !cfg!(windows) && !bytes[0].eq_ignore_ascii_case(&b'C') {
            return false;
        }
    }
    true
}

fn validate(path: &str, strict: bool) -> Result<()> {
    if is_valid(path, strict) {
        Ok(())
    } else {
        Err(Error::invalid_path(path))
    }
}

// ===========================================================================
// normalization
// ===========================================================================

/// Path broken into drive, root separator and components.
///
/// Each component keeps the first character of the separator run that
/// followed it, so that normalization can preserve the separator flavor.
struct Parsed<'a> {
    drive: &'a str,
    root_sep: Option<char>,
    comps: Vec<(&'a str, Option<char>)>,
}

fn parse(path: &str) -> Parsed<'_> {
    let (drive, rest) = if has_drive(path) {
        path.split_at(2)
    } else {
        ("", path)
    };
    let root_sep = rest.chars().next().filter(|c| is_sep(*c));
    let body = rest.trim_start_matches(is_sep);
    let comps = COMPONENT
        .captures_iter(body)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            let sep = caps.get(2).and_then(|m| m.as_str().chars().next());
            Some((name, sep))
        })
        .collect();
    Parsed {
        drive,
        root_sep,
        comps,
    }
}

/// Normalize a path without consulting the filesystem.
///
/// Removes `.` components enclosed by separators (including a trailing `/.`),
/// collapses runs of separators to the first separator of each run and
/// resolves `..` components against the component in front of them. Leading
/// `..` components of a relative path are kept; `..` at the root of an
/// absolute path is dropped.
///
/// For example, `"../bla//.//.\bla\\\\\bla/../.."` becomes `"../bla"`.
///
/// # Errors
///
/// [`Error::InvalidPath`] if the string is not a valid path (non-strict check).
pub fn clean(path: &str) -> Result<String> {
    validate(path, false)?;
    let parsed = parse(path);

    let mut comps: Vec<(&str, Option<char>)> = Vec::with_capacity(parsed.comps.len());
    for (i, &(name, sep)) in parsed.comps.iter().enumerate() {
        let enclosed = i > 0 || parsed.root_sep.is_some();
        if name == "." && enclosed {
            if sep.is_none() {
                // trailing "/." takes its separator with it
                if let Some(last) = comps.last_mut() {
                    last.1 = None;
                }
            }
            continue;
        }
        comps.push((name, sep));
    }

    let absolute = parsed.root_sep.is_some();
    let mut stack: Vec<(&str, Option<char>)> = Vec::with_capacity(comps.len());
    for (name, sep) in comps {
        if name == ".." {
            match stack.last() {
                Some(&(top, _)) if top != ".." && top != "." => {
                    stack.pop();
                    if let Some(last) = stack.last_mut() {
                        last.1 = sep;
                    }
                    continue;
                }
                None if absolute => continue,
                _ => {}
            }
        }
        stack.push((name, sep));
    }

    let mut cleaned = String::with_capacity(path.len());
    cleaned.push_str(parsed.drive);
    if let Some(sep) = parsed.root_sep {
        cleaned.push(sep);
    }
    for (name, sep) in stack {
        cleaned.push_str(name);
        if let Some(sep) = sep {
            cleaned.push(sep);
        }
    }
    if cleaned.is_empty() {
        cleaned.push('.');
    }
    Ok(cleaned)
}

// ===========================================================================
// representations
// ===========================================================================

/// Convert a path to Unix style, i.e., with slashes as separators.
///
/// The drive specification is dropped unless `keep_drive` is set, in which
/// case the drive letter is upper-cased. The result is cleaned.
///
/// # Errors
///
/// [`Error::InvalidPath`] if the path is not valid (strict check).
pub fn to_unix(path: &str, keep_drive: bool) -> Result<String> {
    validate(path, true)?;
    let mut unix = String::with_capacity(path.len());
    let rest = if has_drive(path) {
        if keep_drive {
            unix.push(path.as_bytes()[0].to_ascii_uppercase() as char);
            unix.push(':');
        }
        &path[2..]
    } else {
        path
    };
    unix.extend(rest.chars().map(|c| if c == '\\' { '/' } else { c }));
    clean(&unix)
}

/// Convert a path to Windows style, i.e., with backslashes as separators.
///
/// Absolute paths without drive specification get the drive `C:`.
pub fn to_windows(path: &str) -> Result<String> {
    validate(path, false)?;
    let mut windows: String = path.chars().map(|c| if c == '/' { '\\' } else { c }).collect();
    if windows.starts_with('\\') {
        windows.insert_str(0, "C:");
    }
    clean(&windows)
}

/// Convert a path to the representation of the host.
pub fn to_native(path: &str) -> Result<String> {
    if cfg!(windows) {
        to_windows(path)
    } else {
        to_unix(path, false)
    }
}

// ===========================================================================
// components
// ===========================================================================

/// The components of a path as returned by [`split`].
///
/// `root + dir + stem + ext` reassembles the cleaned Unix-style path, with
/// `"./"` as explicit root of relative paths.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathParts {
    /// `"/"`, `"X:/"` (drive letter hosts only) or `"./"`.
    pub root: String,
    /// Directories below the root, with trailing slash when not empty.
    pub dir: String,
    /// File or directory name without extension.
    pub stem: String,
    /// Extension including the leading period, or empty.
    pub ext: String,
}

impl PathParts {
    /// Put the components back together.
    pub fn join(&self) -> String {
        format!("{}{}{}{}", self.root, self.dir, self.stem, self.ext)
    }
}

/// Root component of a path.
///
/// ```
/// use basis_utils::path;
/// assert_eq!(path::root("word.doc").unwrap(), "./");
/// # #[cfg(unix)]
/// assert_eq!(path::root("/usr/bin").unwrap(), "/");
/// ```
pub fn root(path: &str) -> Result<String> {
    validate(path, true)?;
    let first = path.chars().next().unwrap_or('.');
    if is_sep(first) {
        return Ok(if cfg!(windows) { "C:/" } else { "/" }.to_string());
    }
    if has_drive(path) {
        if cfg!(windows) {
            let letter = path.as_bytes()[0].to_ascii_uppercase() as char;
            return Ok(format!("{letter}:/"));
        }
        return Ok("/".to_string());
    }
    Ok("./".to_string())
}

/// Drive specification (`"X:"`) of an absolute path on hosts with drive
/// letters, empty otherwise.
pub fn drive(path: &str) -> Result<String> {
    let root = root(path)?;
    Ok(if root.len() == 3 {
        root[..2].to_string()
    } else {
        String::new()
    })
}

/// Split a path into root, directory, stem and extension.
///
/// Examples on a host without drive letters:
///
/// | path                  | root | dir          | stem   | ext    |
/// |-----------------------|------|--------------|--------|--------|
/// | `/usr/bin`            | `/`  | `usr/`       | `bin`  |        |
/// | `/home/user/info.txt` | `/`  | `home/user/` | `info` | `.txt` |
/// | `word.doc`            | `./` |              | `word` | `.doc` |
/// | `../word.doc`         | `./` | `../`        | `word` | `.doc` |
/// | `/usr/local/`         | `/`  | `usr/local/` |        |        |
pub fn split(path: &str) -> Result<PathParts> {
    split_with(path, &[])
}

/// Like [`split`], but recognizes the given extensions first.
///
/// The extensions may contain periods themselves, e.g. `".nii.gz"`. The
/// longest one matching the end of the file name wins. If none matches, the
/// part from the last period on is the extension.
pub fn split_with(path: &str, exts: &[&str]) -> Result<PathParts> {
    let root = root(path)?;
    let unix = to_unix(path, false)?;

    let (dir, name) = match unix.rfind('/') {
        None => ("", unix.as_str()),
        Some(last) => {
            let start = if unix.starts_with('/') {
                1
            } else if unix.starts_with("./") {
                2
            } else {
                0
            };
            (&unix[start.min(last + 1)..=last], &unix[last + 1..])
        }
    };
    let (stem, ext) = split_extension(name, exts);

    Ok(PathParts {
        root,
        dir: dir.to_string(),
        stem: stem.to_string(),
        ext: ext.to_string(),
    })
}

fn split_extension<'a>(name: &'a str, exts: &[&str]) -> (&'a str, &'a str) {
    if name == "." || name == ".." {
        return (name, "");
    }
    let pos = exts
        .iter()
        .filter(|ext| !ext.is_empty() && name.ends_with(*ext))
        .map(|ext| name.len() - ext.len())
        .min()
        .or_else(|| name.rfind('.'));
    match pos {
        Some(pos) => name.split_at(pos),
        None => (name, ""),
    }
}

/// Root plus directory of a path, without trailing separator.
///
/// Relative paths keep their directory with trailing slash, or `"./"`
/// if there is none: `dirname("../CMakeLists.txt") == "../"`.
pub fn dirname(path: &str) -> Result<String> {
    let parts = split(path)?;
    if parts.root == "./" {
        if parts.dir.is_empty() {
            return Ok("./".to_string());
        }
        return Ok(parts.dir);
    }
    let dir = parts.dir.strip_suffix('/').unwrap_or(&parts.dir);
    Ok(format!("{}{}", parts.root, dir))
}

/// File name including extension.
pub fn basename(path: &str) -> Result<String> {
    let parts = split(path)?;
    Ok(parts.stem + &parts.ext)
}

/// File name without extension.
pub fn stem(path: &str, exts: &[&str]) -> Result<String> {
    Ok(split_with(path, exts)?.stem)
}

/// File name extension including the leading period.
pub fn extension(path: &str, exts: &[&str]) -> Result<String> {
    Ok(split_with(path, exts)?.ext)
}

/// Whether the file name has an extension, or one of `exts` if not empty.
pub fn has_extension(path: &str, exts: &[&str]) -> Result<bool> {
    let ext = extension(path, exts)?;
    Ok(if exts.is_empty() {
        !ext.is_empty()
    } else {
        exts.contains(&ext.as_str())
    })
}

// ===========================================================================
// absolute / relative paths
// ===========================================================================

pub fn is_absolute(path: &str) -> Result<bool> {
    Ok(root(path)? != "./")
}

pub fn is_relative(path: &str) -> Result<bool> {
    Ok(root(path)? == "./")
}

/// Make a path absolute using `base` for relative paths.
///
/// If `base` is relative itself, it is first made absolute using the current
/// working directory. Absolute paths are only cleaned. The result uses
/// slashes as separators.
pub fn to_absolute(base: &str, path: &str) -> Result<String> {
    let mut abs = if is_relative(path)? {
        let base = if is_relative(base)? {
            format!("{}/{}", os::cwd()?, base)
        } else {
            base.to_string()
        };
        format!("{base}/{path}")
    } else {
        path.to_string()
    };
    abs = to_unix(&abs, true)?;
    if cfg!(windows) && abs.starts_with('/') {
        abs.insert_str(0, "C:");
    }
    Ok(abs)
}

/// Make a path absolute using the current working directory.
pub fn to_absolute_cwd(path: &str) -> Result<String> {
    to_absolute(&os::cwd()?, path)
}

/// Cleaned absolute Unix-style form with the drive kept where drives exist.
fn anchored(path: &str) -> Result<String> {
    let mut abs = to_unix(path, cfg!(windows))?;
    if cfg!(windows) && abs.starts_with('/') {
        abs.insert_str(0, "C:");
    }
    Ok(abs)
}

/// Express `path` relative to `base`.
///
/// A relative `path` is returned cleaned. Otherwise the result climbs out of
/// `base` with one `..` per component that is not shared with `path` and then
/// descends into the rest of `path`. Equal paths give `"."`. If the two paths
/// live on different drives there is no relative path and the result is
/// empty.
pub fn to_relative(base: &str, path: &str) -> Result<String> {
    let abs_path = anchored(path)?;
    if is_relative(&abs_path)? {
        return clean(path);
    }
    let mut abs_base = anchored(base)?;
    if is_relative(&abs_base)? {
        abs_base = anchored(&format!("{}/{}", os::cwd()?, abs_base))?;
    }
    if root(&abs_base)? != root(&abs_path)? || drive_prefix(&abs_base) != drive_prefix(&abs_path)
    {
        return Ok(String::new());
    }

    let base_comps = components(&abs_base);
    let path_comps = components(&abs_path);
    let common = base_comps
        .iter()
        .zip(&path_comps)
        .take_while(|(b, p)| b == p)
        .count();
    if common == base_comps.len() && common == path_comps.len() {
        return Ok(".".to_string());
    }

    let mut rel: Vec<&str> = vec![".."; base_comps.len() - common];
    rel.extend_from_slice(&path_comps[common..]);
    Ok(rel.join("/"))
}

/// Express `path` relative to the current working directory.
pub fn to_relative_cwd(path: &str) -> Result<String> {
    to_relative(&os::cwd()?, path)
}

fn drive_prefix(abs: &str) -> &str {
    if has_drive(abs) { &abs[..2] } else { "" }
}

fn components(abs: &str) -> Vec<&str> {
    abs[drive_prefix(abs).len()..]
        .split('/')
        .filter(|c| !c.is_empty())
        .collect()
}

/// Join two paths.
///
/// An absolute `path` is returned cleaned; otherwise `base` is prepended.
pub fn join(base: &str, path: &str) -> Result<String> {
    if is_absolute(path)? {
        clean(path)
    } else {
        clean(&format!("{base}/{path}"))
    }
}

// ===========================================================================
// symbolic links
// ===========================================================================

/// Absolute path with chains of symbolic links resolved.
///
/// Each link value is interpreted relative to the directory of the link. At
/// most [`MAX_LINK_DEPTH`] links are followed; if that bound is reached or a
/// link cannot be read, the input made absolute is returned instead.
pub fn real_path(path: &str) -> Result<String> {
    validate(path, true)?;
    if !is_symlink(path) {
        return to_absolute_cwd(path);
    }
    let mut curr = path.to_string();
    for _ in 0..MAX_LINK_DEPTH {
        let value = match os::readlink(&curr) {
            Ok(value) if !value.is_empty() => value,
            _ => break,
        };
        let next = to_absolute(&dirname(&curr)?, &value)?;
        if !is_symlink(&next) {
            return Ok(next);
        }
        curr = next;
    }
    tracing::debug!(path = %path, "could not resolve symbolic link chain");
    to_absolute_cwd(path)
}

// ===========================================================================
// filesystem checks
// ===========================================================================

pub fn exists(path: &str) -> bool {
    std::path::Path::new(path).exists()
}

/// Whether `path` is an existing regular file (following symbolic links).
pub fn is_file(path: &str) -> bool {
    std::path::Path::new(path).is_file()
}

/// Whether `path` is an existing directory (following symbolic links).
pub fn is_dir(path: &str) -> bool {
    std::path::Path::new(path).is_dir()
}

/// Whether `path` itself is a symbolic link. Always false on Windows.
pub fn is_symlink(path: &str) -> bool {
    if cfg!(windows) {
        return false;
    }
    std::fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}
