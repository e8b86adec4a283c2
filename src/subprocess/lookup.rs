//! Resolution of the program named by element zero of a command line.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Maps the name of a program to the path that should be executed.
pub trait ExecutableLookup {
    /// Path of the executable for `name`, or `None` if there is none.
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Looks programs up the way a typical shell does, using a `PATH`-style
/// search list.
///
/// A name with a directory part (`/bin/sh`, `tools/run`, `./run`) is used as
/// is if it exists. A bare name is tried in each directory of the search list
/// in order; on Windows the working directory comes first.
#[derive(Debug, Clone, Default)]
pub struct SearchPathLookup {
    search_paths: Option<OsString>,
}

impl SearchPathLookup {
    /// Lookup in the given list of directories, separated as in `PATH`.
    pub fn new(search_paths: impl Into<OsString>) -> Self {
        Self {
            search_paths: Some(search_paths.into()),
        }
    }

    /// Lookup in the `PATH` of the current process, read at each call.
    pub fn from_env() -> Self {
        Self::default()
    }

    fn directories(&self) -> Vec<PathBuf> {
        let list = match &self.search_paths {
            Some(list) => list.clone(),
            None => std::env::var_os("PATH").unwrap_or_default(),
        };
        std::env::split_paths(&list)
            .filter(|dir| !dir.as_os_str().is_empty())
            .collect()
    }
}

fn existing(path: &Path) -> Option<String> {
    path.exists().then(|| path.to_string_lossy().into_owned())
}

impl ExecutableLookup for SearchPathLookup {
    fn resolve(&self, name: &str) -> Option<String> {
        let program = Path::new(name);
        let bare = program.is_relative() && program.components().count() == 1;
        if !bare || (cfg!(windows) && program.exists()) {
            return existing(program);
        }
        self.directories()
            .iter()
            .find_map(|dir| existing(&dir.join(program)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn lookup_in(dirs: &[&Path]) -> SearchPathLookup {
        SearchPathLookup::new(std::env::join_paths(dirs).unwrap())
    }

    #[test]
    #[cfg(unix)]
    fn absolute_name_must_exist() {
        let lookup = SearchPathLookup::new("/nowhere");
        assert_eq!(lookup.resolve("/bin/sh").as_deref(), Some("/bin/sh"));
        assert_eq!(lookup.resolve("/bin/nonexisting"), None);
    }

    #[test]
    fn bare_name_is_searched_in_order() {
        let first = tempfile::TempDir::new().unwrap();
        let second = tempfile::TempDir::new().unwrap();
        File::create(second.path().join("tool")).unwrap();
        let lookup = lookup_in(&[first.path(), second.path()]);

        let expected = second.path().join("tool").to_string_lossy().into_owned();
        assert_eq!(lookup.resolve("tool"), Some(expected));

        File::create(first.path().join("tool")).unwrap();
        let expected = first.path().join("tool").to_string_lossy().into_owned();
        assert_eq!(lookup.resolve("tool"), Some(expected), "earlier directory wins");
        assert_eq!(lookup.resolve("other"), None);
    }

    #[test]
    fn relative_name_with_directory_is_not_searched() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        File::create(dir.path().join("src").join("only_here.rs")).unwrap();
        let lookup = lookup_in(&[dir.path()]);

        assert_eq!(lookup.resolve("src/only_here.rs"), None);
        // cargo runs unit tests from the package root
        assert_eq!(lookup.resolve("src/lib.rs").as_deref(), Some("src/lib.rs"));
        assert_eq!(lookup.resolve("../../no/such/tool"), None);
    }

    #[test]
    fn empty_entries_and_names_are_ignored() {
        let lookup = SearchPathLookup::new("");
        assert_eq!(lookup.resolve(""), None);
        if cfg!(unix) {
            assert_eq!(lookup.resolve("Cargo.toml"), None, "working directory is not searched");
        }
    }

    #[test]
    #[cfg(unix)]
    fn process_path_is_used_by_default() {
        assert!(SearchPathLookup::from_env().resolve("sh").is_some(), "sh on PATH");
    }
}
