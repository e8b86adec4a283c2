use basis_utils::{Interpreter, os, path};
use std::sync::{Mutex, MutexGuard, OnceLock};

fn lock_current_dir() -> MutexGuard<'static, ()> {
    static MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
    MUTEX
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

/// Restores the working directory when dropped, even if the test panics.
struct RestoreDir(std::path::PathBuf);

impl Drop for RestoreDir {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.0);
    }
}

fn run(sh: &mut Interpreter, line: &str) -> (i32, String) {
    let mut out = Vec::new();
    let code = sh.run_line(line, &mut out).unwrap();
    (code, String::from_utf8(out).unwrap())
}

fn unix(dir: &std::path::Path) -> String {
    path::to_unix(dir.to_str().unwrap(), true).unwrap()
}

fn same_dir(a: impl AsRef<std::path::Path>, b: impl AsRef<std::path::Path>) -> bool {
    std::fs::canonicalize(a).unwrap() == std::fs::canonicalize(b).unwrap()
}

#[test]
fn cd_changes_into_directory() {
    let _lock = lock_current_dir();
    let _restore = RestoreDir(std::env::current_dir().unwrap());
    let temp = tempfile::tempdir().unwrap();

    let mut sh = Interpreter::default();
    let (code, out) = run(&mut sh, &format!("cd \"{}\"", unix(temp.path())));
    assert_eq!(code, 0, "{out}");
    assert!(same_dir(temp.path(), &sh.env().current_dir));
    assert_eq!(os::cwd().unwrap(), sh.env().current_dir);

    let (_, pwd) = run(&mut sh, "pwd");
    assert_eq!(pwd, format!("{}\n", sh.env().current_dir));
}

#[test]
fn cd_resolves_relative_targets() {
    let _lock = lock_current_dir();
    let _restore = RestoreDir(std::env::current_dir().unwrap());
    let temp = tempfile::tempdir().unwrap();
    let base = unix(temp.path());
    os::makedirs(&path::join(&base, "a/b").unwrap()).unwrap();

    let mut sh = Interpreter::default();
    assert_eq!(run(&mut sh, &format!("cd \"{base}\"")).0, 0);
    assert_eq!(run(&mut sh, "cd a/b").0, 0);
    assert_eq!(path::basename(&sh.env().current_dir).unwrap(), "b");
    assert_eq!(run(&mut sh, "cd ../..").0, 0);
    assert!(same_dir(temp.path(), &sh.env().current_dir));
}

#[test]
fn cd_without_target_uses_home() {
    let _lock = lock_current_dir();
    let _restore = RestoreDir(std::env::current_dir().unwrap());
    let temp = tempfile::tempdir().unwrap();
    let home = unix(temp.path());

    let mut sh = Interpreter::default();
    sh.env_mut().set_var("HOME", home.clone());
    assert_eq!(run(&mut sh, "cd").0, 0);
    assert!(same_dir(temp.path(), &sh.env().current_dir));
}

#[test]
fn cd_into_missing_directory_fails() {
    let _lock = lock_current_dir();
    let _restore = RestoreDir(std::env::current_dir().unwrap());
    let temp = tempfile::tempdir().unwrap();

    let mut sh = Interpreter::default();
    let before = sh.env().current_dir.clone();
    let missing = path::join(&unix(temp.path()), "missing").unwrap();
    let (code, out) = run(&mut sh, &format!("cd \"{missing}\""));
    assert_eq!(code, 1);
    assert!(out.starts_with("cd: "), "{out}");
    assert_eq!(sh.env().current_dir, before);
}

#[test]
#[cfg(unix)]
fn external_commands_run_in_shell_directory() {
    let _lock = lock_current_dir();
    let _restore = RestoreDir(std::env::current_dir().unwrap());
    let temp = tempfile::tempdir().unwrap();

    let mut sh = Interpreter::default();
    assert_eq!(run(&mut sh, &format!("cd \"{}\"", unix(temp.path()))).0, 0);
    let (code, out) = run(&mut sh, "sh -c pwd");
    assert_eq!(code, 0);
    assert!(same_dir(out.trim_end(), temp.path()), "{out}");
}
