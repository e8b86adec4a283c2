use std::collections::BTreeMap;
use std::env as stdenv;

/// Mutable view of the process environment used by the shell.
///
/// - `vars`: the variables passed to every launched command, which receives
///   exactly this set;
/// - `current_dir`: the working directory, forward-slash separated;
/// - `should_exit`: set by `exit`, checked by the read-eval-print loop.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub vars: BTreeMap<String, String>,
    pub current_dir: String,
    pub should_exit: bool,
    /// Exit code requested together with `should_exit`.
    pub exit_code: i32,
}

impl Environment {
    /// Capture the variables and working directory of the current process.
    pub fn new() -> Self {
        let current_dir = crate::os::cwd().unwrap_or_else(|_| ".".to_string());
        Self {
            vars: stdenv::vars().collect(),
            current_dir,
            should_exit: false,
            exit_code: 0,
        }
    }

    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    /// Set or override a variable.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// The variables as `KEY=VALUE` entries, sorted by key.
    pub fn to_override_list(&self) -> Vec<String> {
        self.vars.iter().map(|(k, v)| format!("{k}={v}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::env::Environment;

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::default();
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");
        assert_eq!(env.get_var("KEY"), Some("VALUE".to_string()));
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
        assert!(crate::path::is_absolute(&env.current_dir).unwrap());
    }

    #[test]
    fn test_override_list_is_sorted_key_value_pairs() {
        let mut env = Environment::default();
        env.set_var("B", "2");
        env.set_var("A", "x=y");
        assert_eq!(env.to_override_list(), ["A=x=y", "B=2"]);
    }
}
