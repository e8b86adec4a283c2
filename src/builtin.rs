use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use crate::{os, path, term};
use anyhow::{Context, Result};
use argh::{EarlyExit, FromArgs};
use std::io::Write;

/// Width used for help text when the terminal does not report one.
const DEFAULT_WIDTH: usize = 80;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed
/// in-process without spawning a child process.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "cd".
    fn name() -> &'static str;

    /// One-line description shown by `help`.
    fn summary() -> &'static str;

    /// Executes the command; 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        match T::execute(*self, stdout, env) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(stdout, "{}: {:#}", T::name(), e)?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        stdout.write_all(self.output.as_bytes())?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name != T::name() {
            return None;
        }
        Some(match T::from_args(&[name], args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

#[derive(FromArgs)]
/// Print the current working directory.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn summary() -> &'static str {
        "print the current working directory"
    }

    fn execute(self, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir)?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory named by HOME.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to, absolute or relative to the current directory
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn summary() -> &'static str {
        "change the working directory, to $HOME without argument"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let target = match self.target {
            Some(t) if !t.is_empty() => t,
            _ => env
                .get_var("HOME")
                .context("no target and HOME not set")?,
        };

        let new_dir = path::to_absolute(&env.current_dir, &target)?;
        if !path::is_dir(&new_dir) {
            anyhow::bail!("{target}: not a directory");
        }
        std::env::set_current_dir(&new_dir).with_context(|| format!("can't chdir to {new_dir}"))?;
        env.current_dir = os::cwd()?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Leave the shell.
pub struct Exit {
    #[argh(positional)]
    /// exit code, 0 when omitted
    pub code: Option<i32>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn summary() -> &'static str {
        "leave the shell with the given exit code"
    }

    fn execute(self, _stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let code = self.code.unwrap_or(0);
        env.should_exit = true;
        env.exit_code = code;
        Ok(code)
    }
}

#[derive(FromArgs)]
/// List the built-in commands.
pub struct Help {}

impl Help {
    fn entries() -> [(&'static str, &'static str); 4] {
        [
            (Cd::name(), Cd::summary()),
            (Pwd::name(), Pwd::summary()),
            (Exit::name(), Exit::summary()),
            (Help::name(), Help::summary()),
        ]
    }

    fn write_to(stdout: &mut dyn Write, width: usize) -> Result<()> {
        let width = width.max(20);
        term::print_wrapped(
            stdout,
            "Lines are split into arguments at whitespace; use double quotes to keep \
             whitespace inside an argument. Anything that is not a builtin is looked \
             up in PATH and run as a child process.",
            width,
            0,
            0,
        )?;
        writeln!(stdout)?;
        for (name, summary) in Self::entries() {
            writeln!(stdout, "  {name}")?;
            term::print_wrapped(stdout, summary, width, 6, 2)?;
        }
        Ok(())
    }
}

impl BuiltinCommand for Help {
    fn name() -> &'static str {
        "help"
    }

    fn summary() -> &'static str {
        "show this list"
    }

    fn execute(self, stdout: &mut dyn Write, _env: &mut Environment) -> Result<ExitCode> {
        let width = match term::terminal_columns() {
            0 => DEFAULT_WIDTH,
            cols => cols,
        };
        Help::write_to(stdout, width)?;
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pwd_prints_current_dir() {
        let mut env = Environment::default();
        env.current_dir = "/some/where".to_string();

        let mut out = Vec::new();
        let res = Pwd {}.execute(&mut out, &mut env);

        assert!(res.is_ok());
        assert_eq!(String::from_utf8(out).unwrap(), "/some/where\n");
    }

    #[test]
    fn test_exit_requests_shell_exit() {
        let mut env = Environment::default();
        let res = Exit { code: Some(3) }.execute(&mut Vec::new(), &mut env);
        assert_eq!(res.unwrap(), 3);
        assert!(env.should_exit);
        assert_eq!(env.exit_code, 3);
    }

    #[test]
    fn test_cd_rejects_missing_directory_without_moving() {
        let mut env = Environment::new();
        let before = env.current_dir.clone();
        let cmd = Cd {
            target: Some("definitely/not/here".to_string()),
        };
        let mut out = Vec::new();
        let code = ExecutableCommand::execute(Box::new(cmd), &mut out, &mut env).unwrap();
        assert_eq!(code, 1);
        assert_eq!(env.current_dir, before);
        let msg = String::from_utf8(out).unwrap();
        assert!(msg.starts_with("cd: "), "unexpected message {msg:?}");
    }

    #[test]
    fn test_cd_without_home() {
        let mut env = Environment::default();
        let err = Cd { target: None }.execute(&mut Vec::new(), &mut env).unwrap_err();
        assert!(err.to_string().contains("HOME"));
    }

    #[test]
    fn test_help_lists_builtins_wrapped() {
        let mut out = Vec::new();
        Help::write_to(&mut out, 30).unwrap();
        let text = String::from_utf8(out).unwrap();
        for name in ["cd", "pwd", "exit", "help"] {
            assert!(text.contains(&format!("  {name}\n")), "{name} missing in {text}");
        }
        assert!(text.lines().all(|line| line.chars().count() <= 30), "{text}");
    }

    #[test]
    fn test_factory_matches_name_and_reports_bad_args() {
        let env = Environment::default();
        assert!(Factory::<Pwd>::default().try_create(&env, "cd", &[]).is_none());

        let cmd = Factory::<Exit>::default()
            .try_create(&env, "exit", &["not-a-number"])
            .expect("exit is recognized");
        let mut out = Vec::new();
        let code = cmd.execute(&mut out, &mut Environment::default()).unwrap();
        assert_eq!(code, 1);
        assert!(!out.is_empty());
    }
}
