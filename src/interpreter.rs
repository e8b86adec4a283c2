use crate::command::{CommandFactory, ExitCode};
use crate::env::Environment;
use crate::subprocess::cmdline;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result};
use std::io::Write;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate, builtins and external commands.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// A minimal shell that runs builtins and external commands.
///
/// The interpreter maintains an [`Environment`] and a list of [`CommandFactory`]
/// objects that are queried in order to create commands by name.
///
/// ```no_run
/// use basis_utils::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.run_line("pwd", &mut std::io::stdout()).unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env: Environment::new(),
            commands,
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// Run a single command invocation by name with arguments.
    ///
    /// Returns the command's exit code or an error if the command cannot be
    /// created or fails to execute.
    pub fn run(&mut self, name: &str, args: &[&str], stdout: &mut dyn Write) -> anyhow::Result<ExitCode> {
        for factory in &self.commands {
            if let Some(cmd) = factory.try_create(&self.env, name, args) {
                return cmd.execute(stdout, &mut self.env);
            }
        }
        Err(anyhow::anyhow!("command not found: {}", name))
    }

    /// Split a line into arguments and run it. Blank lines succeed.
    pub fn run_line(&mut self, line: &str, stdout: &mut dyn Write) -> anyhow::Result<ExitCode> {
        let argv = cmdline::split(line);
        let Some((name, args)) = argv.split_first() else {
            return Ok(0);
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        tracing::debug!(command = %name, args = ?args, "running");
        self.run(name, &args, stdout)
    }

    /// Run one interactive line. Command failures are reported on standard
    /// error; only a failure to flush `stdout` is returned.
    fn eval(&mut self, line: &str, stdout: &mut dyn Write) -> std::io::Result<()> {
        match self.run_line(line, stdout) {
            Ok(code) if code != 0 => tracing::debug!(code, "command failed"),
            Ok(_) => {}
            Err(e) => eprintln!("{e:#}"),
        }
        stdout.flush()
    }

    /// Read-eval-print loop on the terminal. Returns the code passed to `exit`.
    pub fn repl(&mut self) -> Result<ExitCode> {
        let mut rl = DefaultEditor::new()?;

        while !self.env.should_exit {
            match rl.readline("basis$ ") {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line.as_str())?;
                    self.eval(&line, &mut std::io::stdout())?;
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        Ok(self.env.exit_code)
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the builtins `cd`, `pwd`, `exit` and `help`
    /// followed by the external command launcher.
    fn default() -> Self {
        use crate::builtin::*;
        use crate::external::ExternalCommand;
        Self::new(vec![
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<Help>::default()),
            Box::new(Factory::<ExternalCommand>::default()),
        ])
    }
}
