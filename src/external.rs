use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::interpreter::Factory;
use crate::subprocess::lookup::{ExecutableLookup, SearchPathLookup};
use crate::subprocess::{Redirect, Redirects, Subprocess};
use anyhow::Result;
use std::io::Write;

/// Command that is not a builtin, run as a child process.
pub struct ExternalCommand {
    argv: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: String, args: &[&str]) -> Self {
        let mut argv = vec![program];
        argv.extend(args.iter().map(|arg| arg.to_string()));
        Self { argv }
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        let lookup = SearchPathLookup::new(env.get_var("PATH")?);
        let program = lookup.resolve(name)?;
        Some(Box::new(ExternalCommand::new(program, args)))
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(self: Box<Self>, stdout: &mut dyn Write, env: &mut Environment) -> Result<ExitCode> {
        let redirects = Redirects {
            stdin: Redirect::Inherit,
            stdout: Redirect::Pipe,
            stderr: Redirect::Inherit,
        };
        let mut child = Subprocess::new();
        child.open(&self.argv, redirects, Some(&env.to_override_list()))?;
        child.communicate_out(stdout)?;
        Ok(child.returncode().unwrap_or(-1))
    }
}
