use anyhow::{Context, Result};
use argh::FromArgs;
use basis_utils::subprocess::{Redirect, Redirects, Subprocess};
use basis_utils::{Interpreter, os, path};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Environment variable holding the log filter, e.g. `BASIS_LOG=debug`.
const LOG_ENV: &str = "BASIS_LOG";

#[derive(FromArgs)]
/// Path, process and terminal utilities.
struct Cli {
    /// log debug messages to standard error
    #[argh(switch, short = 'v')]
    verbose: bool,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Clean(CleanCmd),
    Split(SplitCmd),
    Relpath(RelpathCmd),
    Abspath(AbspathCmd),
    Realpath(RealpathCmd),
    Run(RunCmd),
    Shell(ShellCmd),
    Exe(ExeCmd),
}

#[derive(FromArgs)]
/// Normalize paths without touching the filesystem.
#[argh(subcommand, name = "clean")]
struct CleanCmd {
    #[argh(positional, greedy)]
    /// paths to normalize
    paths: Vec<String>,
}

#[derive(FromArgs)]
/// Print root, directory, stem and extension of a path.
#[argh(subcommand, name = "split")]
struct SplitCmd {
    #[argh(positional)]
    /// path to decompose
    path: String,

    #[argh(option, short = 'e')]
    /// recognized extension, may contain periods (repeatable)
    ext: Vec<String>,
}

#[derive(FromArgs)]
/// Express a path relative to a base directory.
#[argh(subcommand, name = "relpath")]
struct RelpathCmd {
    #[argh(positional)]
    /// base directory
    base: String,

    #[argh(positional)]
    /// path to relativize
    path: String,
}

#[derive(FromArgs)]
/// Make a path absolute.
#[argh(subcommand, name = "abspath")]
struct AbspathCmd {
    #[argh(option)]
    /// base directory for relative paths, the working directory by default
    base: Option<String>,

    #[argh(positional)]
    /// path to make absolute
    path: String,
}

#[derive(FromArgs)]
/// Resolve symbolic links in a path.
#[argh(subcommand, name = "realpath")]
struct RealpathCmd {
    #[argh(positional)]
    /// path to resolve
    path: String,
}

#[derive(FromArgs)]
/// Run a command, relaying its output, and exit with its exit code.
#[argh(subcommand, name = "run")]
struct RunCmd {
    #[argh(switch)]
    /// merge standard error into standard output
    merge: bool,

    #[argh(positional, greedy)]
    /// command line, program first
    command: Vec<String>,
}

#[derive(FromArgs)]
/// Start an interactive shell.
#[argh(subcommand, name = "shell")]
struct ShellCmd {}

#[derive(FromArgs)]
/// Print location and name of this executable.
#[argh(subcommand, name = "exe")]
struct ExeCmd {}

fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from((code & 0xff) as u8)
}

fn run(cmd: RunCmd) -> Result<ExitCode> {
    let redirects = Redirects {
        stdin: Redirect::Inherit,
        stdout: Redirect::Pipe,
        stderr: if cmd.merge {
            Redirect::MergeWithOutput
        } else {
            Redirect::Pipe
        },
    };
    let mut child = Subprocess::new();
    child
        .open(&cmd.command, redirects, None)
        .with_context(|| format!("failed to run {:?}", cmd.command.first().map_or("", String::as_str)))?;
    child.communicate_out_err(&mut std::io::stdout(), &mut std::io::stderr())?;
    Ok(exit_code(child.returncode().unwrap_or(1)))
}

fn main() -> Result<ExitCode> {
    let cli: Cli = argh::from_env();
    init_logging(cli.verbose)?;

    match cli.command {
        Command::Clean(cmd) => {
            for p in &cmd.paths {
                println!("{}", path::clean(p)?);
            }
        }
        Command::Split(cmd) => {
            let exts: Vec<&str> = cmd.ext.iter().map(String::as_str).collect();
            let parts = path::split_with(&cmd.path, &exts)?;
            println!("root: {}", parts.root);
            println!("dir:  {}", parts.dir);
            println!("stem: {}", parts.stem);
            println!("ext:  {}", parts.ext);
        }
        Command::Relpath(cmd) => println!("{}", path::to_relative(&cmd.base, &cmd.path)?),
        Command::Abspath(cmd) => {
            let abs = match &cmd.base {
                Some(base) => path::to_absolute(base, &cmd.path)?,
                None => path::to_absolute_cwd(&cmd.path)?,
            };
            println!("{abs}");
        }
        Command::Realpath(cmd) => println!("{}", path::real_path(&cmd.path)?),
        Command::Run(cmd) => return run(cmd),
        Command::Shell(_) => {
            let code = Interpreter::default().repl()?;
            return Ok(exit_code(code));
        }
        Command::Exe(_) => {
            println!("path: {}", os::exepath()?);
            println!("dir:  {}", os::exedir()?);
            println!("name: {}", os::exename()?);
        }
    }
    Ok(ExitCode::SUCCESS)
}
