//! Child process used by the subprocess integration tests.

use argh::FromArgs;
use std::io::{self, Write};
use std::time::Duration;

#[derive(FromArgs)]
/// Behave in scripted ways so a parent process has something to observe.
struct Args {
    /// print the name this program was invoked with and exit
    #[argh(switch)]
    name: bool,

    /// sleep for the given number of seconds first
    #[argh(option)]
    sleep: Option<u64>,

    /// print a greeting on standard output
    #[argh(switch)]
    greet: bool,

    /// print a warning on standard error
    #[argh(switch)]
    warn: bool,

    /// copy standard input to standard output
    #[argh(switch)]
    cat: bool,

    /// exit with the given code
    #[argh(option)]
    exit: Option<i32>,
}

fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();

    if args.name {
        let argv0 = std::env::args().next().unwrap_or_default();
        print!("{argv0}");
        io::stdout().flush()?;
        return Ok(());
    }
    if let Some(secs) = args.sleep {
        std::thread::sleep(Duration::from_secs(secs));
    }
    if args.greet {
        println!("Hello, BASIS!");
    }
    if args.warn {
        eprintln!("WARNING: Cannot greet in other languages!");
    }
    if args.cat {
        io::copy(&mut io::stdin().lock(), &mut io::stdout().lock())?;
    }
    io::stdout().flush()?;
    if let Some(code) = args.exit {
        std::process::exit(code);
    }
    Ok(())
}
