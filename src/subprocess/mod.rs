//! Launching and controlling a child process.
//!
//! A [`Subprocess`] handle starts out idle. [`Subprocess::open`] launches a
//! child with each of its standard streams either inherited from the parent,
//! connected to a pipe held by the handle or, for standard error, merged into
//! standard output. The handle then tracks the status of the child:
//!
//! ```text
//! Idle --open--> Running --poll/wait--> Exited(code) | Signaled(signal)
//! ```
//!
//! Terminal states are absorbing until the handle is opened again.

pub mod cmdline;
pub mod lookup;
mod pipes;

use crate::error::{Error, Result, Stream};
use lookup::ExecutableLookup;
use pipes::{Endpoints, Pipes};
use std::fs::File;
use std::io::{self, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

pub use cmdline::CommandLine;

/// Graceful termination request.
#[cfg(unix)]
pub const SIGTERM: i32 = libc::SIGTERM;
/// Unconditional termination.
#[cfg(unix)]
pub const SIGKILL: i32 = libc::SIGKILL;
/// Graceful termination request; forced termination on this platform.
#[cfg(not(unix))]
pub const SIGTERM: i32 = 15;
/// Unconditional termination.
#[cfg(not(unix))]
pub const SIGKILL: i32 = 9;

/// Upper bound on how long dropping a handle waits for its child to be reaped.
const REAP_TIMEOUT: Duration = Duration::from_millis(100);

/// How a standard stream of the child is connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Redirect {
    /// The child shares the stream of the parent.
    #[default]
    Inherit,
    /// The stream is connected to a pipe owned by the handle.
    Pipe,
    /// Standard error goes wherever standard output goes. Only valid for
    /// standard error.
    MergeWithOutput,
}

impl Redirect {
    fn name(self) -> &'static str {
        match self {
            Redirect::Inherit => "inherit",
            Redirect::Pipe => "pipe",
            Redirect::MergeWithOutput => "merge with output",
        }
    }
}

/// Redirection of all three standard streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Redirects {
    pub stdin: Redirect,
    pub stdout: Redirect,
    pub stderr: Redirect,
}

impl Redirects {
    /// Capture standard output and standard error separately.
    pub fn capture() -> Self {
        Self {
            stdin: Redirect::Inherit,
            stdout: Redirect::Pipe,
            stderr: Redirect::Pipe,
        }
    }

    /// Pipes for all three streams.
    pub fn all_pipes() -> Self {
        Self {
            stdin: Redirect::Pipe,
            stdout: Redirect::Pipe,
            stderr: Redirect::Pipe,
        }
    }

    /// Capture standard output with standard error merged into it.
    pub fn merged() -> Self {
        Self {
            stdin: Redirect::Inherit,
            stdout: Redirect::Pipe,
            stderr: Redirect::MergeWithOutput,
        }
    }
}

/// Status of the child controlled by a [`Subprocess`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    /// Nothing has been launched yet.
    #[default]
    Idle,
    Running,
    /// Exited normally with the given code.
    Exited(i32),
    /// Terminated by the given signal.
    Signaled(i32),
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Exited(_) | Status::Signaled(_))
    }
}

impl From<ExitStatus> for Status {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Status::Signaled(signal);
            }
        }
        Status::Exited(status.code().unwrap_or(-1))
    }
}

#[cfg(unix)]
fn into_file<T: Into<std::os::fd::OwnedFd>>(end: T) -> File {
    File::from(end.into())
}

#[cfg(windows)]
fn into_file<T: Into<std::os::windows::io::OwnedHandle>>(end: T) -> File {
    File::from(end.into())
}

fn not_piped(stream: Stream) -> Error {
    io::Error::new(
        io::ErrorKind::NotConnected,
        format!("{stream} of the child is not redirected to a pipe"),
    )
    .into()
}

/// Handle of a child process.
#[derive(Debug, Default)]
pub struct Subprocess {
    child: Option<Child>,
    stdin: Option<File>,
    stdout: Option<File>,
    stderr: Option<File>,
    status: Status,
}

impl Subprocess {
    /// Idle handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Launch a child.
    ///
    /// `args[0]` names the program, which is searched for in `PATH` when it
    /// contains no separator. Without `env` the child inherits the environment
    /// of the parent; otherwise it receives exactly the given `KEY=VALUE`
    /// entries.
    ///
    /// The arguments are passed as a vector. On Windows, where a process
    /// receives a single command line, that string is produced by
    /// [`std::process::Command`] following the MSVC argument rules instead of
    /// [`cmdline::to_string`], so that the C runtime of the child splits it
    /// back into the same arguments.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyCommandLine`] if `args` is empty;
    /// - [`Error::InvalidRedirect`] for [`Redirect::MergeWithOutput`] on
    ///   standard input or output;
    /// - [`Error::AlreadyRunning`] if the previous child is still alive;
    /// - [`Error::Io`] if the child could not be launched. The handle is idle
    ///   afterwards.
    pub fn open<S: AsRef<str>>(
        &mut self,
        args: &[S],
        redirects: Redirects,
        env: Option<&[String]>,
    ) -> Result<()> {
        if self.status == Status::Running && !self.poll()? {
            return Err(Error::AlreadyRunning {
                pid: self.pid().unwrap_or_default(),
            });
        }
        let (program, rest) = args.split_first().ok_or(Error::EmptyCommandLine)?;
        let program = program.as_ref();
        if redirects.stdin == Redirect::MergeWithOutput {
            return Err(Error::InvalidRedirect {
                stream: Stream::Stdin,
                mode: redirects.stdin.name(),
            });
        }
        if redirects.stdout == Redirect::MergeWithOutput {
            return Err(Error::InvalidRedirect {
                stream: Stream::Stdout,
                mode: redirects.stdout.name(),
            });
        }

        self.close_pipes();
        self.child = None;
        self.status = Status::Idle;

        let mut cmd = Command::new(program);
        cmd.args(rest.iter().map(|arg| arg.as_ref()));
        if let Some(env) = env {
            cmd.env_clear();
            for entry in env {
                match entry.split_once('=') {
                    Some((key, value)) if !key.is_empty() => {
                        cmd.env(key, value);
                    }
                    _ => tracing::warn!(entry = %entry, "ignoring malformed environment entry"),
                }
            }
        }

        cmd.stdin(match redirects.stdin {
            Redirect::Pipe => Stdio::piped(),
            _ => Stdio::inherit(),
        });
        let mut merged_output = None;
        match (redirects.stdout, redirects.stderr) {
            (Redirect::Pipe, Redirect::MergeWithOutput) => {
                let (reader, writer) = io::pipe()?;
                cmd.stdout(writer.try_clone()?);
                cmd.stderr(writer);
                merged_output = Some(reader);
            }
            (stdout, stderr) => {
                cmd.stdout(match stdout {
                    Redirect::Pipe => Stdio::piped(),
                    _ => Stdio::inherit(),
                });
                cmd.stderr(match stderr {
                    Redirect::Pipe => Stdio::piped(),
                    Redirect::MergeWithOutput => Stdio::from(io::stdout()),
                    Redirect::Inherit => Stdio::inherit(),
                });
            }
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(program, error = %e, "failed to launch child");
                return Err(e.into());
            }
        };
        // the command still owns the child's end of a merged pipe
        drop(cmd);

        self.stdin = child.stdin.take().map(into_file);
        self.stdout = match merged_output {
            Some(reader) => Some(into_file(reader)),
            None => child.stdout.take().map(into_file),
        };
        self.stderr = child.stderr.take().map(into_file);
        tracing::debug!(pid = child.id(), program, "launched child");
        self.child = Some(child);
        self.status = Status::Running;
        Ok(())
    }

    /// Like [`open`](Self::open), with the command line split by
    /// [`cmdline::split`].
    pub fn open_str(&mut self, cmd: &str, redirects: Redirects, env: Option<&[String]>) -> Result<()> {
        self.open(&cmdline::split(cmd), redirects, env)
    }

    /// Check without blocking whether the child has terminated.
    pub fn poll(&mut self) -> Result<bool> {
        if self.status != Status::Running {
            return self.settled();
        }
        let child = self.child.as_mut().ok_or(Error::NotRunning)?;
        match child.try_wait()? {
            Some(exit) => {
                self.status = exit.into();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Block until the child has terminated.
    pub fn wait(&mut self) -> Result<()> {
        if self.status != Status::Running {
            return self.settled().map(|_| ());
        }
        let child = self.child.as_mut().ok_or(Error::NotRunning)?;
        self.status = child.wait()?.into();
        tracing::debug!(pid = child.id(), status = ?self.status, "child terminated");
        Ok(())
    }

    fn settled(&self) -> Result<bool> {
        match self.status {
            Status::Idle => Err(Error::NotRunning),
            status => Ok(status.is_terminal()),
        }
    }

    /// Send a signal to the child.
    ///
    /// Only [`SIGTERM`] and [`SIGKILL`] are supported on Windows, and both
    /// terminate the child forcibly. Nothing is sent once the child is known
    /// to have terminated.
    pub fn send(&mut self, signal: i32) -> Result<()> {
        let child = self.child.as_mut().ok_or(Error::NotRunning)?;
        if self.status != Status::Running {
            return Ok(());
        }
        tracing::debug!(pid = child.id(), signal, "signaling child");
        #[cfg(unix)]
        {
            let pid = child.id() as libc::pid_t;
            // SAFETY: plain system call; the child has not been reaped, so the
            // pid still refers to it.
            if unsafe { libc::kill(pid, signal) } != 0 {
                return Err(io::Error::last_os_error().into());
            }
        }
        #[cfg(not(unix))]
        {
            if signal != SIGTERM && signal != SIGKILL {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("signal {signal} cannot be delivered on this platform"),
                )
                .into());
            }
            child.kill()?;
        }
        Ok(())
    }

    /// Ask the child to terminate.
    pub fn terminate(&mut self) -> Result<()> {
        self.send(SIGTERM)
    }

    /// Terminate the child unconditionally.
    pub fn kill(&mut self) -> Result<()> {
        self.send(SIGKILL)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Process identifier of the most recently launched child.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Whether the last [`poll`](Self::poll) or [`wait`](Self::wait) observed
    /// termination.
    pub fn terminated(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the child was terminated by a signal.
    pub fn signaled(&self) -> bool {
        matches!(self.status, Status::Signaled(_))
    }

    /// Exit code of the terminated child; `128 + signal` if it was signaled.
    pub fn returncode(&self) -> Option<i32> {
        match self.status {
            Status::Exited(code) => Some(code),
            Status::Signaled(signal) => Some(128 + signal),
            Status::Idle | Status::Running => None,
        }
    }

    /// Exchange data with the child and wait for it to terminate.
    ///
    /// `input` is written to the standard input pipe, which is closed
    /// afterwards (immediately when there is no input). Both output pipes are
    /// read at the same time until the child closes them; data of a pipe
    /// without a sink is discarded. Streams that are not piped are ignored.
    ///
    /// The child is waited for even if the exchange fails, so the handle is
    /// in a terminal state afterwards. The first failure is returned.
    pub fn communicate<'a>(
        &mut self,
        input: Option<&'a mut dyn Read>,
        output: Option<&'a mut dyn Write>,
        error: Option<&'a mut dyn Write>,
    ) -> Result<()> {
        if self.child.is_none() {
            return Err(Error::NotRunning);
        }
        let pipes = Pipes {
            stdin: self.stdin.take(),
            stdout: self.stdout.take(),
            stderr: self.stderr.take(),
        };
        let exchanged = pipes::exchange(pipes, Endpoints { input, output, error });
        if let Err(e) = &exchanged {
            tracing::debug!(pid = ?self.pid(), error = %e, "exchange with child failed");
        }
        let waited = self.wait();
        exchanged?;
        waited
    }

    /// [`communicate`](Self::communicate) without input, collecting standard
    /// output.
    pub fn communicate_out(&mut self, output: &mut dyn Write) -> Result<()> {
        self.communicate(None, Some(output), None)
    }

    /// [`communicate`](Self::communicate) without input, collecting both
    /// outputs.
    pub fn communicate_out_err<'a>(
        &mut self,
        output: &'a mut dyn Write,
        error: &'a mut dyn Write,
    ) -> Result<()> {
        self.communicate(None, Some(output), Some(error))
    }

    /// Write to the standard input pipe of the child. Returns the number of
    /// bytes written.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let pipe = self.stdin.as_mut().ok_or_else(|| not_piped(Stream::Stdin))?;
        Ok(pipe.write(buf)?)
    }

    /// Read from the standard output pipe, or from the standard error pipe if
    /// `from_error` is set. Returns 0 at end of file.
    pub fn read(&mut self, buf: &mut [u8], from_error: bool) -> Result<usize> {
        let (pipe, stream) = if from_error {
            (self.stderr.as_mut(), Stream::Stderr)
        } else {
            (self.stdout.as_mut(), Stream::Stdout)
        };
        let pipe = pipe.ok_or_else(|| not_piped(stream))?;
        Ok(pipe.read(buf)?)
    }

    /// Close the standard input pipe, signaling end of file to the child.
    pub fn close_stdin(&mut self) {
        self.stdin = None;
    }

    fn close_pipes(&mut self) {
        self.stdin = None;
        self.stdout = None;
        self.stderr = None;
    }

    /// Run a command with inherited streams and return its exit code.
    pub fn call<S: AsRef<str>>(args: &[S]) -> Result<i32> {
        let mut child = Subprocess::new();
        child.open(args, Redirects::default(), None)?;
        child.wait()?;
        Ok(child.returncode().unwrap_or(-1))
    }

    /// Like [`call`](Self::call), with the program resolved by `lookup` first.
    pub fn call_with<S: AsRef<str>>(lookup: &dyn ExecutableLookup, args: &[S]) -> Result<i32> {
        let (program, rest) = args.split_first().ok_or(Error::EmptyCommandLine)?;
        let program = program.as_ref();
        let resolved = lookup.resolve(program).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("command not found: {program}"))
        })?;
        let mut resolved_args: CommandLine = vec![resolved];
        resolved_args.extend(rest.iter().map(|arg| arg.as_ref().to_string()));
        Self::call(&resolved_args)
    }
}

impl Drop for Subprocess {
    fn drop(&mut self) {
        if self.status != Status::Running {
            return;
        }
        if let Err(e) = self.kill() {
            tracing::debug!(error = %e, "failed to kill child on drop");
        }
        self.close_pipes();
        let Some(child) = self.child.as_mut() else {
            return;
        };
        let deadline = Instant::now() + REAP_TIMEOUT;
        loop {
            match child.try_wait() {
                Ok(Some(_)) | Err(_) => break,
                Ok(None) if Instant::now() >= deadline => {
                    tracing::warn!(pid = child.id(), "child not reaped on drop");
                    break;
                }
                Ok(None) => std::thread::sleep(Duration::from_millis(5)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_handle_rejects_operations() {
        let mut p = Subprocess::new();
        assert_eq!(p.status(), Status::Idle);
        assert!(matches!(p.poll(), Err(Error::NotRunning)));
        assert!(matches!(p.wait(), Err(Error::NotRunning)));
        assert!(matches!(p.terminate(), Err(Error::NotRunning)));
        assert!(matches!(p.communicate(None, None, None), Err(Error::NotRunning)));
        assert_eq!(p.pid(), None);
        assert_eq!(p.returncode(), None);
        assert!(!p.terminated());
    }

    #[test]
    fn empty_command_line_is_rejected() {
        let mut p = Subprocess::new();
        let none: [&str; 0] = [];
        assert!(matches!(
            p.open(&none, Redirects::default(), None),
            Err(Error::EmptyCommandLine)
        ));
        assert!(matches!(
            p.open_str("   ", Redirects::default(), None),
            Err(Error::EmptyCommandLine)
        ));
        assert!(matches!(Subprocess::call(&none), Err(Error::EmptyCommandLine)));
    }

    #[test]
    fn merge_only_valid_for_stderr() {
        let mut p = Subprocess::new();
        let redirects = Redirects {
            stdout: Redirect::MergeWithOutput,
            ..Redirects::default()
        };
        assert!(matches!(
            p.open(&["prog"], redirects, None),
            Err(Error::InvalidRedirect {
                stream: Stream::Stdout,
                ..
            })
        ));
        let redirects = Redirects {
            stdin: Redirect::MergeWithOutput,
            ..Redirects::default()
        };
        assert!(matches!(
            p.open(&["prog"], redirects, None),
            Err(Error::InvalidRedirect {
                stream: Stream::Stdin,
                ..
            })
        ));
        assert_eq!(p.status(), Status::Idle);
    }

    #[test]
    fn missing_program_leaves_handle_idle() {
        let mut p = Subprocess::new();
        let err = p
            .open(&["/no/such/program/anywhere"], Redirects::all_pipes(), None)
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)), "unexpected error {err}");
        assert!(err.raw_os_error().is_some());
        assert_eq!(p.status(), Status::Idle);
        assert!(matches!(p.read(&mut [0u8; 4], false), Err(Error::Io(_))));
    }

    #[test]
    fn returncode_of_signaled_child_follows_shell_convention() {
        let mut p = Subprocess::new();
        p.status = Status::Signaled(15);
        assert_eq!(p.returncode(), Some(143));
        assert!(p.signaled());
        assert!(p.terminated());
    }

    #[cfg(unix)]
    fn sh(script: &str) -> [&str; 3] {
        ["/bin/sh", "-c", script]
    }

    #[test]
    #[cfg(unix)]
    fn communicate_collects_both_outputs() {
        let mut p = Subprocess::new();
        p.open(&sh("echo out; echo err >&2; exit 3"), Redirects::capture(), None)
            .unwrap();
        let (mut out, mut err) = (Vec::new(), Vec::new());
        p.communicate_out_err(&mut out, &mut err).unwrap();
        assert_eq!(out, b"out\n");
        assert_eq!(err, b"err\n");
        assert_eq!(p.status(), Status::Exited(3));
        assert_eq!(p.returncode(), Some(3));
    }

    #[test]
    #[cfg(unix)]
    fn environment_override_replaces_parent_environment() {
        let mut p = Subprocess::new();
        let env = vec!["BASIS_TEST_VAR=visible".to_string(), "BROKEN".to_string()];
        p.open(&sh("echo \"$BASIS_TEST_VAR:${HOME:-unset}\""), Redirects::capture(), Some(&env))
            .unwrap();
        let mut out = Vec::new();
        p.communicate_out(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "visible:unset\n");
    }

    #[test]
    #[cfg(unix)]
    fn large_input_and_output_do_not_deadlock() {
        let input = vec![b'z'; 1 << 20];
        let mut p = Subprocess::new();
        p.open(&["cat"], Redirects::all_pipes(), None).unwrap();
        let mut out = Vec::new();
        p.communicate(Some(&mut &input[..]), Some(&mut out), None).unwrap();
        assert_eq!(out.len(), input.len());
        assert_eq!(p.returncode(), Some(0));
    }

    #[test]
    #[cfg(unix)]
    fn reopen_while_running_is_rejected() {
        let mut p = Subprocess::new();
        p.open(&["sleep", "5"], Redirects::default(), None).unwrap();
        let pid = p.pid().unwrap();
        match p.open(&["true"], Redirects::default(), None) {
            Err(Error::AlreadyRunning { pid: running }) => assert_eq!(running, pid),
            other => panic!("expected AlreadyRunning, got {other:?}"),
        }
        p.kill().unwrap();
        p.wait().unwrap();
        assert_eq!(p.status(), Status::Signaled(SIGKILL));

        p.open(&["true"], Redirects::default(), None).unwrap();
        p.wait().unwrap();
        assert_eq!(p.status(), Status::Exited(0));
    }

    #[test]
    #[cfg(unix)]
    fn send_after_termination_is_a_no_op() {
        let mut p = Subprocess::new();
        p.open(&["true"], Redirects::default(), None).unwrap();
        p.wait().unwrap();
        assert!(p.poll().unwrap());
        p.terminate().unwrap();
        assert_eq!(p.status(), Status::Exited(0));
    }

    #[test]
    #[cfg(unix)]
    fn drop_kills_running_child() {
        let mut p = Subprocess::new();
        p.open(&["sleep", "30"], Redirects::default(), None).unwrap();
        let pid = p.pid().unwrap() as libc::pid_t;
        let started = Instant::now();
        drop(p);
        assert!(started.elapsed() < Duration::from_secs(5));
        // SAFETY: signal 0 only checks for existence
        let alive = unsafe { libc::kill(pid, 0) } == 0;
        assert!(!alive, "child {pid} survived drop");
    }

    #[test]
    #[cfg(unix)]
    fn call_returns_exit_code() {
        assert_eq!(Subprocess::call(&sh("exit 7")).unwrap(), 7);
        let lookup = lookup::SearchPathLookup::from_env();
        assert_eq!(Subprocess::call_with(&lookup, &sh("exit 0")).unwrap(), 0);
        let err = Subprocess::call_with(&lookup, &["no-such-program-basis"]).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[cfg(unix)]
    struct BrokenSink;

    #[cfg(unix)]
    impl Write for BrokenSink {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    #[cfg(unix)]
    fn communicate_error_leaves_terminal_status() {
        let mut p = Subprocess::new();
        p.open(&sh("echo lost; exit 2"), Redirects::capture(), None).unwrap();
        let (mut sink, mut err) = (BrokenSink, Vec::new());
        assert!(matches!(
            p.communicate_out_err(&mut sink, &mut err),
            Err(Error::Io(ref e)) if e.kind() == io::ErrorKind::BrokenPipe
        ));
        assert_eq!(p.status(), Status::Exited(2));
        assert!(p.stdout.is_none() && p.stderr.is_none());
    }
}
