//! Byte exchange over the three standard stream pipes of a child.
//!
//! The parent feeds the child's input while draining both of its outputs, so
//! the child can never block on a full pipe while the parent blocks on
//! another one.

use std::fs::File;
use std::io::{self, Read, Write};

/// Largest amount of input written per readiness notification. Writes of at
/// most this size to a pipe reported writable never block.
const INPUT_CHUNK: usize = 512;

const OUTPUT_CHUNK: usize = 4096;

/// Parent ends of the child's pipes; `None` where a stream is not piped.
pub(super) struct Pipes {
    pub stdin: Option<File>,
    pub stdout: Option<File>,
    pub stderr: Option<File>,
}

/// Where the exchanged bytes come from and go to.
pub(super) struct Endpoints<'a> {
    pub input: Option<&'a mut dyn Read>,
    pub output: Option<&'a mut dyn Write>,
    pub error: Option<&'a mut dyn Write>,
}

/// Copy all of `input` to the child and all of its output to the sinks.
///
/// Every pipe is closed once done. Output without a sink is discarded. If the
/// child closes its input early the remaining input is dropped.
#[cfg(unix)]
pub(super) fn exchange(pipes: Pipes, mut ends: Endpoints<'_>) -> io::Result<()> {
    use std::os::fd::AsRawFd;

    let Pipes {
        mut stdin,
        mut stdout,
        mut stderr,
    } = pipes;
    if ends.input.is_none() {
        stdin = None;
    }

    let mut pending = Vec::with_capacity(INPUT_CHUNK);
    let mut offset = 0;
    let mut buf = [0u8; OUTPUT_CHUNK];

    while stdin.is_some() || stdout.is_some() || stderr.is_some() {
        let slots = [
            stdin.as_ref().map(|f| (f.as_raw_fd(), libc::POLLOUT)),
            stdout.as_ref().map(|f| (f.as_raw_fd(), libc::POLLIN)),
            stderr.as_ref().map(|f| (f.as_raw_fd(), libc::POLLIN)),
        ];
        let mut fds: Vec<libc::pollfd> = slots
            .iter()
            .flatten()
            .map(|&(fd, events)| libc::pollfd {
                fd,
                events,
                revents: 0,
            })
            .collect();

        // SAFETY: `fds` is a valid, exclusively borrowed array of `fds.len()` entries.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if rc < 0 {
            let e = io::Error::last_os_error();
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(e);
        }

        let mut ready = [false; 3];
        let mut polled = fds.iter();
        for (slot, flag) in slots.iter().zip(ready.iter_mut()) {
            if slot.is_some() {
                *flag = polled.next().is_some_and(|p| p.revents != 0);
            }
        }

        if ready[0] {
            if let Some(reader) = ends.input.as_mut() {
                feed(&mut stdin, &mut **reader, &mut pending, &mut offset)?;
            }
        }
        if ready[1] {
            let sink = ends.output.as_mut().map(|w| &mut **w as &mut dyn Write);
            drain(&mut stdout, sink, &mut buf)?;
        }
        if ready[2] {
            let sink = ends.error.as_mut().map(|w| &mut **w as &mut dyn Write);
            drain(&mut stderr, sink, &mut buf)?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn feed(
    pipe: &mut Option<File>,
    reader: &mut dyn Read,
    pending: &mut Vec<u8>,
    offset: &mut usize,
) -> io::Result<()> {
    let Some(file) = pipe.as_mut() else {
        return Ok(());
    };
    if *offset == pending.len() {
        pending.resize(INPUT_CHUNK, 0);
        let n = loop {
            match reader.read(pending) {
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                other => break other?,
            }
        };
        pending.truncate(n);
        *offset = 0;
        if n == 0 {
            *pipe = None;
            return Ok(());
        }
    }
    match file.write(&pending[*offset..]) {
        Ok(n) => *offset += n,
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            tracing::debug!("child closed its input, dropping remaining bytes");
            *pipe = None;
        }
        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
        Err(e) => return Err(e),
    }
    Ok(())
}

#[cfg(unix)]
fn drain(pipe: &mut Option<File>, sink: Option<&mut dyn Write>, buf: &mut [u8]) -> io::Result<()> {
    let Some(file) = pipe.as_mut() else {
        return Ok(());
    };
    match file.read(buf) {
        Ok(0) => *pipe = None,
        Ok(n) => {
            if let Some(sink) = sink {
                sink.write_all(&buf[..n])?;
            }
        }
        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
        Err(e) => return Err(e),
    }
    Ok(())
}

/// Without a readiness selector both outputs are drained by helper threads
/// while the calling thread feeds the input.
#[cfg(not(unix))]
pub(super) fn exchange(pipes: Pipes, ends: Endpoints<'_>) -> io::Result<()> {
    fn read_all(mut file: File) -> io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    let Endpoints {
        input,
        output,
        error,
    } = ends;

    std::thread::scope(|scope| {
        let out_reader = pipes.stdout.map(|f| scope.spawn(move || read_all(f)));
        let err_reader = pipes.stderr.map(|f| scope.spawn(move || read_all(f)));

        if let (Some(mut pipe), Some(reader)) = (pipes.stdin, input) {
            match io::copy(reader, &mut pipe) {
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    tracing::debug!("child closed its input, dropping remaining bytes");
                }
                other => {
                    other?;
                }
            }
        }

        for (reader, sink) in [(out_reader, output), (err_reader, error)] {
            let Some(reader) = reader else { continue };
            let bytes = reader
                .join()
                .map_err(|_| io::Error::other("pipe reader thread panicked"))??;
            if let Some(sink) = sink {
                sink.write_all(&bytes)?;
            }
        }
        Ok(())
    })
}
