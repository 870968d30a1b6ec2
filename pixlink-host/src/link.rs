//! Byte links to the device
//!
//! The transmitter only needs three things from a link: push bytes out, wait
//! a bounded time for one byte back, and throw away whatever is sitting in
//! the inbound direction. [`FdLink`] does this over plain file descriptors
//! (stdin/stdout when the port is wired up by the caller, or a socket pair in
//! tests); [`SerialLink`](crate::serial::SerialLink) does it over a tty.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

/// Upper bound on bytes discarded by one drain
pub const DRAIN_LIMIT: usize = 4096;

/// Bidirectional byte link
pub trait Link {
    /// Write all of `bytes` and flush
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Wait up to `timeout` for one inbound byte
    ///
    /// `Ok(None)` means nothing arrived in time.
    fn recv_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>>;

    /// Discard inbound bytes until the line stays quiet for `window`
    ///
    /// Returns the number of bytes discarded.
    fn drain(&mut self, window: Duration) -> io::Result<usize> {
        let mut dropped = 0;
        while dropped < DRAIN_LIMIT {
            match self.recv_byte(window)? {
                Some(_) => dropped += 1,
                None => break,
            }
        }
        Ok(dropped)
    }
}

impl<L: Link + ?Sized> Link for &mut L {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).send(bytes)
    }

    fn recv_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>> {
        (**self).recv_byte(timeout)
    }

    fn drain(&mut self, window: Duration) -> io::Result<usize> {
        (**self).drain(window)
    }
}

/// Link over a pair of file descriptors
///
/// Reads go straight to the descriptor (no userspace buffering) so that a
/// timeout really means the peer said nothing.
#[derive(Debug)]
pub struct FdLink {
    input: File,
    output: File,
}

impl FdLink {
    pub fn new(input: OwnedFd, output: OwnedFd) -> Self {
        Self {
            input: File::from(input),
            output: File::from(output),
        }
    }

    /// Link over duplicates of the process's stdin and stdout
    pub fn stdio() -> io::Result<Self> {
        let input = io::stdin().as_fd().try_clone_to_owned()?;
        let output = io::stdout().as_fd().try_clone_to_owned()?;
        Ok(Self::new(input, output))
    }
}

impl Link for FdLink {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output.write_all(bytes)?;
        self.output.flush()
    }

    fn recv_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>> {
        if !wait_readable(self.input.as_fd(), timeout)? {
            return Ok(None);
        }
        read_one(&mut self.input).map(Some)
    }
}

/// Read exactly one byte, treating end of file as an error
pub(crate) fn read_one<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut byte = [0u8; 1];
    loop {
        match reader.read(&mut byte) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "link closed by peer",
                ))
            }
            Ok(_) => return Ok(byte[0]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Block until `fd` is readable or `timeout` passes
///
/// Hang-up counts as readable so the caller sees the end of file.
pub(crate) fn wait_readable(fd: BorrowedFd<'_>, timeout: Duration) -> io::Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let ms = u16::try_from(remaining.as_millis()).unwrap_or(u16::MAX);
        let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
        match poll(&mut fds, PollTimeout::from(ms)) {
            Ok(0) if Instant::now() >= deadline => return Ok(false),
            Ok(0) => continue,
            Ok(_) => return Ok(true),
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e.into()),
        }
    }
}
