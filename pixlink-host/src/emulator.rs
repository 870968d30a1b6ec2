//! Device emulator
//!
//! Runs the real device receive loop on the host, with stdin/stdout (or any
//! pair of descriptors) standing in for the UART and an in-memory
//! framebuffer standing in for the panel. Each refresh is drawn as text.

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, OwnedFd};
use std::time::Duration;

use pixlink_device::{Device, DeviceError, LinkStats, Poll};
use pixlink_display::Framebuffer;
use pixlink_hal::{SerialRx, SerialTx};
use pixlink_protocol::{Geometry, Reply};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::link::wait_readable;

/// Longest sleep between polls while the line is idle
const IDLE_WAIT: Duration = Duration::from_millis(50);

/// Non-blocking receive half over a file descriptor
#[derive(Debug)]
pub struct FdRx {
    file: File,
    closed: bool,
}

impl FdRx {
    pub fn new(fd: OwnedFd) -> Self {
        Self {
            file: File::from(fd),
            closed: false,
        }
    }

    pub fn stdin() -> io::Result<Self> {
        Ok(Self::new(io::stdin().as_fd().try_clone_to_owned()?))
    }

    /// Whether the peer has closed its end
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Block until a byte may be waiting or `timeout` passes
    pub fn wait(&self, timeout: Duration) -> io::Result<()> {
        wait_readable(self.file.as_fd(), timeout).map(|_| ())
    }
}

impl SerialRx for FdRx {
    type Error = io::Error;

    fn try_read_byte(&mut self) -> io::Result<Option<u8>> {
        if self.closed || !wait_readable(self.file.as_fd(), Duration::ZERO)? {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        loop {
            match self.file.read(&mut byte) {
                Ok(0) => {
                    self.closed = true;
                    return Ok(None);
                }
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

/// Blocking transmit half over a file descriptor
#[derive(Debug)]
pub struct FdTx {
    file: File,
}

impl FdTx {
    pub fn new(fd: OwnedFd) -> Self {
        Self {
            file: File::from(fd),
        }
    }

    pub fn stdout() -> io::Result<Self> {
        Ok(Self::new(io::stdout().as_fd().try_clone_to_owned()?))
    }
}

impl SerialTx for FdTx {
    type Error = io::Error;

    fn write_blocking(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Device receive loop over a text-rendered framebuffer
pub struct Emulator {
    device: Device<Framebuffer>,
    on: char,
    off: char,
}

impl Emulator {
    pub fn new(geometry: Geometry) -> Result<Self> {
        let device =
            Device::new(Framebuffer::new(), geometry).map_err(|_| Error::InvalidGeometry {
                width: geometry.width(),
                height: geometry.height(),
            })?;
        Ok(Self {
            device,
            on: '#',
            off: '.',
        })
    }

    /// Characters used for lit and dark pixels
    pub fn with_glyphs(mut self, on: char, off: char) -> Self {
        self.on = on;
        self.off = off;
        self
    }

    pub fn device(&self) -> &Device<Framebuffer> {
        &self.device
    }

    /// Serve the link until the peer closes it
    ///
    /// Every refresh draws the presented framebuffer to `view`.
    pub fn run<W: Write>(&mut self, rx: &mut FdRx, tx: &mut FdTx, mut view: W) -> Result<LinkStats> {
        info!(
            width = self.device.geometry().width(),
            height = self.device.geometry().height(),
            "emulator listening"
        );
        loop {
            let refreshes = self.device.stats().refreshes;
            match self.device.poll(rx, tx) {
                Ok(Poll::Idle) => {
                    if rx.is_closed() {
                        break;
                    }
                    rx.wait(IDLE_WAIT)?;
                }
                Ok(Poll::Pending) => {}
                Ok(Poll::Replied(reply)) => {
                    match reply {
                        Reply::Ack => debug!("ACK"),
                        Reply::Nak => debug!(reason = ?self.device.stats().last_error, "NAK"),
                    }
                    if self.device.stats().refreshes != refreshes {
                        self.draw(&mut view)?;
                    }
                }
                Err(DeviceError::Rx(e) | DeviceError::Tx(e)) => return Err(e.into()),
            }
        }
        let stats = *self.device.stats();
        info!(
            acked = stats.acked,
            nakked = stats.nakked,
            refreshes = stats.refreshes,
            display_errors = stats.display_errors,
            "link closed"
        );
        Ok(stats)
    }

    /// Serve stdin/stdout, drawing to stderr
    pub fn run_stdio(&mut self) -> Result<LinkStats> {
        let mut rx = FdRx::stdin()?;
        let mut tx = FdTx::stdout()?;
        self.run(&mut rx, &mut tx, io::stderr().lock())
    }

    fn draw<W: Write>(&self, view: &mut W) -> Result<()> {
        let geometry = self.device.geometry();
        let fb = self.device.display();
        let mut text = String::new();
        fb.render(&mut text, geometry.width(), geometry.height(), self.on, self.off)
            .map_err(|_| io::Error::other("failed to render framebuffer"))?;
        text.push_str(&format!("-- refresh {} --\n", fb.flush_count()));
        view.write_all(text.as_bytes())?;
        view.flush()?;
        Ok(())
    }
}
