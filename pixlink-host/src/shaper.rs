//! Byte-rate shaper
//!
//! Forwards a stream one byte at a time with a fixed pause after each byte,
//! so a pipe or pty behaves like a slow serial line. Knows nothing about
//! frames.

use std::io::{self, Read, Write};
use std::thread;
use std::time::Duration;

use pixlink_hal::SerialConfig;
use tracing::{debug, trace};

/// Fixed inter-byte delay forwarder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateShaper {
    delay: Duration,
}

impl Default for RateShaper {
    fn default() -> Self {
        Self::for_line(&SerialConfig::default())
    }
}

impl RateShaper {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Pace at the byte rate of a real line with these settings
    pub fn for_line(config: &SerialConfig) -> Self {
        Self::new(Duration::from_nanos(config.byte_period_ns()))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Forward `reader` to `writer` until end of input
    ///
    /// Returns the number of bytes forwarded.
    pub fn run<R: Read, W: Write>(&self, mut reader: R, mut writer: W) -> io::Result<u64> {
        debug!(delay_us = self.delay.as_micros() as u64, "shaper started");
        let mut byte = [0u8; 1];
        let mut forwarded = 0u64;
        loop {
            match reader.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
            writer.write_all(&byte)?;
            writer.flush()?;
            forwarded += 1;
            trace!(byte = byte[0], "forwarded");
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
        }
        debug!(forwarded, "shaper reached end of input");
        Ok(forwarded)
    }
}
