//! Serial port link

use std::io::{self, Read, Write};
use std::time::Duration;

use pixlink_hal::{DataBits, Parity, SerialConfig, StopBits};
use serialport::{ClearBuffer, FlowControl, SerialPort};
use tracing::{debug, warn};

use crate::error::Result;
use crate::link::{Link, DRAIN_LIMIT};

/// Link over a tty opened with `serialport`
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialLink {
    /// Open `path` with the given line settings and no flow control
    pub fn open(path: &str, config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(path, config.baudrate)
            .data_bits(data_bits(config.data_bits))
            .parity(parity(config.parity))
            .stop_bits(stop_bits(config.stop_bits))
            .flow_control(FlowControl::None)
            .open()?;
        debug!(port = path, baud = config.baudrate, "serial port open");
        Ok(Self {
            port,
            name: path.to_owned(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Link for SerialLink {
    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn recv_byte(&mut self, timeout: Duration) -> io::Result<Option<u8>> {
        self.port.set_timeout(timeout)?;
        let mut byte = [0u8; 1];
        match self.port.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn drain(&mut self, window: Duration) -> io::Result<usize> {
        let pending = pending_input(self.port.bytes_to_read(), &self.name);
        if let Err(e) = self.port.clear(ClearBuffer::Input) {
            warn!(port = %self.name, error = %e, "input clear failed, draining by hand");
        }
        // Catch anything still in flight from the device
        let mut dropped = pending;
        while dropped < DRAIN_LIMIT && self.recv_byte(window)?.is_some() {
            dropped += 1;
        }
        Ok(dropped)
    }
}

/// Bytes the driver reports as waiting, or 0 when it cannot say
fn pending_input(count: serialport::Result<u32>, port: &str) -> usize {
    match count {
        Ok(n) => n as usize,
        Err(e) => {
            warn!(port, error = %e, "cannot query pending input, count may be low");
            0
        }
    }
}

fn data_bits(bits: DataBits) -> serialport::DataBits {
    match bits {
        DataBits::Seven => serialport::DataBits::Seven,
        DataBits::Eight => serialport::DataBits::Eight,
    }
}

fn parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    }
}

fn stop_bits(bits: StopBits) -> serialport::StopBits {
    match bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}
