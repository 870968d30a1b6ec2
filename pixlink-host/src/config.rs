//! Host configuration
//!
//! Loaded from an optional TOML file. Every key has a default, so an empty
//! file (or no file) gives the stock 128x64 panel on a 19200 baud link:
//!
//! ```toml
//! [display]
//! width = 128
//! height = 64
//! channel = 0          # colour channel used for the on/off test
//!
//! [link]
//! port = "/dev/ttyAMA0"  # omit to use stdin/stdout
//! baud = 19200
//! reply_timeout_ms = 10150
//! drain_window_ms = 1
//!
//! [retry]
//! attempts = 3
//!
//! [shaper]
//! delay_us = 520       # omit to derive from the baud rate
//! ```

use std::path::Path;
use std::time::Duration;

use pixlink_hal::SerialConfig;
use pixlink_protocol::Geometry;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transmitter::RetryPolicy;

/// Complete host configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub display: DisplayConfig,
    pub link: LinkConfig,
    pub retry: RetryConfig,
    pub shaper: ShaperConfig,
}

/// Display geometry and pixel test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    pub width: u16,
    pub height: u16,
    /// RGB channel whose non-zero value means "lit"
    pub channel: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: Geometry::DEFAULT.width(),
            height: Geometry::DEFAULT.height(),
            channel: 0,
        }
    }
}

/// Serial link settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkConfig {
    /// Serial device path; stdin/stdout when absent
    pub port: Option<String>,
    pub baud: u32,
    /// How long to wait for the single reply byte
    pub reply_timeout_ms: u64,
    /// Quiet period that ends a drain of stale inbound bytes
    pub drain_window_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: SerialConfig::default().baudrate,
            reply_timeout_ms: 10_150,
            drain_window_ms: 1,
        }
    }
}

/// Retry budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total transmissions allowed per frame
    pub attempts: u8,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { attempts: 3 }
    }
}

/// Rate shaper settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShaperConfig {
    /// Fixed inter-byte delay; derived from the line settings when absent
    pub delay_us: Option<u64>,
}

impl Config {
    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Validated display geometry
    pub fn geometry(&self) -> Result<Geometry> {
        let DisplayConfig { width, height, .. } = self.display;
        Geometry::new(width, height).map_err(|_| Error::InvalidGeometry { width, height })
    }

    /// Validated colour channel
    pub fn channel(&self) -> Result<usize> {
        match self.display.channel {
            c @ 0..=2 => Ok(c),
            c => Err(Error::InvalidChannel(c)),
        }
    }

    /// Line settings (always 8N1, baud from the config)
    pub fn serial(&self) -> SerialConfig {
        SerialConfig {
            baudrate: self.link.baud,
            ..SerialConfig::default()
        }
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.link.reply_timeout_ms)
    }

    pub fn drain_window(&self) -> Duration {
        Duration::from_millis(self.link.drain_window_ms)
    }

    /// Retry budget and timing for the transmitter
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry.attempts,
            reply_timeout: self.reply_timeout(),
            drain_window: self.drain_window(),
        }
    }

    /// Inter-byte delay for the rate shaper
    pub fn shaper_delay(&self) -> Duration {
        match self.shaper.delay_us {
            Some(us) => Duration::from_micros(us),
            None => Duration::from_nanos(self.serial().byte_period_ns()),
        }
    }
}
