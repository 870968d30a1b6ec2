//! Error types for host-side operations.

use std::fmt;

use pixlink_protocol::{FrameError, RleError};

use crate::transmitter::SendOutcome;

/// Alias for `Result<T, pixlink_host::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Which part of an image transfer failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Row frame, by row index
    Row(u8),
    /// Final refresh frame
    Refresh,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Row(index) => write!(f, "row {index}"),
            Stage::Refresh => f.write_str("refresh"),
        }
    }
}

/// Errors returned by host operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error on the link, the image file, or a byte stream.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The serial port could not be opened or configured.
    #[error("serial port: {0}")]
    Serial(#[from] serialport::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    /// The image file does not hold exactly one raw RGB frame.
    #[error("image is {actual} bytes, expected {expected} ({width}x{height} RGB)")]
    ImageSize {
        /// Size found
        actual: u64,
        /// Size required by the geometry
        expected: u64,
        /// Configured width
        width: u16,
        /// Configured height
        height: u16,
    },

    /// The configured display size cannot be carried by row frames.
    #[error("invalid display geometry {width}x{height}")]
    InvalidGeometry {
        /// Configured width
        width: u16,
        /// Configured height
        height: u16,
    },

    /// The colour channel used for the on/off test is not 0, 1, or 2.
    #[error("colour channel {0} out of range (expected 0-2)")]
    InvalidChannel(usize),

    /// A frame could not be built.
    #[error("frame: {0:?}")]
    Frame(FrameError),

    /// A run-length stream could not be encoded or decoded.
    #[error("run-length: {0:?}")]
    Rle(RleError),

    /// A frame was not acknowledged within the retry budget.
    #[error("{stage} not acknowledged: {outcome}")]
    Transfer {
        /// Frame that failed
        stage: Stage,
        /// How the last attempt ended
        outcome: SendOutcome,
    },

    /// The retry budget allows no transmissions at all.
    #[error("retry budget must allow at least one attempt")]
    ZeroAttempts,
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Error::Frame(e)
    }
}

impl From<RleError> for Error {
    fn from(e: RleError) -> Self {
        Error::Rle(e)
    }
}
