//! Pixlink host tooling
//!
//! Everything that runs on the machine holding the image:
//!
//! - [`transmitter`]: row-by-row image transfer with ACK/NAK retry
//! - [`link`] and [`serial`]: byte links over file descriptors or a tty
//! - [`shaper`]: paces a byte stream at serial-line speed
//! - [`codec`]: run-length compression as a stream filter
//! - [`emulator`]: the device receive loop running against a text display
//!
//! The `pixlink` binary wires these to a command line. Link bytes travel on
//! stdout/stdin, so all logging goes to stderr.

#![deny(unsafe_code)]

pub mod codec;
pub mod config;
pub mod emulator;
pub mod error;
pub mod image;
pub mod link;
pub mod serial;
pub mod shaper;
pub mod transmitter;

pub use config::Config;
pub use emulator::{Emulator, FdRx, FdTx};
pub use error::{Error, Result, Stage};
pub use image::RgbImage;
pub use link::{FdLink, Link};
pub use serial::SerialLink;
pub use shaper::RateShaper;
pub use transmitter::{
    craft_refresh_frame, craft_row_frame, RetryPolicy, SendOutcome, TransferStats, Transmitter,
};
