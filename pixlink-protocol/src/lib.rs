//! Pixlink row-transfer protocol
//!
//! This crate defines the link layer between the host (which owns the image)
//! and the device (which owns the display). The link is a bare, half-duplex
//! byte stream, so the protocol brings its own delimiting, corruption
//! detection, and stop-and-wait acknowledgement.
//!
//! # Frame Layout
//!
//! ```text
//! ┌─────┬─────┬─────┬──────────────┬──────────┬─────┐
//! │ STX │ LEN │ CMD │ CMD-DATA     │ CHECKSUM │ ETX │
//! │ 02  │ 1B  │ 1B  │ 0–249B       │ 1B       │ 03  │
//! └─────┴─────┴─────┴──────────────┴──────────┴─────┘
//! ```
//!
//! `LEN` counts `CMD` and `CMD-DATA`. The checksum is the XOR fold of every
//! byte from `STX` up to the last data byte. The device answers each frame
//! with a lone `ACK` (0x06) or `NAK` (0x15).
//!
//! Pixel data can additionally be run-length coded with [`rle`] before it
//! reaches the host transmitter.

#![no_std]
#![deny(unsafe_code)]

// Property tests need the host standard library
#[cfg(test)]
extern crate std;

pub mod checksum;
pub mod frame;
pub mod geometry;
pub mod messages;
pub mod rle;

pub use checksum::checksum;
pub use frame::{
    Feed, Frame, FrameError, FrameReceiver, ETX, HEADER_LEN, MAX_DATA_SIZE, MAX_FRAME_SIZE,
    MAX_LEN, STX,
};
pub use geometry::Geometry;
pub use messages::{pixel_level, Command, Reply, ACK, CMD_REFRESH, CMD_ROW, MAX_ROW_BYTES, NAK};
pub use rle::{Run, RunLengthDecoder, RunLengthEncoder, RleError};
