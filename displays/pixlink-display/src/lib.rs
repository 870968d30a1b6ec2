//! Monochrome display support for the pixlink device
//!
//! This crate provides:
//! - `PixelDisplay` trait, the two capabilities the receive loop needs
//!   (set one pixel, present the framebuffer)
//! - `Framebuffer`, an in-memory 128x64 implementation used by the host-side
//!   emulator and by tests
//! - `Ssd1306`, a driver for 128x64 SSD1306 OLED panels on SPI
//!
//! # Architecture
//!
//! Row frames arrive one line at a time and are written pixel by pixel into
//! the backend's local buffer. Only a refresh frame pushes the buffer out to
//! the panel, so a half-received image is never shown.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod backend;
pub mod framebuffer;
pub mod ssd1306;

// Re-export key types
pub use backend::{DisplayError, PixelDisplay};
pub use framebuffer::{Framebuffer, HEIGHT, WIDTH};
pub use ssd1306::Ssd1306;
