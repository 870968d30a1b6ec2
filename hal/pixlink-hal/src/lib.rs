//! Pixlink Hardware Abstraction Layer
//!
//! This crate defines the serial traits the device receive loop is written
//! against, so the same loop runs on a microcontroller UART, on a host
//! terminal, or against an in-memory test double.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  pixlink-device (receive loop)          │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  pixlink-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  MCU UART     │       │  host stdio   │
//! │  (board crate)│       │  (emulator)   │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`serial::SerialTx`], [`serial::SerialRx`] - Serial communication

#![no_std]
#![deny(unsafe_code)]

pub mod serial;

// Re-export key traits at crate root for convenience
pub use serial::{DataBits, Parity, SerialConfig, SerialRx, SerialTx, StopBits};
