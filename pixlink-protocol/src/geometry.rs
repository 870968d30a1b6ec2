//! Display geometry shared by both ends of the link
//!
//! Row frames carry no width field. Sender and receiver must agree on the
//! geometry up front, and the row length on the wire is derived from it.

use crate::frame::FrameError;
use crate::messages::MAX_ROW_BYTES;

/// Display size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Geometry {
    width: u16,
    height: u16,
}

impl Geometry {
    /// The 128x64 monochrome OLED panel
    pub const DEFAULT: Geometry = Geometry {
        width: 128,
        height: 64,
    };

    /// Create a geometry, checking that a row fits in one frame
    ///
    /// Width must be a non-zero multiple of 8. Height must be 1..=256 so
    /// every row index fits in the single index byte.
    pub fn new(width: u16, height: u16) -> Result<Self, FrameError> {
        if width == 0 || width % 8 != 0 || (width / 8) as usize > MAX_ROW_BYTES {
            return Err(FrameError::InvalidGeometry);
        }
        if height == 0 || height > 256 {
            return Err(FrameError::InvalidGeometry);
        }
        Ok(Self { width, height })
    }

    pub const fn width(&self) -> u16 {
        self.width
    }

    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Packed bytes per row (8 pixels per byte)
    pub const fn row_bytes(&self) -> usize {
        (self.width / 8) as usize
    }

    /// Whether `index` names a row on this display
    pub const fn contains_row(&self, index: u8) -> bool {
        (index as u16) < self.height
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::DEFAULT
    }
}
