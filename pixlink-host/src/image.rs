//! Raw RGB images
//!
//! An image file is headerless: `width * height` pixels, 3 bytes each,
//! row-major from the top-left corner.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use pixlink_protocol::Geometry;

use crate::error::{Error, Result};

/// Bytes per RGB pixel
pub const BYTES_PER_PIXEL: usize = 3;

/// One full frame of raw RGB pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbImage {
    geometry: Geometry,
    pixels: Vec<u8>,
}

impl RgbImage {
    /// Bytes a frame of this geometry occupies
    pub fn expected_len(geometry: &Geometry) -> usize {
        geometry.width() as usize * geometry.height() as usize * BYTES_PER_PIXEL
    }

    pub fn from_bytes(geometry: Geometry, pixels: Vec<u8>) -> Result<Self> {
        let expected = Self::expected_len(&geometry);
        if pixels.len() != expected {
            return Err(size_error(&geometry, pixels.len() as u64));
        }
        Ok(Self { geometry, pixels })
    }

    /// Read an image file, checking its size before reading it
    pub fn load(path: &Path, geometry: Geometry) -> Result<Self> {
        let mut file = File::open(path)?;
        let actual = file.metadata()?.len();
        if actual != Self::expected_len(&geometry) as u64 {
            return Err(size_error(&geometry, actual));
        }
        let mut pixels = Vec::with_capacity(actual as usize);
        file.read_to_end(&mut pixels)?;
        Self::from_bytes(geometry, pixels)
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Pixels of row `index`, `width * 3` bytes
    pub fn row(&self, index: u16) -> Option<&[u8]> {
        if index >= self.geometry.height() {
            return None;
        }
        let stride = self.geometry.width() as usize * BYTES_PER_PIXEL;
        let start = index as usize * stride;
        self.pixels.get(start..start + stride)
    }

    /// Rows from top to bottom
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        self.pixels
            .chunks_exact(self.geometry.width() as usize * BYTES_PER_PIXEL)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }
}

fn size_error(geometry: &Geometry, actual: u64) -> Error {
    Error::ImageSize {
        actual,
        expected: RgbImage::expected_len(geometry) as u64,
        width: geometry.width(),
        height: geometry.height(),
    }
}
