//! In-memory framebuffer
//!
//! Page-organized like the controller RAM of the 128x64 OLED panels: each
//! byte covers 8 vertical pixels, LSB at the top. Keeps a second copy that
//! only changes on `flush`, which is what a viewer would actually see.

use core::fmt;

use crate::backend::{DisplayError, PixelDisplay};

/// Display width in pixels
pub const WIDTH: usize = 128;

/// Display height in pixels
pub const HEIGHT: usize = 64;

/// Number of 8-pixel pages
pub const PAGES: usize = HEIGHT / 8;

type Pages = [[u8; WIDTH]; PAGES];

/// Double-buffered 128x64 monochrome framebuffer
#[derive(Clone)]
pub struct Framebuffer {
    /// Pixels being assembled
    draw: Pages,
    /// Pixels as of the last flush
    presented: Pages,
    flushes: u32,
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framebuffer {
    /// Create a blank framebuffer
    pub const fn new() -> Self {
        Self {
            draw: [[0; WIDTH]; PAGES],
            presented: [[0; WIDTH]; PAGES],
            flushes: 0,
        }
    }

    /// Level of a pixel in the drawing buffer
    pub fn pixel(&self, x: u16, y: u16) -> Option<bool> {
        Self::read(&self.draw, x, y)
    }

    /// Level of a pixel as last presented
    pub fn presented_pixel(&self, x: u16, y: u16) -> Option<bool> {
        Self::read(&self.presented, x, y)
    }

    /// Number of completed flushes
    pub fn flush_count(&self) -> u32 {
        self.flushes
    }

    /// Clear the drawing buffer
    pub fn clear(&mut self) {
        for page in self.draw.iter_mut() {
            page.fill(0);
        }
    }

    /// Raw page data of the drawing buffer
    pub fn pages(&self) -> &[[u8; WIDTH]; PAGES] {
        &self.draw
    }

    /// Write the top-left `width` x `height` of the presented image as
    /// text, one line per pixel row
    ///
    /// The area is clipped to the panel.
    pub fn render<W: fmt::Write>(
        &self,
        out: &mut W,
        width: u16,
        height: u16,
        on: char,
        off: char,
    ) -> fmt::Result {
        let width = width.min(WIDTH as u16);
        let height = height.min(HEIGHT as u16);
        for y in 0..height {
            for x in 0..width {
                let lit = self.presented_pixel(x, y).unwrap_or(false);
                out.write_char(if lit { on } else { off })?;
            }
            out.write_char('\n')?;
        }
        Ok(())
    }

    fn read(pages: &Pages, x: u16, y: u16) -> Option<bool> {
        let (x, y) = (x as usize, y as usize);
        if x >= WIDTH || y >= HEIGHT {
            return None;
        }
        Some(pages[y / 8][x] & (1 << (y % 8)) != 0)
    }
}

impl PixelDisplay for Framebuffer {
    fn set_pixel(&mut self, x: u16, y: u16, on: bool) -> Result<(), DisplayError> {
        set_page_pixel(&mut self.draw, x, y, on)
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        self.presented = self.draw;
        self.flushes = self.flushes.wrapping_add(1);
        Ok(())
    }

    fn dimensions(&self) -> (u16, u16) {
        (WIDTH as u16, HEIGHT as u16)
    }
}

/// Set one pixel in page-organized display RAM
pub(crate) fn set_page_pixel(
    pages: &mut [[u8; WIDTH]; PAGES],
    x: u16,
    y: u16,
    on: bool,
) -> Result<(), DisplayError> {
    let (x, y) = (x as usize, y as usize);
    if x >= WIDTH || y >= HEIGHT {
        return Err(DisplayError::InvalidCoordinates);
    }
    let mask = 1 << (y % 8);
    let cell = &mut pages[y / 8][x];
    if on {
        *cell |= mask;
    } else {
        *cell &= !mask;
    }
    Ok(())
}
