//! Display backend trait
//!
//! The receive loop only ever sets single pixels and asks for the result to
//! be shown, so that is all a backend has to provide.

/// Display backend errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    /// Communication error with display
    Communication,
    /// Invalid coordinates or dimensions
    InvalidCoordinates,
    /// Display not initialized
    NotInitialized,
}

/// Monochrome pixel display
///
/// Implementations keep a local framebuffer. `set_pixel` only touches that
/// buffer; nothing reaches the panel until `flush`.
pub trait PixelDisplay {
    /// Set pixel (`x`, `y`) on or off in the framebuffer
    fn set_pixel(&mut self, x: u16, y: u16, on: bool) -> Result<(), DisplayError>;

    /// Send the framebuffer to the panel
    fn flush(&mut self) -> Result<(), DisplayError>;

    /// Get the display dimensions
    ///
    /// Returns (width, height) in pixels
    fn dimensions(&self) -> (u16, u16);
}

impl<T: PixelDisplay + ?Sized> PixelDisplay for &mut T {
    fn set_pixel(&mut self, x: u16, y: u16, on: bool) -> Result<(), DisplayError> {
        (**self).set_pixel(x, y, on)
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        (**self).flush()
    }

    fn dimensions(&self) -> (u16, u16) {
        (**self).dimensions()
    }
}
