//! Pixlink device receive loop
//!
//! Ties the frame receiver to a display and a serial port. The loop is
//! driven one byte at a time from the board's main loop:
//!
//! ```text
//! loop {
//!     device.poll(&mut uart_rx, &mut uart_tx)?;
//!     // other device duties
//! }
//! ```
//!
//! `poll` never waits for a byte. Every completed or broken frame produces
//! exactly one reply byte; the device never retransmits or times out on its
//! own. Retrying is the host's job.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

use pixlink_display::{DisplayError, PixelDisplay};
use pixlink_hal::{SerialRx, SerialTx};
use pixlink_protocol::{pixel_level, Command, Feed, FrameError, FrameReceiver, Geometry, Reply};

/// Receive loop errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceError<RxE, TxE> {
    /// Serial read failed
    Rx(RxE),
    /// Serial write failed
    Tx(TxE),
}

/// Result of one `poll` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Poll {
    /// No byte was waiting
    Idle,
    /// Byte consumed, frame still in progress
    Pending,
    /// Byte completed or broke a frame and this reply was sent
    Replied(Reply),
}

/// Counters for frames handled since start-up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    /// Frames accepted and applied
    pub acked: u32,
    /// Rejections of any kind, stray bytes included
    pub nakked: u32,
    /// Rejections because the checksum did not match
    pub checksum_errors: u32,
    /// Refresh commands applied
    pub refreshes: u32,
    /// Frames that were well formed but the display failed to apply
    pub display_errors: u32,
    /// Last framing or payload rejection reason
    pub last_error: Option<FrameError>,
    /// Last display failure
    pub last_display_error: Option<DisplayError>,
}

/// Device side of the link
pub struct Device<D> {
    receiver: FrameReceiver,
    display: D,
    stats: LinkStats,
}

impl<D: PixelDisplay> Device<D> {
    /// Create a device for `display`, checking the geometry fits on it
    pub fn new(display: D, geometry: Geometry) -> Result<Self, DisplayError> {
        let (width, height) = display.dimensions();
        if geometry.width() > width || geometry.height() > height {
            return Err(DisplayError::InvalidCoordinates);
        }
        Ok(Self {
            receiver: FrameReceiver::new(geometry),
            display,
            stats: LinkStats::default(),
        })
    }

    /// Consume one byte from the link
    ///
    /// Returns the reply to send, if the byte completed or broke a frame.
    pub fn handle_byte(&mut self, byte: u8) -> Option<Reply> {
        match self.receiver.feed(byte) {
            Feed::Pending => None,
            Feed::Accepted(command) => match self.apply(command) {
                Ok(()) => {
                    self.stats.acked = self.stats.acked.wrapping_add(1);
                    Some(Reply::Ack)
                }
                Err(error) => {
                    self.stats.display_errors = self.stats.display_errors.wrapping_add(1);
                    self.stats.last_display_error = Some(error);
                    self.stats.nakked = self.stats.nakked.wrapping_add(1);
                    Some(Reply::Nak)
                }
            },
            Feed::Rejected(error) => Some(self.nak(error)),
        }
    }

    /// Service the link once without blocking
    ///
    /// Reads at most one byte and writes at most one reply byte.
    pub fn poll<R, T>(&mut self, rx: &mut R, tx: &mut T) -> Result<Poll, DeviceError<R::Error, T::Error>>
    where
        R: SerialRx,
        T: SerialTx,
    {
        let Some(byte) = rx.try_read_byte().map_err(DeviceError::Rx)? else {
            return Ok(Poll::Idle);
        };
        match self.handle_byte(byte) {
            Some(reply) => {
                tx.write_byte(reply.to_byte()).map_err(DeviceError::Tx)?;
                Ok(Poll::Replied(reply))
            }
            None => Ok(Poll::Pending),
        }
    }

    /// Drop any partial frame
    pub fn reset(&mut self) {
        self.receiver.reset();
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    pub fn geometry(&self) -> Geometry {
        self.receiver.geometry()
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    /// Tear down the loop and hand back the display
    pub fn into_display(self) -> D {
        self.display
    }

    fn apply(&mut self, command: Command) -> Result<(), DisplayError> {
        match command {
            Command::Row { index, bits } => {
                for x in 0..self.receiver.geometry().width() {
                    let level = pixel_level(&bits, x as usize);
                    self.display.set_pixel(x, index as u16, level)?;
                }
                Ok(())
            }
            Command::Refresh => {
                self.display.flush()?;
                self.stats.refreshes = self.stats.refreshes.wrapping_add(1);
                Ok(())
            }
        }
    }

    fn nak(&mut self, error: FrameError) -> Reply {
        self.stats.nakked = self.stats.nakked.wrapping_add(1);
        if error == FrameError::InvalidChecksum {
            self.stats.checksum_errors = self.stats.checksum_errors.wrapping_add(1);
        }
        self.stats.last_error = Some(error);
        Reply::Nak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixlink_display::Framebuffer;
    use pixlink_protocol::{Frame, ACK, CMD_ROW, NAK};
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::vec::Vec;

    struct FakeRx(VecDeque<u8>);

    impl SerialRx for FakeRx {
        type Error = ();

        fn try_read_byte(&mut self) -> Result<Option<u8>, ()> {
            Ok(self.0.pop_front())
        }
    }

    #[derive(Default)]
    struct FakeTx {
        sent: Vec<u8>,
        flushes: usize,
    }

    impl SerialTx for FakeTx {
        type Error = ();

        fn write_blocking(&mut self, data: &[u8]) -> Result<(), ()> {
            self.sent.extend_from_slice(data);
            Ok(())
        }

        fn flush(&mut self) -> Result<(), ()> {
            self.flushes += 1;
            Ok(())
        }
    }

    fn tiny() -> Geometry {
        Geometry::new(8, 1).unwrap()
    }

    fn run(device: &mut Device<Framebuffer>, bytes: &[u8]) -> Vec<u8> {
        let mut rx = FakeRx(bytes.iter().copied().collect());
        let mut tx = FakeTx::default();
        while device.poll(&mut rx, &mut tx).unwrap() != Poll::Idle {}
        tx.sent
    }

    fn row_frame(index: u8, bits: &[u8]) -> Vec<u8> {
        let mut data = std::vec![index];
        data.extend_from_slice(bits);
        Frame::new(CMD_ROW, &data)
            .unwrap()
            .encode_to_vec()
            .unwrap()
            .to_vec()
    }

    #[test]
    fn test_all_zero_row_acked() {
        let mut device = Device::new(Framebuffer::new(), tiny()).unwrap();
        let frame = [0x02, 0x03, 0x00, 0x00, 0x00, 0x01, 0x03];
        assert_eq!(run(&mut device, &frame), [ACK]);
        for x in 0..8 {
            assert_eq!(device.display().pixel(x, 0), Some(false));
        }
        assert_eq!(device.stats().acked, 1);
    }

    #[test]
    fn test_corrupt_checksum_then_resend() {
        let mut device = Device::new(Framebuffer::new(), tiny()).unwrap();
        let good = [0x02, 0x03, 0x00, 0x00, 0x00, 0x01, 0x03];
        let mut bad = good;
        bad[5] = 0x55;

        // The bad checksum draws one NAK; its trailing ETX is a stray byte
        // and draws another
        assert_eq!(run(&mut device, &bad), [NAK, NAK]);
        assert_eq!(device.stats().checksum_errors, 1);
        assert_eq!(run(&mut device, &good), [ACK]);
    }

    #[test]
    fn test_row_sets_pixels_without_presenting() {
        let mut device = Device::new(Framebuffer::new(), Geometry::DEFAULT).unwrap();
        let mut bits = [0u8; 16];
        bits[0] = 0b1000_0000;
        bits[15] = 0b0000_0001;
        assert_eq!(run(&mut device, &row_frame(10, &bits)), [ACK]);

        let fb = device.display();
        assert_eq!(fb.pixel(0, 10), Some(true));
        assert_eq!(fb.pixel(1, 10), Some(false));
        assert_eq!(fb.pixel(127, 10), Some(true));
        assert_eq!(fb.presented_pixel(0, 10), Some(false));
        assert_eq!(fb.flush_count(), 0);
    }

    #[test]
    fn test_refresh_presents() {
        let mut device = Device::new(Framebuffer::new(), Geometry::DEFAULT).unwrap();
        let mut bytes = row_frame(0, &[0xFF; 16]);
        bytes.extend_from_slice(&[0x02, 0x01, 0x01, 0x02, 0x03]);
        assert_eq!(run(&mut device, &bytes), [ACK, ACK]);

        let fb = device.display();
        assert_eq!(fb.flush_count(), 1);
        assert_eq!(fb.presented_pixel(64, 0), Some(true));
        assert_eq!(device.stats().refreshes, 1);
    }

    #[test]
    fn test_row_overwrites_previous_levels() {
        let mut device = Device::new(Framebuffer::new(), tiny()).unwrap();
        run(&mut device, &row_frame(0, &[0xFF]));
        run(&mut device, &row_frame(0, &[0x0F]));
        assert_eq!(device.display().pixel(0, 0), Some(false));
        assert_eq!(device.display().pixel(7, 0), Some(true));
    }

    #[test]
    fn test_each_stray_byte_is_nakked() {
        let mut device = Device::new(Framebuffer::new(), tiny()).unwrap();
        assert_eq!(run(&mut device, &[0xAA, 0xBB]), [NAK, NAK]);
        assert_eq!(device.stats().last_error, Some(FrameError::InvalidStart));
    }

    /// Panel whose bus is gone
    struct DeadPanel;

    impl PixelDisplay for DeadPanel {
        fn set_pixel(&mut self, _x: u16, _y: u16, _on: bool) -> Result<(), DisplayError> {
            Ok(())
        }

        fn flush(&mut self) -> Result<(), DisplayError> {
            Err(DisplayError::Communication)
        }

        fn dimensions(&self) -> (u16, u16) {
            (128, 64)
        }
    }

    #[test]
    fn test_display_failure_is_nakked_but_not_a_frame_error() {
        let mut device = Device::new(DeadPanel, tiny()).unwrap();
        assert_eq!(device.handle_byte(0x7F), Some(Reply::Nak));
        for &byte in &[0x02, 0x01, 0x01, 0x02] {
            assert_eq!(device.handle_byte(byte), None);
        }
        assert_eq!(device.handle_byte(0x03), Some(Reply::Nak));

        let stats = device.stats();
        assert_eq!(stats.nakked, 2);
        assert_eq!(stats.display_errors, 1);
        assert_eq!(stats.last_display_error, Some(DisplayError::Communication));
        // Still the stray byte from before the refresh
        assert_eq!(stats.last_error, Some(FrameError::InvalidStart));
        assert_eq!(stats.checksum_errors, 0);
        assert_eq!(stats.refreshes, 0);
        assert_eq!(stats.acked, 0);
    }

    #[test]
    fn test_poll_idle_without_input() {
        let mut device = Device::new(Framebuffer::new(), tiny()).unwrap();
        let mut rx = FakeRx(VecDeque::new());
        let mut tx = FakeTx::default();
        assert_eq!(device.poll(&mut rx, &mut tx), Ok(Poll::Idle));
        assert!(tx.sent.is_empty());
    }

    #[test]
    fn test_reply_is_flushed() {
        let mut device = Device::new(Framebuffer::new(), tiny()).unwrap();
        let mut rx = FakeRx([0x00].into_iter().collect());
        let mut tx = FakeTx::default();
        assert_eq!(device.poll(&mut rx, &mut tx), Ok(Poll::Replied(Reply::Nak)));
        assert_eq!(tx.flushes, 1);
    }

    #[test]
    fn test_geometry_larger_than_display() {
        let geometry = Geometry::new(256, 64).unwrap();
        assert!(matches!(
            Device::new(Framebuffer::new(), geometry),
            Err(DisplayError::InvalidCoordinates)
        ));
    }

    #[test]
    fn test_partial_frame_dropped_on_reset() {
        let mut device = Device::new(Framebuffer::new(), tiny()).unwrap();
        assert!(run(&mut device, &[0x02, 0x03, 0x00]).is_empty());
        device.reset();
        assert_eq!(run(&mut device, &row_frame(0, &[0x01])), [ACK]);
    }

    proptest! {
        #[test]
        fn prop_applied_row_matches_bits(index in 0u8..64, bits in proptest::collection::vec(any::<u8>(), 16)) {
            let mut device = Device::new(Framebuffer::new(), Geometry::DEFAULT).unwrap();
            prop_assert_eq!(run(&mut device, &row_frame(index, &bits)), std::vec![ACK]);
            for x in 0..128u16 {
                let expected = bits[x as usize / 8] & (0x80 >> (x % 8)) != 0;
                prop_assert_eq!(device.display().pixel(x, index as u16), Some(expected));
            }
        }
    }
}
