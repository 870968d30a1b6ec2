//! Commands and replies carried by the link
//!
//! - Host → Device: framed commands (`ROW`, `REFRESH`)
//! - Device → Host: a single unframed reply byte (`ACK` or `NAK`)

use heapless::Vec;

use crate::frame::{Frame, FrameError, MAX_DATA_SIZE};
use crate::geometry::Geometry;

// Command IDs: Host → Device
pub const CMD_ROW: u8 = 0x00;
pub const CMD_REFRESH: u8 = 0x01;

// Reply bytes: Device → Host
pub const ACK: u8 = 0x06;
pub const NAK: u8 = 0x15;

/// Largest packed row (CMD-DATA minus the row index byte)
pub const MAX_ROW_BYTES: usize = MAX_DATA_SIZE - 1;

/// Commands sent from the host to the device
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// One display line, 8 pixels per byte, MSB first, 1 = lit
    Row {
        index: u8,
        bits: Vec<u8, MAX_ROW_BYTES>,
    },
    /// Present the assembled framebuffer
    Refresh,
}

impl Command {
    /// Build a row command by packing one level per pixel
    ///
    /// `levels` must yield exactly `geometry.width()` values.
    pub fn row<I>(index: u8, levels: I, geometry: &Geometry) -> Result<Self, FrameError>
    where
        I: IntoIterator<Item = bool>,
    {
        if !geometry.contains_row(index) {
            return Err(FrameError::InvalidPayload);
        }

        let width = geometry.width() as usize;
        let mut bits = Vec::<u8, MAX_ROW_BYTES>::new();
        let mut count = 0usize;
        for level in levels {
            if count == width {
                return Err(FrameError::InvalidPayload);
            }
            if count % 8 == 0 {
                bits.push(0).map_err(|_| FrameError::PayloadTooLarge)?;
            }
            if level {
                if let Some(byte) = bits.last_mut() {
                    *byte |= 0x80 >> (count % 8);
                }
            }
            count += 1;
        }
        if count != width {
            return Err(FrameError::InvalidPayload);
        }

        Ok(Command::Row { index, bits })
    }

    /// Encode this command into a frame
    pub fn to_frame(&self) -> Result<Frame, FrameError> {
        match self {
            Command::Row { index, bits } => {
                // Payload: [index][bits...]
                let mut data = Vec::<u8, MAX_DATA_SIZE>::new();
                data.push(*index).map_err(|_| FrameError::PayloadTooLarge)?;
                data.extend_from_slice(bits)
                    .map_err(|_| FrameError::PayloadTooLarge)?;
                Frame::new(CMD_ROW, &data)
            }
            Command::Refresh => Ok(Frame::empty(CMD_REFRESH)),
        }
    }

    /// Parse a command from a received frame
    pub fn from_frame(frame: &Frame, geometry: &Geometry) -> Result<Self, FrameError> {
        match frame.cmd {
            CMD_ROW => {
                let (&index, bits) = frame
                    .data
                    .split_first()
                    .ok_or(FrameError::InvalidPayload)?;
                if bits.len() != geometry.row_bytes() || !geometry.contains_row(index) {
                    return Err(FrameError::InvalidPayload);
                }
                let bits = Vec::from_slice(bits).map_err(|_| FrameError::PayloadTooLarge)?;
                Ok(Command::Row { index, bits })
            }
            CMD_REFRESH => {
                if !frame.data.is_empty() {
                    return Err(FrameError::InvalidPayload);
                }
                Ok(Command::Refresh)
            }
            _ => Err(FrameError::UnknownCommand),
        }
    }
}

/// Level of pixel `x` in a packed row (false past the end)
pub fn pixel_level(bits: &[u8], x: usize) -> bool {
    bits.get(x / 8)
        .map_or(false, |byte| byte & (0x80 >> (x % 8)) != 0)
}

/// Reply byte sent by the device after each complete or broken frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reply {
    /// Frame accepted and applied
    Ack,
    /// Frame rejected, resend it
    Nak,
}

impl Reply {
    /// Parse a reply from its wire byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            ACK => Some(Reply::Ack),
            NAK => Some(Reply::Nak),
            _ => None,
        }
    }

    /// Convert to wire byte
    pub fn to_byte(self) -> u8 {
        match self {
            Reply::Ack => ACK,
            Reply::Nak => NAK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tiny() -> Geometry {
        Geometry::new(8, 1).unwrap()
    }

    #[test]
    fn test_refresh_frame() {
        let frame = Command::Refresh.to_frame().unwrap();
        assert_eq!(frame.cmd, CMD_REFRESH);
        assert!(frame.data.is_empty());
    }

    #[test]
    fn test_row_packing_msb_first() {
        let levels = [true, false, false, false, false, false, false, true];
        let cmd = Command::row(0, levels, &tiny()).unwrap();
        match cmd {
            Command::Row { index, bits } => {
                assert_eq!(index, 0);
                assert_eq!(&bits[..], &[0b1000_0001]);
            }
            Command::Refresh => panic!("expected row"),
        }
    }

    #[test]
    fn test_row_frame_layout() {
        let cmd = Command::row(0, [false; 8], &tiny()).unwrap();
        let frame = cmd.to_frame().unwrap();
        assert_eq!(frame.cmd, CMD_ROW);
        assert_eq!(&frame.data[..], &[0, 0]);
        assert_eq!(frame.len_field(), 3);
    }

    #[test]
    fn test_row_length_must_match_width() {
        assert_eq!(
            Command::row(0, [true; 7], &tiny()),
            Err(FrameError::InvalidPayload)
        );
        assert_eq!(
            Command::row(0, [true; 9], &tiny()),
            Err(FrameError::InvalidPayload)
        );
    }

    #[test]
    fn test_row_index_out_of_range() {
        assert_eq!(
            Command::row(1, [true; 8], &tiny()),
            Err(FrameError::InvalidPayload)
        );
        let frame = Frame::new(CMD_ROW, &[64; 17]).unwrap();
        assert_eq!(
            Command::from_frame(&frame, &Geometry::DEFAULT),
            Err(FrameError::InvalidPayload)
        );
    }

    #[test]
    fn test_row_without_index() {
        let frame = Frame::empty(CMD_ROW);
        assert_eq!(
            Command::from_frame(&frame, &tiny()),
            Err(FrameError::InvalidPayload)
        );
    }

    #[test]
    fn test_refresh_with_data_rejected() {
        let frame = Frame::new(CMD_REFRESH, &[0]).unwrap();
        assert_eq!(
            Command::from_frame(&frame, &tiny()),
            Err(FrameError::InvalidPayload)
        );
    }

    #[test]
    fn test_pixel_level() {
        let bits = [0b0100_0000, 0b0000_0001];
        assert!(!pixel_level(&bits, 0));
        assert!(pixel_level(&bits, 1));
        assert!(pixel_level(&bits, 15));
        assert!(!pixel_level(&bits, 16));
    }

    #[test]
    fn test_reply_bytes() {
        assert_eq!(Reply::Ack.to_byte(), 0x06);
        assert_eq!(Reply::Nak.to_byte(), 0x15);
        assert_eq!(Reply::from_byte(0x06), Some(Reply::Ack));
        assert_eq!(Reply::from_byte(0x15), Some(Reply::Nak));
        assert_eq!(Reply::from_byte(0x00), None);
    }

    proptest! {
        #[test]
        fn prop_row_levels_survive_framing(
            index in 0u8..64,
            levels in proptest::collection::vec(any::<bool>(), 128),
        ) {
            let geometry = Geometry::DEFAULT;
            let cmd = Command::row(index, levels.iter().copied(), &geometry).unwrap();
            let frame = cmd.to_frame().unwrap();
            let parsed = Command::from_frame(&frame, &geometry).unwrap();

            match parsed {
                Command::Row { index: got, bits } => {
                    prop_assert_eq!(got, index);
                    for (x, &level) in levels.iter().enumerate() {
                        prop_assert_eq!(pixel_level(&bits, x), level);
                    }
                }
                Command::Refresh => prop_assert!(false, "expected row"),
            }
        }
    }

    #[test]
    fn test_all_on_and_all_off_rows() {
        let geometry = Geometry::DEFAULT;
        for level in [true, false] {
            let cmd = Command::row(5, core::iter::repeat(level).take(128), &geometry).unwrap();
            let parsed = Command::from_frame(&cmd.to_frame().unwrap(), &geometry).unwrap();
            match parsed {
                Command::Row { bits, .. } => {
                    let expected = if level { 0xFF } else { 0x00 };
                    assert!(bits.iter().all(|&b| b == expected));
                    assert_eq!(bits.len(), 16);
                }
                Command::Refresh => panic!("expected row"),
            }
        }
    }
}
