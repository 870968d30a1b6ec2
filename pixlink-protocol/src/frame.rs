//! Frame encoding and the device-side receive state machine.
//!
//! Frame format:
//! - STX (1 byte): 0x02 start marker
//! - LEN (1 byte): number of bytes in CMD + CMD-DATA (1-250)
//! - CMD (1 byte): command identifier
//! - CMD-DATA (0-249 bytes): command-specific data
//! - CHECKSUM (1 byte): XOR of STX, LEN, CMD, and all CMD-DATA bytes
//! - ETX (1 byte): 0x03 end marker
//!
//! The receiver buffers STX and LEN along with the body, so a complete body
//! occupies `HEADER_LEN + LEN` bytes and that whole span is checksummed.

use heapless::Vec;

use crate::checksum::checksum;
use crate::geometry::Geometry;
use crate::messages::Command;

/// Frame start marker
pub const STX: u8 = 0x02;

/// Frame end marker
pub const ETX: u8 = 0x03;

/// STX + LEN, buffered ahead of the body
pub const HEADER_LEN: usize = 2;

/// Largest LEN the receiver will accept
pub const MAX_LEN: u8 = 250;

/// Maximum CMD-DATA size (LEN minus the command byte)
pub const MAX_DATA_SIZE: usize = MAX_LEN as usize - 1;

/// Receive buffer capacity (STX + LEN + CMD + MAX_DATA)
pub const MAX_BODY_SIZE: usize = HEADER_LEN + MAX_LEN as usize;

/// Maximum complete frame size (body + CHECKSUM + ETX)
pub const MAX_FRAME_SIZE: usize = MAX_BODY_SIZE + 2;

/// Errors that can occur while building, encoding, or receiving a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Byte received while idle was not STX
    InvalidStart,
    /// Declared LEN is zero or larger than the receive buffer allows
    LengthOutOfRange,
    /// Checksum mismatch
    InvalidChecksum,
    /// Byte after the checksum was not ETX
    InvalidTerminator,
    /// Well-framed body with an unrecognized command byte
    UnknownCommand,
    /// Command data does not match the command's layout or the geometry
    InvalidPayload,
    /// Command data exceeds maximum allowed size
    PayloadTooLarge,
    /// Buffer too small for encoding
    BufferTooSmall,
    /// Geometry cannot be carried by row frames
    InvalidGeometry,
}

/// A parsed or constructed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command identifier
    pub cmd: u8,
    /// Command-specific data
    pub data: Vec<u8, MAX_DATA_SIZE>,
}

impl Frame {
    /// Create a new frame with the given command and data
    pub fn new(cmd: u8, data: &[u8]) -> Result<Self, FrameError> {
        let data = Vec::from_slice(data).map_err(|_| FrameError::PayloadTooLarge)?;
        Ok(Self { cmd, data })
    }

    /// Create a frame with no command data
    pub fn empty(cmd: u8) -> Self {
        Self {
            cmd,
            data: Vec::new(),
        }
    }

    /// Value of the LEN field for this frame
    pub fn len_field(&self) -> u8 {
        // data is bounded by MAX_DATA_SIZE, so this never exceeds MAX_LEN
        1 + self.data.len() as u8
    }

    /// Number of bytes this frame occupies on the wire
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.len_field() as usize + 2
    }

    /// Encode this frame into a byte buffer
    ///
    /// Returns the number of bytes written
    pub fn encode(&self, buffer: &mut [u8]) -> Result<usize, FrameError> {
        let frame_len = self.encoded_len();
        if buffer.len() < frame_len {
            return Err(FrameError::BufferTooSmall);
        }

        let body_len = HEADER_LEN + self.len_field() as usize;
        buffer[0] = STX;
        buffer[1] = self.len_field();
        buffer[2] = self.cmd;
        buffer[3..body_len].copy_from_slice(&self.data);
        buffer[body_len] = checksum(&buffer[..body_len]);
        buffer[body_len + 1] = ETX;

        Ok(frame_len)
    }

    /// Encode this frame into a heapless Vec
    pub fn encode_to_vec(&self) -> Result<Vec<u8, MAX_FRAME_SIZE>, FrameError> {
        let mut buffer = [0u8; MAX_FRAME_SIZE];
        let len = self.encode(&mut buffer)?;
        Vec::from_slice(&buffer[..len]).map_err(|_| FrameError::BufferTooSmall)
    }

    /// Split a received body (CMD + CMD-DATA) back into a frame
    fn from_body(body: &[u8]) -> Result<Self, FrameError> {
        match body.split_first() {
            Some((&cmd, data)) => Self::new(cmd, data),
            None => Err(FrameError::LengthOutOfRange),
        }
    }
}

/// Outcome of feeding one byte to the receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// Frame still in progress (or nothing started yet)
    Pending,
    /// A complete, valid frame was received
    Accepted(Command),
    /// The byte broke the frame; the receiver is idle again
    Rejected(FrameError),
}

impl Feed {
    /// True for `Accepted` and `Rejected`, which both call for a reply byte
    pub fn is_complete(&self) -> bool {
        !matches!(self, Feed::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxState {
    /// Waiting for STX
    Idle,
    /// Got STX, next byte is LEN
    LengthNext,
    /// Buffering CMD and CMD-DATA
    DataNext,
    /// Body complete, next byte is CHECKSUM
    ChecksumNext,
    /// Checksum matched, next byte must be ETX
    EtxNext,
}

/// Byte-at-a-time receive state machine
///
/// Owns the receive buffer. Every rejection or completion returns the
/// machine to idle with an empty buffer, so a corrupted frame never leaks
/// into the next one.
#[derive(Debug, Clone)]
pub struct FrameReceiver {
    geometry: Geometry,
    state: RxState,
    buffer: Vec<u8, MAX_BODY_SIZE>,
    declared_len: u8,
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new(Geometry::DEFAULT)
    }
}

impl FrameReceiver {
    /// Create a receiver for a display of the given geometry
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            state: RxState::Idle,
            buffer: Vec::new(),
            declared_len: 0,
        }
    }

    /// Drop any partial frame and wait for the next STX
    pub fn reset(&mut self) {
        self.state = RxState::Idle;
        self.buffer.clear();
        self.declared_len = 0;
    }

    /// True when no frame is in progress
    pub fn is_idle(&self) -> bool {
        self.state == RxState::Idle && self.buffer.is_empty()
    }

    /// Number of bytes buffered for the frame in progress
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Feed a single byte to the receiver
    pub fn feed(&mut self, byte: u8) -> Feed {
        match self.state {
            RxState::Idle => {
                if byte != STX {
                    return Feed::Rejected(FrameError::InvalidStart);
                }
                self.buffer.clear();
                if let Err(e) = self.push(byte) {
                    return self.reject(e);
                }
                self.advance(RxState::LengthNext)
            }
            RxState::LengthNext => {
                if !self.is_valid_len(byte) {
                    return self.reject(FrameError::LengthOutOfRange);
                }
                self.declared_len = byte;
                if let Err(e) = self.push(byte) {
                    return self.reject(e);
                }
                self.advance(RxState::DataNext)
            }
            RxState::DataNext => {
                if let Err(e) = self.push(byte) {
                    return self.reject(e);
                }
                if self.buffer.len() == HEADER_LEN + self.declared_len as usize {
                    self.state = RxState::ChecksumNext;
                }
                Feed::Pending
            }
            RxState::ChecksumNext => {
                if byte != checksum(&self.buffer) {
                    return self.reject(FrameError::InvalidChecksum);
                }
                self.advance(RxState::EtxNext)
            }
            RxState::EtxNext => {
                let outcome = if byte == ETX {
                    match self.parse() {
                        Ok(command) => Feed::Accepted(command),
                        Err(e) => Feed::Rejected(e),
                    }
                } else {
                    Feed::Rejected(FrameError::InvalidTerminator)
                };
                self.reset();
                outcome
            }
        }
    }

    /// Feed multiple bytes to the receiver
    ///
    /// Returns the first completed outcome, if any.
    /// Remaining bytes after a completed frame are not consumed.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Feed {
        for &byte in bytes {
            let outcome = self.feed(byte);
            if outcome.is_complete() {
                return outcome;
            }
        }
        Feed::Pending
    }

    /// Only a bare command or a full row for this geometry can be valid
    fn is_valid_len(&self, len: u8) -> bool {
        len != 0
            && len <= MAX_LEN
            && (len == 1 || len as usize == self.geometry.row_bytes() + 2)
    }

    fn push(&mut self, byte: u8) -> Result<(), FrameError> {
        self.buffer
            .push(byte)
            .map_err(|_| FrameError::LengthOutOfRange)
    }

    fn advance(&mut self, next: RxState) -> Feed {
        self.state = next;
        Feed::Pending
    }

    fn reject(&mut self, error: FrameError) -> Feed {
        self.reset();
        Feed::Rejected(error)
    }

    fn parse(&self) -> Result<Command, FrameError> {
        let frame = Frame::from_body(&self.buffer[HEADER_LEN..])?;
        Command::from_frame(&frame, &self.geometry)
    }
}
