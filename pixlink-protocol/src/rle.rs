//! Run-length codec for two-level pixel streams
//!
//! The compressed stream is a sequence of single-byte counts. Counts belong
//! to alternating levels, starting with the "off" level (leading byte 0), so
//! no value bytes are ever sent:
//!
//! ```text
//! input records:  00 00 00 FF FF 00
//! counts:         03 02 01 FF
//!                 │  │  │  └─ end of stream
//!                 │  │  └──── 1 × off
//!                 │  └─────── 2 × on
//!                 └────────── 3 × off
//! ```
//!
//! Input is grouped into fixed-size records (one RGB pixel by default) and
//! only the first byte of each record takes part in run detection.
//!
//! A count byte holds at most 254 because 255 is the terminator. A run that
//! reaches 255 is flushed as 254, followed by a zero-length run of the other
//! level so the alternation stays in step, and then continues with count 1.

/// End-of-stream marker
pub const RLE_SENTINEL: u8 = 255;

/// Longest run a single count can carry
pub const MAX_RUN: u8 = 254;

/// Record size used for raw RGB images
pub const PIXEL_RECORD_LEN: usize = 3;

/// Run-length codec errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RleError {
    /// A third distinct leading byte appeared; counts alone cannot tell
    /// which level it is
    NotBilevel {
        /// Level the encoder had already paired with 0
        on: u8,
        /// Leading byte that did not match either level
        found: u8,
    },
    /// Record size of zero
    InvalidRecordLen,
    /// Stream ended without the terminator
    MissingSentinel,
    /// Bytes followed the terminator
    TrailingData,
}

/// One decoded run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Run {
    /// Whether this run is of the "on" level
    pub lit: bool,
    /// Number of records in the run (may be zero)
    pub count: u8,
}

/// Streaming run-length encoder
///
/// Counts are handed to an `emit` callback as soon as they are final, so
/// the encoder works without an output buffer.
#[derive(Debug, Clone)]
pub struct RunLengthEncoder {
    current: u8,
    on: Option<u8>,
    count: u8,
}

impl Default for RunLengthEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RunLengthEncoder {
    pub fn new() -> Self {
        Self {
            current: 0,
            on: None,
            count: 0,
        }
    }

    /// Leading byte of the "on" level, once one has been seen
    pub fn on_value(&self) -> Option<u8> {
        self.on
    }

    /// Consume one record
    ///
    /// Empty records are ignored.
    pub fn push<F>(&mut self, record: &[u8], mut emit: F) -> Result<(), RleError>
    where
        F: FnMut(u8),
    {
        let Some(&lead) = record.first() else {
            return Ok(());
        };

        if lead == self.current {
            self.count += 1;
        } else {
            if lead != 0 {
                match self.on {
                    None => self.on = Some(lead),
                    Some(on) if on != lead => {
                        return Err(RleError::NotBilevel { on, found: lead })
                    }
                    Some(_) => {}
                }
            }
            emit(self.count);
            self.current = lead;
            self.count = 1;
        }

        if self.count == RLE_SENTINEL {
            emit(MAX_RUN);
            emit(0);
            self.count = 1;
        }
        Ok(())
    }

    /// Emit the final run and the terminator
    pub fn finish<F>(self, mut emit: F)
    where
        F: FnMut(u8),
    {
        emit(self.count);
        emit(RLE_SENTINEL);
    }
}

/// Encode `input`, split into `record_len`-byte records, in one call
///
/// A trailing partial record counts as a record.
pub fn encode<F>(input: &[u8], record_len: usize, mut emit: F) -> Result<(), RleError>
where
    F: FnMut(u8),
{
    if record_len == 0 {
        return Err(RleError::InvalidRecordLen);
    }
    let mut encoder = RunLengthEncoder::new();
    for record in input.chunks(record_len) {
        encoder.push(record, &mut emit)?;
    }
    encoder.finish(emit);
    Ok(())
}

/// Decoded item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Run(Run),
    End,
}

/// Streaming run-length decoder
#[derive(Debug, Clone, Default)]
pub struct RunLengthDecoder {
    lit: bool,
    done: bool,
}

impl RunLengthDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the terminator has been read
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Consume one count byte
    pub fn feed(&mut self, byte: u8) -> Result<Decoded, RleError> {
        if self.done {
            return Err(RleError::TrailingData);
        }
        if byte == RLE_SENTINEL {
            self.done = true;
            return Ok(Decoded::End);
        }
        let run = Run {
            lit: self.lit,
            count: byte,
        };
        self.lit = !self.lit;
        Ok(Decoded::Run(run))
    }
}

/// Decode a complete stream, handing every run (including zero-length
/// ones) to `emit`
pub fn decode<F>(input: &[u8], mut emit: F) -> Result<(), RleError>
where
    F: FnMut(Run),
{
    let mut decoder = RunLengthDecoder::new();
    for &byte in input {
        if let Decoded::Run(run) = decoder.feed(byte)? {
            emit(run);
        }
    }
    if decoder.is_done() {
        Ok(())
    } else {
        Err(RleError::MissingSentinel)
    }
}
