//! Run-length coding over byte streams
//!
//! Thin std wrappers around the protocol crate's streaming codec, for use
//! as filters in a shell pipeline.

use std::io::{self, BufReader, BufWriter, Read, Write};

use pixlink_protocol::rle::{Decoded, RunLengthDecoder, RunLengthEncoder};
use pixlink_protocol::RleError;
use tracing::debug;

use crate::error::Result;

/// Compress `reader` into a count stream on `writer`
///
/// Returns the number of count bytes written, terminator included.
pub fn encode_stream<R: Read, W: Write>(reader: R, writer: W, record_len: usize) -> Result<u64> {
    if record_len == 0 {
        return Err(RleError::InvalidRecordLen.into());
    }
    let mut reader = BufReader::new(reader);
    let mut writer = BufWriter::new(writer);
    let mut encoder = RunLengthEncoder::new();
    let mut record = vec![0u8; record_len];
    let mut counts = Vec::new();
    let mut written = 0u64;
    let mut records = 0u64;

    loop {
        let filled = read_record(&mut reader, &mut record)?;
        if filled == 0 {
            break;
        }
        encoder.push(&record[..filled], |count| counts.push(count))?;
        records += 1;
        written += counts.len() as u64;
        writer.write_all(&counts)?;
        counts.clear();
        if filled < record_len {
            break;
        }
    }

    encoder.finish(|count| counts.push(count));
    written += counts.len() as u64;
    writer.write_all(&counts)?;
    writer.flush()?;
    debug!(records, written, "encoded");
    Ok(written)
}

/// Expand a count stream back into records
///
/// Off records are all zero bytes; on records repeat `on_value`. Returns
/// the number of records written.
pub fn decode_stream<R: Read, W: Write>(
    reader: R,
    writer: W,
    record_len: usize,
    on_value: u8,
) -> Result<u64> {
    if record_len == 0 {
        return Err(RleError::InvalidRecordLen.into());
    }
    let reader = BufReader::new(reader);
    let mut writer = BufWriter::new(writer);
    let mut decoder = RunLengthDecoder::new();
    let off = vec![0u8; record_len];
    let on = vec![on_value; record_len];
    let mut records = 0u64;

    for byte in reader.bytes() {
        if let Decoded::Run(run) = decoder.feed(byte?)? {
            let record = if run.lit { &on } else { &off };
            for _ in 0..run.count {
                writer.write_all(record)?;
            }
            records += run.count as u64;
        }
    }
    if !decoder.is_done() {
        return Err(RleError::MissingSentinel.into());
    }
    writer.flush()?;
    debug!(records, "decoded");
    Ok(records)
}

/// Fill `record` as far as the input allows
fn read_record<R: Read>(reader: &mut R, record: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < record.len() {
        match reader.read(&mut record[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use pixlink_protocol::rle::{PIXEL_RECORD_LEN, RLE_SENTINEL};
    use proptest::prelude::*;

    fn encode(input: &[u8], record_len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        encode_stream(input, &mut out, record_len)?;
        Ok(out)
    }

    #[test]
    fn test_encode_pixels() {
        let mut image = vec![0u8; 3 * 4];
        image.extend_from_slice(&[0xFF; 3 * 2]);
        assert_eq!(encode(&image, PIXEL_RECORD_LEN).unwrap(), [4, 2, RLE_SENTINEL]);
    }

    #[test]
    fn test_encode_partial_tail() {
        assert_eq!(encode(&[0, 0, 0, 0xFF], 3).unwrap(), [1, 1, RLE_SENTINEL]);
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode(&[], 3).unwrap(), [0, RLE_SENTINEL]);
    }

    #[test]
    fn test_encode_three_levels_fails() {
        let err = encode(&[0, 0x10, 0x20], 1).unwrap_err();
        assert!(matches!(
            err,
            Error::Rle(RleError::NotBilevel { on: 0x10, found: 0x20 })
        ));
    }

    #[test]
    fn test_decode_expands_records() {
        let mut out = Vec::new();
        let n = decode_stream(&[1u8, 2, RLE_SENTINEL][..], &mut out, 3, 0xFF).unwrap();
        assert_eq!(n, 3);
        assert_eq!(out, [0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_decode_needs_sentinel() {
        let err = decode_stream(&[4u8, 4][..], io::sink(), 1, 1).unwrap_err();
        assert!(matches!(err, Error::Rle(RleError::MissingSentinel)));
    }

    #[test]
    fn test_zero_record_len() {
        assert!(matches!(
            encode(&[0], 0),
            Err(Error::Rle(RleError::InvalidRecordLen))
        ));
    }

    proptest! {
        #[test]
        fn prop_stream_roundtrip(levels in proptest::collection::vec(any::<bool>(), 0..1500)) {
            let image: Vec<u8> = levels
                .iter()
                .flat_map(|&lit| [if lit { 0xFF } else { 0 }; 3])
                .collect();
            let counts = encode(&image, 3).unwrap();
            let mut back = Vec::new();
            decode_stream(&counts[..], &mut back, 3, 0xFF).unwrap();
            prop_assert_eq!(back, image);
        }
    }
}
