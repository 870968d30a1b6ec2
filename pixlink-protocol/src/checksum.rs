//! Frame checksum
//!
//! Both ends compute the checksum with this one function. A mismatch is
//! always treated as corruption on the wire.

/// XOR fold of `bytes`: the first byte, XORed with every byte after it.
///
/// An empty slice folds to 0.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, &byte| acc ^ byte)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_byte_is_itself() {
        assert_eq!(checksum(&[0x5A]), 0x5A);
    }

    #[test]
    fn test_empty() {
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn test_refresh_header() {
        // STX, LEN=1, REFRESH
        assert_eq!(checksum(&[0x02, 0x01, 0x01]), 0x02);
    }

    #[test]
    fn test_all_zero_row_header() {
        // STX, LEN=3, ROW, index 0, one data byte
        assert_eq!(checksum(&[0x02, 0x03, 0x00, 0x00, 0x00]), 0x01);
    }

    proptest! {
        #[test]
        fn prop_deterministic(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            prop_assert_eq!(checksum(&bytes), checksum(&bytes));
        }

        #[test]
        fn prop_single_byte_corruption_detected(
            bytes in proptest::collection::vec(any::<u8>(), 1..64),
            idx in any::<proptest::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let mut corrupted = bytes.clone();
            let i = idx.index(corrupted.len());
            corrupted[i] ^= flip;
            prop_assert_ne!(checksum(&bytes), checksum(&corrupted));
        }
    }
}
