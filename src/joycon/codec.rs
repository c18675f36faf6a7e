//! Packed 12-bit value codec
//!
//! Calibration blobs and live stick samples pack two 12-bit values into
//! every three bytes:
//!
//! | Byte | Bits 7..4        | Bits 3..0        |
//! |------|------------------|------------------|
//! | 0    | first[7..4]      | first[3..0]      |
//! | 1    | second[3..0]     | first[11..8]     |
//! | 2    | second[11..8]    | second[7..4]     |

use thiserror::Error;

/// Largest value representable in 12 bits
pub const MAX_12BIT: u16 = 0x0FFF;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Invalid byte group length {len}: must be a multiple of 3")]
    InvalidFormat { len: usize },

    #[error("Cannot pack {count} values: need an even count of 12-bit values")]
    InvalidValues { count: usize },
}

/// Decode packed 12-bit pairs. `group.len()` must be a multiple of 3.
pub fn decode_triplets(group: &[u8]) -> Result<Vec<u16>, CodecError> {
    if group.len() % 3 != 0 {
        return Err(CodecError::InvalidFormat { len: group.len() });
    }

    let mut values = Vec::with_capacity(group.len() / 3 * 2);
    for chunk in group.chunks_exact(3) {
        let (first, second) = unpack(chunk[0], chunk[1], chunk[2]);
        values.push(first);
        values.push(second);
    }
    Ok(values)
}

/// Inverse of [`decode_triplets`]
pub fn encode_triplets(values: &[u16]) -> Result<Vec<u8>, CodecError> {
    if values.len() % 2 != 0 || values.iter().any(|v| *v > MAX_12BIT) {
        return Err(CodecError::InvalidValues { count: values.len() });
    }

    let mut bytes = Vec::with_capacity(values.len() / 2 * 3);
    for pair in values.chunks_exact(2) {
        let (first, second) = (pair[0], pair[1]);
        bytes.push((first & 0xFF) as u8);
        bytes.push((((first >> 8) & 0x0F) | ((second & 0x0F) << 4)) as u8);
        bytes.push((second >> 4) as u8);
    }
    Ok(bytes)
}

/// Decode one live stick sample into raw (x, y)
pub fn decode_stick_sample(sample: [u8; 3]) -> (u16, u16) {
    unpack(sample[0], sample[1], sample[2])
}

fn unpack(b0: u8, b1: u8, b2: u8) -> (u16, u16) {
    let first = (((b1 as u16) << 8) & 0x0F00) | b0 as u16;
    let second = ((b2 as u16) << 4) | ((b1 as u16) >> 4);
    (first, second)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_known_calibration_blob() {
        // max (0x5A0, 0x4C0), center (0x7D0, 0x800), min (0x5B0, 0x4E0)
        let blob = [0xA0, 0x05, 0x4C, 0xD0, 0x07, 0x80, 0xB0, 0x05, 0x4E];
        let values = decode_triplets(&blob).unwrap();
        assert_eq!(values, vec![0x5A0, 0x4C0, 0x7D0, 0x800, 0x5B0, 0x4E0]);
    }

    #[test]
    fn test_decode_empty_group() {
        assert_eq!(decode_triplets(&[]).unwrap(), Vec::<u16>::new());
    }

    #[test]
    fn test_stick_sample_center() {
        // 0x800 / 0x800 is the nominal center
        assert_eq!(decode_stick_sample([0x00, 0x08, 0x80]), (0x800, 0x800));
        assert_eq!(decode_stick_sample([0xFF, 0xFF, 0xFF]), (0xFFF, 0xFFF));
    }

    #[test]
    fn test_encode_rejects_out_of_range() {
        assert!(encode_triplets(&[0x1000, 0]).is_err());
        assert!(encode_triplets(&[1, 2, 3]).is_err());
    }

    proptest! {
        #[test]
        fn prop_calibration_blob_round_trips(blob in proptest::array::uniform9(any::<u8>())) {
            let values = decode_triplets(&blob).unwrap();
            prop_assert_eq!(values.len(), 6);
            prop_assert!(values.iter().all(|v| *v <= MAX_12BIT));
            prop_assert_eq!(encode_triplets(&values).unwrap(), blob.to_vec());
        }

        #[test]
        fn prop_non_multiple_of_three_is_invalid(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            prop_assume!(bytes.len() % 3 != 0);
            prop_assert_eq!(
                decode_triplets(&bytes),
                Err(CodecError::InvalidFormat { len: bytes.len() })
            );
        }
    }
}
