//! Big-endian base-128 integers
//!
//! Used for high tag number form (tag numbers >= 31) and for OBJECT
//! IDENTIFIER arcs. Each byte carries seven bits of the value, most
//! significant group first; every byte except the last has bit 7 set.

use crate::error::{Asn1Error, Asn1Result};

/// Number of bytes [`encode_base128`] produces for `value`.
pub fn encoded_len(value: u64) -> usize {
    let bits = u64::BITS - value.leading_zeros();
    // Zero still takes one byte.
    (bits as usize).div_ceil(7).max(1)
}

/// Encode `value` as a minimal base-128 sequence
///
/// # Examples
/// ```rust
/// use derkit_asn1::base128::encode_base128;
///
/// assert_eq!(encode_base128(0), vec![0x00]);
/// assert_eq!(encode_base128(113549), vec![0x86, 0xf7, 0x0d]);
/// ```
pub fn encode_base128(value: u64) -> Vec<u8> {
    let len = encoded_len(value);
    let mut out = Vec::with_capacity(len);
    write_base128(value, len, |byte| out.push(byte));
    out
}

/// Emits the `len` groups of `value`, most significant first.
pub(crate) fn write_base128(value: u64, len: usize, mut emit: impl FnMut(u8)) {
    for i in (0..len).rev() {
        let mut byte = ((value >> (7 * i)) & 0x7f) as u8;
        if i != 0 {
            byte |= 0x80;
        }
        emit(byte);
    }
}

/// Decode a base-128 integer from the front of `data`
///
/// # Returns
/// Returns `Ok((value, bytes_consumed))`.
///
/// # Errors
/// Returns `MalformedDer` if the encoding is truncated, has a redundant
/// leading `0x80` group, or does not fit in 64 bits.
pub fn decode_base128(data: &[u8]) -> Asn1Result<(u64, usize)> {
    let mut value = 0u64;
    for (pos, &byte) in data.iter().enumerate() {
        if value >> (64 - 7) != 0 {
            return Err(Asn1Error::MalformedDer("base-128 value exceeds 64 bits".to_string()));
        }
        if value == 0 && byte == 0x80 {
            return Err(Asn1Error::MalformedDer("base-128 value is not minimal".to_string()));
        }
        value = (value << 7) | u64::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return Ok((value, pos + 1));
        }
    }
    Err(Asn1Error::MalformedDer("truncated base-128 value".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_zero() {
        assert_eq!(encode_base128(0), vec![0x00]);
        assert_eq!(encoded_len(0), 1);
    }

    #[test]
    fn test_encode_group_boundaries() {
        assert_eq!(encode_base128(0x7f), vec![0x7f]);
        assert_eq!(encode_base128(0x80), vec![0x81, 0x00]);
        assert_eq!(encode_base128(0x3fff), vec![0xff, 0x7f]);
        assert_eq!(encode_base128(0x4000), vec![0x81, 0x80, 0x00]);
        assert_eq!(encode_base128(840), vec![0x86, 0x48]);
    }

    #[test]
    fn test_encode_max() {
        let encoded = encode_base128(u64::MAX);
        assert_eq!(encoded.len(), 10);
        assert_eq!(encoded[0], 0x81);
        assert!(encoded[1..9].iter().all(|&b| b == 0xff));
        assert_eq!(encoded[9], 0x7f);
    }

    #[test]
    fn test_decode() {
        assert_eq!(decode_base128(&[0x86, 0xf7, 0x0d, 0xff]).unwrap(), (113549, 3));
        assert_eq!(decode_base128(&[0x00]).unwrap(), (0, 1));
        assert_eq!(decode_base128(&encode_base128(u64::MAX)).unwrap(), (u64::MAX, 10));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        // Redundant leading group.
        assert!(decode_base128(&[0x80, 0x01]).is_err());
        // Missing final group.
        assert!(decode_base128(&[0x81]).is_err());
        assert!(decode_base128(&[]).is_err());
        // 71 bits.
        assert!(decode_base128(&[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f]).is_err());
    }
}
