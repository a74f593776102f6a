//! DER INTEGER contents codec
//!
//! DER stores an INTEGER as its minimal big-endian two's-complement
//! representation. [`Asn1Integer`] stores sign and magnitude separately.
//! This module converts between the two:
//!
//! | value | magnitude    | DER contents  |
//! |-------|--------------|---------------|
//! | 0     | `[]`         | `00`          |
//! | 127   | `7f`         | `7f`          |
//! | 128   | `80`         | `00 80`       |
//! | -128  | `80`         | `80`          |
//! | -129  | `81`         | `ff 7f`       |
//! | -256  | `01 00`      | `ff 00`       |
//!
//! Only the contents octets are handled here; tag and length are the job of
//! the builder and reader.

use super::Asn1Integer;
use crate::error::{Asn1Error, Asn1Result};

/// Longest INTEGER contents the encoder produces.
pub const MAX_CONTENT_LEN: usize = i32::MAX as usize;

/// Longest INTEGER contents the decoder accepts.
pub const MAX_DECODE_LEN: usize = MAX_CONTENT_LEN / 2;

/// Negates a big-endian two's-complement value in place.
///
/// Applied to a magnitude this yields the two's-complement encoding of its
/// negation, and applied to a negative encoding it yields the magnitude.
pub fn negate_twos_complement(buf: &mut [u8]) {
    let mut borrow = 0u8;
    for byte in buf.iter_mut().rev() {
        let t = *byte;
        *byte = 0u8.wrapping_sub(borrow).wrapping_sub(t);
        borrow |= u8::from(t != 0);
    }
}

fn is_all_zeros(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == 0)
}

/// Checks that `contents` is a minimal DER INTEGER encoding
///
/// # Returns
/// `Some(is_negative)` if the encoding is valid, `None` if it is empty or
/// its first nine bits are all equal (a redundant leading byte).
pub fn is_valid_asn1_integer(contents: &[u8]) -> Option<bool> {
    let (&first, rest) = contents.split_first()?;
    let negative = first & 0x80 != 0;
    if let Some(&second) = rest.first() {
        if (first == 0x00 && second & 0x80 == 0) || (first == 0xff && second & 0x80 != 0) {
            return None;
        }
    }
    Some(negative)
}

/// Checks that `contents` is a minimal, non-negative DER INTEGER encoding
pub fn is_unsigned_asn1_integer(contents: &[u8]) -> bool {
    is_valid_asn1_integer(contents) == Some(false)
}

/// What the encoder is going to write: an optional `0x00` pad byte followed
/// by the trimmed magnitude, negated as a whole if `negative`.
struct EncodePlan<'a> {
    body: &'a [u8],
    pad: bool,
    negative: bool,
}

impl<'a> EncodePlan<'a> {
    fn new(value: &'a Asn1Integer) -> Asn1Result<Self> {
        // Tolerate magnitudes built with leading zeros.
        let magnitude = value.magnitude();
        let start = magnitude.iter().position(|&b| b != 0).unwrap_or(magnitude.len());
        let body = &magnitude[start..];

        let (pad, negative) = match body.split_first() {
            // Zero is a single 0x00 byte and is never negative.
            None => (true, false),
            // 0x80..01 through 0xff..ff negate to 0x7f..ff through 0x00..01
            // and need an extra byte to stay negative; 0x80..00 does not.
            Some((&msb, rest)) if value.is_negative() => (msb > 0x80 || (msb == 0x80 && !is_all_zeros(rest)), true),
            Some((&msb, _)) => (msb & 0x80 != 0, false),
        };

        if body.len() > MAX_CONTENT_LEN - usize::from(pad) {
            return Err(Asn1Error::Overflow("INTEGER encoding is too long"));
        }

        Ok(Self { body, pad, negative })
    }

    fn len(&self) -> usize {
        usize::from(self.pad) + self.body.len()
    }
}

/// Length of the DER contents [`encode_der_integer`] would produce
pub fn encoded_len(value: &Asn1Integer) -> Asn1Result<usize> {
    Ok(EncodePlan::new(value)?.len())
}

/// Encode `value` into the front of `out`
///
/// # Returns
/// The number of bytes written.
///
/// # Errors
/// Returns `Overflow` if the encoding is too long or `out` is too small.
pub fn encode_der_integer_into(value: &Asn1Integer, out: &mut [u8]) -> Asn1Result<usize> {
    let plan = EncodePlan::new(value)?;
    let len = plan.len();
    let Some(out) = out.get_mut(..len) else {
        return Err(Asn1Error::Overflow("output buffer is too small for INTEGER"));
    };

    let pad = usize::from(plan.pad);
    if plan.pad {
        out[0] = 0x00;
    }
    out[pad..].copy_from_slice(plan.body);

    if plan.negative {
        negate_twos_complement(out);
        debug_assert!(out[0] >= 0x80);
    } else {
        debug_assert!(out[0] < 0x80);
    }
    Ok(len)
}

/// Encode `value` as minimal two's-complement DER INTEGER contents
///
/// # Examples
/// ```rust
/// use derkit_asn1::integer::{encode_der_integer, Asn1Integer};
///
/// assert_eq!(encode_der_integer(&Asn1Integer::from_i64(-129)).unwrap(), vec![0xff, 0x7f]);
/// assert_eq!(encode_der_integer(&Asn1Integer::from_u64(128)).unwrap(), vec![0x00, 0x80]);
/// ```
pub fn encode_der_integer(value: &Asn1Integer) -> Asn1Result<Vec<u8>> {
    let plan = EncodePlan::new(value)?;
    let mut out = vec![0u8; plan.len()];
    encode_der_integer_into(value, &mut out)?;
    Ok(out)
}

/// Decode `len` bytes of DER INTEGER contents from the front of `input`
///
/// On success `input` is advanced past the consumed bytes. On failure it is
/// left untouched and nothing is returned.
///
/// # Errors
/// - `TooLong` if `len` exceeds [`MAX_DECODE_LEN`]
/// - `MalformedDer` if `input` holds fewer than `len` bytes
/// - `InvalidInteger` if the contents are empty or not minimal
pub fn decode_der_integer(input: &mut &[u8], len: usize) -> Asn1Result<Asn1Integer> {
    if len > MAX_DECODE_LEN {
        log::trace!("rejecting {len}-byte INTEGER");
        return Err(Asn1Error::TooLong(len));
    }
    let Some(contents) = input.get(..len) else {
        return Err(Asn1Error::MalformedDer(format!(
            "INTEGER needs {} bytes, have {}",
            len,
            input.len()
        )));
    };
    let Some(negative) = is_valid_asn1_integer(contents) else {
        log::trace!("rejecting non-minimal INTEGER contents of {len} bytes");
        return Err(Asn1Error::InvalidInteger);
    };

    let body = match contents.split_first() {
        // 0xff00..01 through 0xff7f..ff negate to 0x00ff..ff through
        // 0x0080..01, so the leading byte goes. 0xff00..00 keeps it.
        Some((&0xff, rest)) if negative && !is_all_zeros(rest) => rest,
        Some((&0x00, rest)) if !negative => rest,
        _ => contents,
    };

    let mut magnitude = body.to_vec();
    if negative {
        negate_twos_complement(&mut magnitude);
    }

    debug_assert!(magnitude.first() != Some(&0));
    debug_assert!(!negative || !magnitude.is_empty());

    *input = &input[len..];
    Ok(Asn1Integer::from_parts(magnitude, negative))
}

/// Decode a complete DER INTEGER contents slice
pub fn decode_der_integer_contents(contents: &[u8]) -> Asn1Result<Asn1Integer> {
    let mut input = contents;
    decode_der_integer(&mut input, contents.len())
}
