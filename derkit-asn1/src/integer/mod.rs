//! Arbitrary-precision ASN.1 INTEGER values
//!
//! [`Asn1Integer`] keeps the sign and the big-endian magnitude apart, which
//! is how big-integer libraries hand values over. The [`codec`] module turns
//! it into DER's two's-complement form and back.
//!
//! # Usage Example
//!
//! ```rust
//! use derkit_asn1::integer::Asn1Integer;
//!
//! let value = Asn1Integer::from_i64(-129);
//! let der = value.to_der().unwrap();
//! assert_eq!(der, vec![0xff, 0x7f]);
//! assert_eq!(Asn1Integer::from_der(&der).unwrap(), value);
//! ```

#[cfg(feature = "bigint")]
mod bigint;
pub mod codec;

pub use codec::{
    decode_der_integer, decode_der_integer_contents, encode_der_integer, encode_der_integer_into,
    encoded_len, is_unsigned_asn1_integer, is_valid_asn1_integer, negate_twos_complement,
};

use crate::error::{Asn1Error, Asn1Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sign-magnitude INTEGER
///
/// Values built with [`Asn1Integer::new`] and the native-integer
/// constructors are normalized: the magnitude has no leading zero byte, zero
/// is the empty magnitude, and zero is never negative.
/// [`Asn1Integer::from_parts`] stores its input as-is; the encoder copes with
/// such values. Deserialized values are normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "RawAsn1Integer")]
pub struct Asn1Integer {
    #[serde(with = "serde_bytes")]
    magnitude: Vec<u8>,
    negative: bool,
}

/// Wire form of [`Asn1Integer`] before normalization
#[derive(Deserialize)]
struct RawAsn1Integer {
    #[serde(with = "serde_bytes")]
    magnitude: Vec<u8>,
    negative: bool,
}

impl From<RawAsn1Integer> for Asn1Integer {
    fn from(raw: RawAsn1Integer) -> Self {
        Asn1Integer::new(raw.magnitude, raw.negative)
    }
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

impl Asn1Integer {
    /// Create a normalized integer from a big-endian magnitude and a sign
    pub fn new(magnitude: impl AsRef<[u8]>, negative: bool) -> Self {
        let magnitude = trim_leading_zeros(magnitude.as_ref()).to_vec();
        let negative = negative && !magnitude.is_empty();
        Self { magnitude, negative }
    }

    /// Create an integer without normalizing the magnitude
    pub fn from_parts(magnitude: Vec<u8>, negative: bool) -> Self {
        Self { magnitude, negative }
    }

    /// Zero
    pub fn zero() -> Self {
        Self::default()
    }

    /// Create from an unsigned native integer
    pub fn from_u64(value: u64) -> Self {
        Self::new(value.to_be_bytes(), false)
    }

    /// Create from a signed native integer
    pub fn from_i64(value: i64) -> Self {
        Self::new(value.unsigned_abs().to_be_bytes(), value < 0)
    }

    /// Replace the value with `value`
    pub fn set_u64(&mut self, value: u64) {
        *self = Self::from_u64(value);
    }

    /// Replace the value with `value`
    pub fn set_i64(&mut self, value: i64) {
        *self = Self::from_i64(value);
    }

    /// Big-endian magnitude bytes
    pub fn magnitude(&self) -> &[u8] {
        &self.magnitude
    }

    /// Whether the sign flag is set
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Whether the magnitude is zero
    pub fn is_zero(&self) -> bool {
        self.magnitude.iter().all(|&b| b == 0)
    }

    /// Consume the integer and return `(magnitude, negative)`
    pub fn into_parts(self) -> (Vec<u8>, bool) {
        (self.magnitude, self.negative)
    }

    fn magnitude_u64(&self) -> Asn1Result<u64> {
        let bytes = trim_leading_zeros(&self.magnitude);
        if bytes.len() > size_of::<u64>() {
            return Err(Asn1Error::OutOfRange(format!(
                "{}-byte INTEGER does not fit in 64 bits",
                bytes.len()
            )));
        }
        Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
    }

    /// Convert to `u64`
    ///
    /// # Errors
    /// Returns `OutOfRange` for negative values and values above `u64::MAX`.
    pub fn to_u64(&self) -> Asn1Result<u64> {
        if self.negative && !self.is_zero() {
            return Err(Asn1Error::OutOfRange("negative INTEGER as u64".to_string()));
        }
        self.magnitude_u64()
    }

    /// Convert to `i64`
    ///
    /// # Errors
    /// Returns `OutOfRange` for values outside `i64::MIN..=i64::MAX`.
    pub fn to_i64(&self) -> Asn1Result<i64> {
        let magnitude = self.magnitude_u64()?;
        if self.negative {
            if magnitude > 1 << 63 {
                return Err(Asn1Error::OutOfRange("INTEGER below i64::MIN".to_string()));
            }
            // 2^63 wraps onto i64::MIN, which is exactly its negation.
            Ok((magnitude as i64).wrapping_neg())
        } else {
            i64::try_from(magnitude).map_err(|_| Asn1Error::OutOfRange("INTEGER above i64::MAX".to_string()))
        }
    }

    /// Encode as DER INTEGER contents
    pub fn to_der(&self) -> Asn1Result<Vec<u8>> {
        encode_der_integer(self)
    }

    /// Decode DER INTEGER contents
    pub fn from_der(contents: &[u8]) -> Asn1Result<Self> {
        decode_der_integer_contents(contents)
    }
}

impl From<u64> for Asn1Integer {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl From<i64> for Asn1Integer {
    fn from(value: i64) -> Self {
        Self::from_i64(value)
    }
}

impl TryFrom<&Asn1Integer> for u64 {
    type Error = Asn1Error;

    fn try_from(value: &Asn1Integer) -> Asn1Result<Self> {
        value.to_u64()
    }
}

impl TryFrom<&Asn1Integer> for i64 {
    type Error = Asn1Error;

    fn try_from(value: &Asn1Integer) -> Asn1Result<Self> {
        value.to_i64()
    }
}

impl Ord for Asn1Integer {
    /// Sign first, then magnitude length, then magnitude bytes; reversed when
    /// both are negative. Compares the stored bytes, so normalized values
    /// order numerically.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (negative, _) => {
                let ord = self
                    .magnitude
                    .len()
                    .cmp(&other.magnitude.len())
                    .then_with(|| self.magnitude.cmp(&other.magnitude));
                if negative { ord.reverse() } else { ord }
            }
        }
    }
}

impl PartialOrd for Asn1Integer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
