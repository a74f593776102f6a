//! DER encoding types (Tag, Length)

use crate::base128;
use crate::error::{Asn1Error, Asn1Result};
use std::fmt;

/// Largest tag number an [`Asn1Tag`] can carry (29 bits).
pub const TAG_NUMBER_MAX: u32 = (1 << 29) - 1;

/// ASN.1 Tag Class
///
/// Stored in bits 8-7 of the identifier octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Asn1TagClass {
    /// Universal class (00)
    Universal = 0,
    /// Application class (01)
    Application = 1,
    /// Context-specific class (10)
    ContextSpecific = 2,
    /// Private class (11)
    Private = 3,
}

impl Asn1TagClass {
    /// Get tag class from bits 8-7 of an identifier octet
    pub fn from_bits(bits: u8) -> Self {
        match (bits >> 6) & 0x03 {
            0 => Asn1TagClass::Universal,
            1 => Asn1TagClass::Application,
            2 => Asn1TagClass::ContextSpecific,
            _ => Asn1TagClass::Private,
        }
    }

    /// Convert tag class to identifier octet bits
    pub fn to_bits(self) -> u8 {
        (self as u8) << 6
    }
}

/// ASN.1 Tag
///
/// A tag consists of:
/// - **Class**: Universal, Application, Context-specific, or Private
/// - **Constructed/Primitive**: Whether the contents are themselves TLVs
/// - **Tag Number**: 0-30 in low tag number form, up to 2^29 - 1 in high tag
///   number form
///
/// High tag number form:
/// ```text
/// First byte:      C C P 1 1 1 1 1
/// Following bytes: base-128 tag number
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Asn1Tag {
    class: Asn1TagClass,
    constructed: bool,
    number: u32,
}

impl Asn1Tag {
    pub const BOOLEAN: Self = Self::universal(false, 1);
    pub const INTEGER: Self = Self::universal(false, 2);
    pub const BIT_STRING: Self = Self::universal(false, 3);
    pub const OCTET_STRING: Self = Self::universal(false, 4);
    pub const NULL: Self = Self::universal(false, 5);
    pub const OID: Self = Self::universal(false, 6);
    pub const ENUMERATED: Self = Self::universal(false, 10);
    pub const UTF8_STRING: Self = Self::universal(false, 12);
    pub const SEQUENCE: Self = Self::universal(true, 16);
    pub const SET: Self = Self::universal(true, 17);
    pub const PRINTABLE_STRING: Self = Self::universal(false, 19);
    pub const IA5_STRING: Self = Self::universal(false, 22);
    pub const UTC_TIME: Self = Self::universal(false, 23);
    pub const GENERALIZED_TIME: Self = Self::universal(false, 24);

    /// Create a new tag
    pub const fn new(class: Asn1TagClass, constructed: bool, number: u32) -> Self {
        Self {
            class,
            constructed,
            number,
        }
    }

    /// Create a Universal class tag
    pub const fn universal(constructed: bool, number: u32) -> Self {
        Self::new(Asn1TagClass::Universal, constructed, number)
    }

    /// Create an Application class tag
    pub const fn application(constructed: bool, number: u32) -> Self {
        Self::new(Asn1TagClass::Application, constructed, number)
    }

    /// Create a Context-specific class tag
    pub const fn context_specific(constructed: bool, number: u32) -> Self {
        Self::new(Asn1TagClass::ContextSpecific, constructed, number)
    }

    /// Create a Private class tag
    pub const fn private(constructed: bool, number: u32) -> Self {
        Self::new(Asn1TagClass::Private, constructed, number)
    }

    /// Get tag class
    pub fn class(&self) -> Asn1TagClass {
        self.class
    }

    /// Check if tag is constructed
    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    /// Get tag number
    pub fn number(&self) -> u32 {
        self.number
    }

    fn leading_bits(&self) -> u8 {
        self.class.to_bits() | if self.constructed { 0x20 } else { 0x00 }
    }

    /// Number of identifier octets this tag encodes to
    pub fn encoded_len(&self) -> usize {
        if self.number < 0x1f {
            1
        } else {
            1 + base128::encoded_len(u64::from(self.number))
        }
    }

    /// Encode the identifier octets, passing each byte to `emit`
    ///
    /// # Errors
    /// Returns `Overflow` if the tag number does not fit in 29 bits.
    pub fn encode_with(&self, mut emit: impl FnMut(u8)) -> Asn1Result<()> {
        if self.number > TAG_NUMBER_MAX {
            return Err(Asn1Error::Overflow("tag number exceeds 29 bits"));
        }
        if self.number < 0x1f {
            emit(self.leading_bits() | self.number as u8);
        } else {
            emit(self.leading_bits() | 0x1f);
            let number = u64::from(self.number);
            base128::write_base128(number, base128::encoded_len(number), emit);
        }
        Ok(())
    }

    /// Encode the identifier octets
    pub fn encode(&self) -> Asn1Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_with(|byte| out.push(byte))?;
        Ok(out)
    }

    /// Decode a tag from the front of `data`
    ///
    /// # Returns
    /// Returns `Ok((Asn1Tag, bytes_consumed))` if successful
    ///
    /// # Errors
    /// Returns `MalformedDer` if:
    /// - the buffer is empty or the high tag number is truncated
    /// - a high tag number is below 31 or exceeds 29 bits
    /// - the tag is the reserved `[UNIVERSAL 0]`
    pub fn decode(data: &[u8]) -> Asn1Result<(Self, usize)> {
        let Some(&first_byte) = data.first() else {
            return Err(Asn1Error::MalformedDer("empty buffer for tag decoding".to_string()));
        };

        let class = Asn1TagClass::from_bits(first_byte);
        let constructed = first_byte & 0x20 != 0;
        let tag_bits = first_byte & 0x1f;

        let (number, consumed) = if tag_bits < 0x1f {
            (u32::from(tag_bits), 1)
        } else {
            let (value, len) = base128::decode_base128(&data[1..])?;
            if value > u64::from(TAG_NUMBER_MAX) {
                return Err(Asn1Error::MalformedDer(format!("tag number {value} exceeds 29 bits")));
            }
            if value < 0x1f {
                return Err(Asn1Error::MalformedDer(format!(
                    "tag number {value} should use low tag number form"
                )));
            }
            (value as u32, 1 + len)
        };

        if class == Asn1TagClass::Universal && number == 0 {
            return Err(Asn1Error::MalformedDer("reserved tag [UNIVERSAL 0]".to_string()));
        }

        Ok((Self::new(class, constructed, number), consumed))
    }
}

impl fmt::Display for Asn1Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Asn1Tag::BOOLEAN => write!(f, "BOOLEAN"),
            Asn1Tag::INTEGER => write!(f, "INTEGER"),
            Asn1Tag::BIT_STRING => write!(f, "BIT STRING"),
            Asn1Tag::OCTET_STRING => write!(f, "OCTET STRING"),
            Asn1Tag::NULL => write!(f, "NULL"),
            Asn1Tag::OID => write!(f, "OBJECT IDENTIFIER"),
            Asn1Tag::ENUMERATED => write!(f, "ENUMERATED"),
            Asn1Tag::UTF8_STRING => write!(f, "UTF8String"),
            Asn1Tag::SEQUENCE => write!(f, "SEQUENCE"),
            Asn1Tag::SET => write!(f, "SET"),
            Asn1Tag::PRINTABLE_STRING => write!(f, "PrintableString"),
            Asn1Tag::IA5_STRING => write!(f, "IA5String"),
            Asn1Tag::UTC_TIME => write!(f, "UTCTime"),
            Asn1Tag::GENERALIZED_TIME => write!(f, "GeneralizedTime"),
            tag => {
                let class = match tag.class {
                    Asn1TagClass::Universal => "UNIVERSAL",
                    Asn1TagClass::Application => "APPLICATION",
                    Asn1TagClass::ContextSpecific => "CONTEXT",
                    Asn1TagClass::Private => "PRIVATE",
                };
                write!(f, "[{} {}]", class, tag.number)?;
                if tag.constructed {
                    write!(f, " (constructed)")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Asn1Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Asn1Tag({})", self)
    }
}

/// DER definite length
///
/// Short form:
/// ```text
/// Byte: 0 L L L L L L L
/// ```
///
/// Long form:
/// ```text
/// First byte:      1 N N N N N N N  (N = number of length bytes)
/// Following bytes: big-endian length, no leading zero byte
/// ```
///
/// DER forbids indefinite lengths and any non-minimal form. Lengths are
/// limited to four length bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DerLength(usize);

impl DerLength {
    /// Create a new DER length
    pub fn new(length: usize) -> Self {
        Self(length)
    }

    /// Get the length value
    pub fn value(&self) -> usize {
        self.0
    }

    /// Number of bytes [`DerLength::encode`] produces
    pub fn encoded_len(&self) -> usize {
        if self.0 < 0x80 {
            1
        } else {
            1 + (usize::BITS - self.0.leading_zeros()).div_ceil(8) as usize
        }
    }

    /// Encode length to bytes
    pub fn encode(&self) -> Vec<u8> {
        if self.0 < 0x80 {
            return vec![self.0 as u8];
        }
        let num_bytes = self.encoded_len() - 1;
        let mut result = Vec::with_capacity(num_bytes + 1);
        result.push(0x80 | num_bytes as u8);
        result.extend_from_slice(&self.0.to_be_bytes()[size_of::<usize>() - num_bytes..]);
        result
    }

    /// Decode length from bytes
    ///
    /// # Returns
    /// Returns `Ok((DerLength, bytes_consumed))` if successful
    ///
    /// # Errors
    /// Returns `MalformedDer` if:
    /// - the buffer is too short
    /// - the length is indefinite or uses more than four length bytes
    /// - the long form was used for a length below 128, or has a leading zero
    pub fn decode(data: &[u8]) -> Asn1Result<(Self, usize)> {
        let Some(&first_byte) = data.first() else {
            return Err(Asn1Error::MalformedDer("empty buffer for length decoding".to_string()));
        };

        if first_byte & 0x80 == 0 {
            return Ok((Self(usize::from(first_byte)), 1));
        }

        let num_bytes = usize::from(first_byte & 0x7f);
        if num_bytes == 0 {
            return Err(Asn1Error::MalformedDer("indefinite length is not DER".to_string()));
        }
        if num_bytes > 4 {
            return Err(Asn1Error::MalformedDer(format!(
                "length encoding too large: {num_bytes} bytes (max 4)"
            )));
        }
        let Some(bytes) = data.get(1..1 + num_bytes) else {
            return Err(Asn1Error::MalformedDer(format!(
                "buffer too short for long form length: need {} bytes, got {}",
                1 + num_bytes,
                data.len()
            )));
        };

        let length = bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
        if length < 0x80 {
            return Err(Asn1Error::MalformedDer("long form used for short length".to_string()));
        }
        if length >> ((num_bytes - 1) * 8) == 0 {
            return Err(Asn1Error::MalformedDer("length has a leading zero byte".to_string()));
        }

        let length = usize::try_from(length)
            .map_err(|_| Asn1Error::Overflow("length does not fit in usize"))?;
        Ok((Self(length), 1 + num_bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tag_low_form() {
        assert_eq!(Asn1Tag::INTEGER.encode().unwrap(), vec![0x02]);
        assert_eq!(Asn1Tag::SEQUENCE.encode().unwrap(), vec![0x30]);
        assert_eq!(Asn1Tag::SET.encode().unwrap(), vec![0x31]);
        assert_eq!(Asn1Tag::context_specific(true, 0).encode().unwrap(), vec![0xa0]);
        assert_eq!(Asn1Tag::application(true, 0).encode().unwrap(), vec![0x60]);
        assert_eq!(Asn1Tag::private(false, 30).encode().unwrap(), vec![0xde]);
    }

    #[test]
    fn test_tag_high_form() {
        assert_eq!(Asn1Tag::context_specific(false, 31).encode().unwrap(), vec![0x9f, 0x1f]);
        assert_eq!(Asn1Tag::context_specific(true, 201).encode().unwrap(), vec![0xbf, 0x81, 0x49]);
        assert_eq!(Asn1Tag::private(false, TAG_NUMBER_MAX).encode().unwrap().len(), 6);
        assert_eq!(
            Asn1Tag::universal(false, TAG_NUMBER_MAX + 1).encode(),
            Err(Asn1Error::Overflow("tag number exceeds 29 bits"))
        );
    }

    #[test]
    fn test_tag_decode() {
        let (tag, consumed) = Asn1Tag::decode(&[0x02, 0x01]).unwrap();
        assert_eq!(consumed, 1);
        assert_eq!(tag, Asn1Tag::INTEGER);

        let (tag, consumed) = Asn1Tag::decode(&[0xbf, 0x81, 0x49, 0x00]).unwrap();
        assert_eq!(consumed, 3);
        assert_eq!(tag.class(), Asn1TagClass::ContextSpecific);
        assert!(tag.is_constructed());
        assert_eq!(tag.number(), 201);
    }

    #[test]
    fn test_tag_decode_rejects() {
        // High form for a number that fits the low form.
        assert!(Asn1Tag::decode(&[0x9f, 0x1e]).is_err());
        // Reserved [UNIVERSAL 0], primitive and constructed.
        assert!(Asn1Tag::decode(&[0x00]).is_err());
        assert!(Asn1Tag::decode(&[0x20]).is_err());
        // Truncated high form.
        assert!(Asn1Tag::decode(&[0x1f, 0x81]).is_err());
        // Over 29 bits.
        assert!(Asn1Tag::decode(&[0x1f, 0x82, 0x80, 0x80, 0x80, 0x00]).is_err());
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(Asn1Tag::SEQUENCE.to_string(), "SEQUENCE");
        assert_eq!(Asn1Tag::context_specific(true, 3).to_string(), "[CONTEXT 3] (constructed)");
    }

    #[test]
    fn test_length_encode() {
        assert_eq!(DerLength::new(0).encode(), vec![0x00]);
        assert_eq!(DerLength::new(0x7f).encode(), vec![0x7f]);
        assert_eq!(DerLength::new(0x80).encode(), vec![0x81, 0x80]);
        assert_eq!(DerLength::new(200).encode(), vec![0x81, 0xc8]);
        assert_eq!(DerLength::new(0x100).encode(), vec![0x82, 0x01, 0x00]);
        assert_eq!(DerLength::new(0x0100_0000).encode(), vec![0x84, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(DerLength::new(0x0100_0000).encoded_len(), 5);
    }

    #[test]
    fn test_length_decode() {
        assert_eq!(DerLength::decode(&[100]).unwrap(), (DerLength::new(100), 1));
        assert_eq!(DerLength::decode(&[0x82, 0x01, 0x00]).unwrap(), (DerLength::new(256), 3));
    }

    #[test]
    fn test_length_decode_rejects_non_der() {
        assert!(DerLength::decode(&[0x80]).is_err());
        assert!(DerLength::decode(&[0x81, 0x7f]).is_err());
        assert!(DerLength::decode(&[0x82, 0x00, 0xff]).is_err());
        assert!(DerLength::decode(&[0x85, 0x01, 0x00, 0x00, 0x00, 0x00]).is_err());
        assert!(DerLength::decode(&[0x82, 0x01]).is_err());
        assert!(DerLength::decode(&[]).is_err());
    }
}
