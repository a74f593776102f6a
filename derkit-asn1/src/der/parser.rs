//! Byte string reader
//!
//! [`Cbs`] is a cursor over a borrowed byte slice. Every `get_*` method
//! either consumes exactly the bytes it returns or fails and leaves the
//! cursor where it was, so callers can try alternatives.
//!
//! # Usage Example
//!
//! ```rust
//! use derkit_asn1::der::{Asn1Tag, Cbs};
//!
//! let data = [0x30, 0x06, 0x02, 0x01, 0x05, 0x01, 0x01, 0xff];
//! let mut cbs = Cbs::new(&data);
//! let mut seq = cbs.get_asn1(Asn1Tag::SEQUENCE).unwrap();
//! assert_eq!(seq.get_asn1_uint64().unwrap(), 5);
//! assert!(seq.get_asn1_bool().unwrap());
//! assert!(seq.is_empty() && cbs.is_empty());
//! ```

use crate::der::types::{Asn1Tag, DerLength};
use crate::error::{Asn1Error, Asn1Result};
use crate::integer::{Asn1Integer, decode_der_integer_contents};

/// Read cursor over DER or TLS-style data
///
/// # Error Handling
///
/// Reads fail with `MalformedDer` when:
/// - the input is exhausted
/// - a tag or length violates DER
/// - an element carries a different tag than requested
///
/// INTEGER reads additionally report the integer codec errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cbs<'a> {
    data: &'a [u8],
}

fn truncated(need: usize, have: usize) -> Asn1Error {
    Asn1Error::MalformedDer(format!("input exhausted: need {need} bytes, have {have}"))
}

impl<'a> Cbs<'a> {
    /// Create a reader over `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Unread bytes
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// Number of unread bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether every byte has been consumed
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume `len` bytes and return them
    pub fn get_bytes(&mut self, len: usize) -> Asn1Result<&'a [u8]> {
        if len > self.data.len() {
            return Err(truncated(len, self.data.len()));
        }
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    /// Skip `len` bytes
    pub fn skip(&mut self, len: usize) -> Asn1Result<()> {
        self.get_bytes(len).map(|_| ())
    }

    fn get_array<const N: usize>(&mut self) -> Asn1Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.get_bytes(N)?);
        Ok(out)
    }

    pub fn get_u8(&mut self) -> Asn1Result<u8> {
        Ok(self.get_array::<1>()?[0])
    }

    pub fn get_u16(&mut self) -> Asn1Result<u16> {
        self.get_array().map(u16::from_be_bytes)
    }

    /// Read a 24-bit big-endian value
    pub fn get_u24(&mut self) -> Asn1Result<u32> {
        let [a, b, c] = self.get_array()?;
        Ok(u32::from_be_bytes([0, a, b, c]))
    }

    pub fn get_u32(&mut self) -> Asn1Result<u32> {
        self.get_array().map(u32::from_be_bytes)
    }

    pub fn get_u64(&mut self) -> Asn1Result<u64> {
        self.get_array().map(u64::from_be_bytes)
    }

    pub fn get_u16le(&mut self) -> Asn1Result<u16> {
        self.get_array().map(u16::from_le_bytes)
    }

    pub fn get_u32le(&mut self) -> Asn1Result<u32> {
        self.get_array().map(u32::from_le_bytes)
    }

    pub fn get_u64le(&mut self) -> Asn1Result<u64> {
        self.get_array().map(u64::from_le_bytes)
    }

    fn get_length_prefixed(&mut self, len_len: usize) -> Asn1Result<Cbs<'a>> {
        let mut tmp = *self;
        let prefix = tmp.get_bytes(len_len)?;
        let len = prefix.iter().fold(0usize, |acc, &b| (acc << 8) | usize::from(b));
        let body = tmp.get_bytes(len)?;
        *self = tmp;
        Ok(Cbs::new(body))
    }

    /// Read a body preceded by a one-byte length
    pub fn get_u8_length_prefixed(&mut self) -> Asn1Result<Cbs<'a>> {
        self.get_length_prefixed(1)
    }

    /// Read a body preceded by a two-byte length
    pub fn get_u16_length_prefixed(&mut self) -> Asn1Result<Cbs<'a>> {
        self.get_length_prefixed(2)
    }

    /// Read a body preceded by a three-byte length
    pub fn get_u24_length_prefixed(&mut self) -> Asn1Result<Cbs<'a>> {
        self.get_length_prefixed(3)
    }

    /// Whether the next element carries `tag`
    ///
    /// Only the identifier octets are examined.
    pub fn peek_asn1_tag(&self, tag: Asn1Tag) -> bool {
        matches!(Asn1Tag::decode(self.data), Ok((found, _)) if found == tag)
    }

    /// Read the next element whatever its tag
    ///
    /// # Returns
    /// Returns `Ok((tag, header_len, element))` where `element` includes the
    /// identifier and length octets and `header_len` is their size.
    ///
    /// # Errors
    /// Returns `MalformedDer` if the tag or length is not valid DER or the
    /// element runs past the end of the input.
    pub fn get_any_asn1_element(&mut self) -> Asn1Result<(Asn1Tag, usize, &'a [u8])> {
        let (tag, tag_len) = Asn1Tag::decode(self.data)?;
        let (length, length_len) = DerLength::decode(&self.data[tag_len..])?;
        let header_len = tag_len + length_len;
        let total = header_len
            .checked_add(length.value())
            .ok_or(Asn1Error::Overflow("element length overflows usize"))?;
        let element = self.get_bytes(total)?;
        Ok((tag, header_len, element))
    }

    fn get_expected(&mut self, tag: Asn1Tag) -> Asn1Result<(usize, &'a [u8])> {
        let mut tmp = *self;
        let (found, header_len, element) = tmp.get_any_asn1_element()?;
        if found != tag {
            return Err(Asn1Error::MalformedDer(format!("expected {tag}, found {found}")));
        }
        *self = tmp;
        Ok((header_len, element))
    }

    /// Read an element with `tag` and return its contents
    pub fn get_asn1(&mut self, tag: Asn1Tag) -> Asn1Result<Cbs<'a>> {
        let (header_len, element) = self.get_expected(tag)?;
        Ok(Cbs::new(&element[header_len..]))
    }

    /// Read an element with `tag` and return it with its header
    pub fn get_asn1_element(&mut self, tag: Asn1Tag) -> Asn1Result<Cbs<'a>> {
        let (_, element) = self.get_expected(tag)?;
        Ok(Cbs::new(element))
    }

    /// Read an element with `tag` if it is the next one
    ///
    /// Returns `Ok(None)` without consuming anything when the next element
    /// has another tag or the input is empty.
    pub fn get_optional_asn1(&mut self, tag: Asn1Tag) -> Asn1Result<Option<Cbs<'a>>> {
        if self.peek_asn1_tag(tag) {
            self.get_asn1(tag).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Read an INTEGER of any size
    pub fn get_asn1_integer(&mut self) -> Asn1Result<Asn1Integer> {
        let mut tmp = *self;
        let contents = tmp.get_asn1(Asn1Tag::INTEGER)?;
        let value = decode_der_integer_contents(contents.as_bytes())?;
        *self = tmp;
        Ok(value)
    }

    /// Read a non-negative INTEGER that fits in `u64`
    pub fn get_asn1_uint64(&mut self) -> Asn1Result<u64> {
        let mut tmp = *self;
        let value = tmp.get_asn1_integer()?.to_u64()?;
        *self = tmp;
        Ok(value)
    }

    /// Read an INTEGER that fits in `i64`
    pub fn get_asn1_int64(&mut self) -> Asn1Result<i64> {
        let mut tmp = *self;
        let value = tmp.get_asn1_integer()?.to_i64()?;
        *self = tmp;
        Ok(value)
    }

    /// Read a BOOLEAN
    ///
    /// DER allows only `0x00` and `0xff` as contents.
    pub fn get_asn1_bool(&mut self) -> Asn1Result<bool> {
        let mut tmp = *self;
        let value = match tmp.get_asn1(Asn1Tag::BOOLEAN)?.as_bytes() {
            [0x00] => false,
            [0xff] => true,
            other => {
                return Err(Asn1Error::MalformedDer(format!(
                    "invalid BOOLEAN contents {other:02x?}"
                )));
            }
        };
        *self = tmp;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fixed_width_reads() {
        let data = hex::decode("01020304050607080910111213141516171819").unwrap();
        let mut cbs = Cbs::new(&data);
        assert_eq!(cbs.get_u8().unwrap(), 0x01);
        assert_eq!(cbs.get_u16().unwrap(), 0x0203);
        assert_eq!(cbs.get_u24().unwrap(), 0x040506);
        assert_eq!(cbs.get_u32().unwrap(), 0x0708_0910);
        assert_eq!(cbs.get_u16le().unwrap(), 0x1211);
        assert_eq!(cbs.get_u32le().unwrap(), 0x1615_1413);
        assert_eq!(cbs.len(), 3);
        assert!(cbs.get_u64().is_err());
        assert_eq!(cbs.len(), 3);
        cbs.skip(3).unwrap();
        assert!(cbs.is_empty());
    }

    #[test]
    fn test_u64_reads() {
        let data = [1, 2, 3, 4, 5, 6, 7, 8, 1, 2, 3, 4, 5, 6, 7, 8];
        let mut cbs = Cbs::new(&data);
        assert_eq!(cbs.get_u64().unwrap(), 0x0102_0304_0506_0708);
        assert_eq!(cbs.get_u64le().unwrap(), 0x0807_0605_0403_0201);
    }

    #[test]
    fn test_length_prefixed() {
        let data = [0x02, 0xaa, 0xbb, 0x00, 0x01, 0xcc, 0x00, 0x00, 0x00];
        let mut cbs = Cbs::new(&data);
        assert_eq!(cbs.get_u8_length_prefixed().unwrap().as_bytes(), &[0xaa, 0xbb]);
        assert_eq!(cbs.get_u16_length_prefixed().unwrap().as_bytes(), &[0xcc]);
        assert!(cbs.get_u24_length_prefixed().unwrap().is_empty());
        assert!(cbs.is_empty());

        // Truncated body leaves the cursor alone.
        let mut short = Cbs::new(&[0x05, 0x01]);
        assert!(short.get_u8_length_prefixed().is_err());
        assert_eq!(short.len(), 2);
    }

    #[test]
    fn test_nested_elements() {
        let data = hex::decode("300a020101a0050403616263").unwrap();
        let mut cbs = Cbs::new(&data);
        let mut seq = cbs.get_asn1(Asn1Tag::SEQUENCE).unwrap();
        assert_eq!(seq.get_asn1_int64().unwrap(), 1);
        assert!(seq.peek_asn1_tag(Asn1Tag::context_specific(true, 0)));
        assert!(seq.get_optional_asn1(Asn1Tag::context_specific(true, 1)).unwrap().is_none());
        let mut explicit = seq.get_optional_asn1(Asn1Tag::context_specific(true, 0)).unwrap().unwrap();
        assert_eq!(explicit.get_asn1(Asn1Tag::OCTET_STRING).unwrap().as_bytes(), b"abc");
        assert!(seq.is_empty());
        assert!(seq.get_optional_asn1(Asn1Tag::INTEGER).unwrap().is_none());
    }

    #[test]
    fn test_any_element_reports_header() {
        let data = hex::decode("1f8100020102").unwrap();
        let mut cbs = Cbs::new(&data);
        let (tag, header_len, element) = cbs.get_any_asn1_element().unwrap();
        assert_eq!(tag, Asn1Tag::universal(false, 128));
        assert_eq!(header_len, 4);
        assert_eq!(element, data.as_slice());
    }

    #[test]
    fn test_get_asn1_element_keeps_header() {
        let data = [0x04, 0x01, 0x7f, 0x05, 0x00];
        let mut cbs = Cbs::new(&data);
        assert_eq!(cbs.get_asn1_element(Asn1Tag::OCTET_STRING).unwrap().as_bytes(), &[0x04, 0x01, 0x7f]);
        assert!(cbs.get_asn1(Asn1Tag::NULL).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_tag_does_not_consume() {
        let data = [0x02, 0x01, 0x05];
        let mut cbs = Cbs::new(&data);
        let err = cbs.get_asn1(Asn1Tag::OCTET_STRING).unwrap_err();
        assert!(matches!(err, Asn1Error::MalformedDer(_)));
        assert_eq!(cbs.len(), 3);
        assert_eq!(cbs.get_asn1_uint64().unwrap(), 5);
    }

    #[test]
    fn test_rejects_non_der() {
        // Indefinite length.
        assert!(Cbs::new(&[0x30, 0x80, 0x00, 0x00]).get_any_asn1_element().is_err());
        // Long form for a short length.
        assert!(Cbs::new(&[0x04, 0x81, 0x01, 0x00]).get_any_asn1_element().is_err());
        // Leading zero length byte.
        let mut padded = vec![0x04, 0x82, 0x00, 0x80];
        padded.extend_from_slice(&[0u8; 0x80]);
        assert!(Cbs::new(&padded).get_any_asn1_element().is_err());
        // Truncated contents.
        assert!(Cbs::new(&[0x04, 0x03, 0x00]).get_any_asn1_element().is_err());
        // High tag number form for a small number.
        assert!(Cbs::new(&[0x1f, 0x05, 0x00]).get_any_asn1_element().is_err());
        assert!(Cbs::new(&[]).get_any_asn1_element().is_err());
    }

    #[test]
    fn test_integers() {
        let data = hex::decode("020100020180020100020900ffffffffffffffff0201ff").unwrap();
        let mut cbs = Cbs::new(&data);
        assert_eq!(cbs.get_asn1_uint64().unwrap(), 0);
        assert_eq!(cbs.get_asn1_int64().unwrap(), -128);
        assert_eq!(cbs.get_asn1_int64().unwrap(), 0);
        assert_eq!(cbs.get_asn1_uint64().unwrap(), u64::MAX);

        // Negative value refused as u64 and left in place.
        assert!(matches!(cbs.get_asn1_uint64(), Err(Asn1Error::OutOfRange(_))));
        assert_eq!(cbs.get_asn1_int64().unwrap(), -1);
        assert!(cbs.is_empty());
    }

    #[test]
    fn test_integer_encoding_checks() {
        // Non-minimal.
        assert_eq!(Cbs::new(&[0x02, 0x02, 0x00, 0x01]).get_asn1_integer(), Err(Asn1Error::InvalidInteger));
        // Empty contents.
        assert_eq!(Cbs::new(&[0x02, 0x00]).get_asn1_integer(), Err(Asn1Error::InvalidInteger));
        let big = Cbs::new(&[0x02, 0x09, 0x01, 0, 0, 0, 0, 0, 0, 0, 0]).get_asn1_integer().unwrap();
        assert_eq!(big.magnitude(), &[0x01, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_bool() {
        let mut cbs = Cbs::new(&[0x01, 0x01, 0xff, 0x01, 0x01, 0x00, 0x01, 0x01, 0x01]);
        assert!(cbs.get_asn1_bool().unwrap());
        assert!(!cbs.get_asn1_bool().unwrap());
        assert!(cbs.get_asn1_bool().is_err());
        assert_eq!(cbs.len(), 3);
    }
}
