//! derkit - DER encoding toolkit
//!
//! Builds and parses DER without knowing lengths in advance, encodes
//! arbitrary-precision INTEGERs, and carries the constant-time helpers
//! that security-sensitive callers need around them.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `derkit-core`: error handling and constant-time primitives
//! - `derkit-asn1`: INTEGER codec, byte string builder and reader
//!
//! # Usage
//!
//! ```rust
//! use derkit::{Asn1Integer, Asn1Tag, ByteStringBuilder, sort_set_of};
//!
//! let cbb = ByteStringBuilder::new(64);
//! let set = cbb.add_asn1(Asn1Tag::SET)?;
//! set.add_asn1_integer(&Asn1Integer::from_i64(2))?;
//! set.add_asn1_integer(&Asn1Integer::from_i64(1))?;
//! sort_set_of(&set)?;
//! assert_eq!(cbb.finish()?, vec![0x31, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]);
//! # Ok::<(), derkit::Asn1Error>(())
//! ```

// Re-export core types
pub use derkit_core::{Asn1Error, Asn1Result};

pub use derkit_asn1::{Asn1Integer, Asn1Tag, Asn1TagClass, BuilderConfig, Cbs, DerLength};

/// Byte string builder
pub type ByteStringBuilder<'a> = derkit_asn1::Cbb<'a>;

pub mod constant_time {
    pub use derkit_core::constant_time::*;
}

pub mod der {
    pub use derkit_asn1::der::*;
}

pub mod integer {
    pub use derkit_asn1::integer::*;
}

/// Encode `value` as DER INTEGER contents (no tag or length)
pub fn encode_der_integer(value: &Asn1Integer) -> Asn1Result<Vec<u8>> {
    derkit_asn1::integer::encode_der_integer(value)
}

/// Decode `len` bytes of DER INTEGER contents from the front of `input`
///
/// `input` is advanced past the contents only on success.
pub fn decode_der_integer(input: &mut &[u8], len: usize) -> Asn1Result<Asn1Integer> {
    derkit_asn1::integer::decode_der_integer(input, len)
}

/// Reorder the contents of `cbb` into DER SET OF order
pub fn sort_set_of(cbb: &ByteStringBuilder) -> Asn1Result<()> {
    derkit_asn1::sort_set_of(cbb)
}

/// Encode `value` as big-endian base-128
pub fn encode_base128(value: u64) -> Vec<u8> {
    derkit_asn1::base128::encode_base128(value)
}
