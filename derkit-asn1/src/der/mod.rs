//! DER building and parsing
//!
//! Each ASN.1 value is encoded as a TLV (Tag-Length-Value) triplet:
//!
//! ```text
//! [Tag] [Length] [Value]
//! ```
//!
//! ## Tag Encoding
//!
//! ```text
//! Bits: 8 7 6 5 4 3 2 1
//!       C C P T T T T T
//! ```
//! Where:
//! - CC = Class (00=Universal, 01=Application, 10=Context, 11=Private)
//! - P = Primitive (0) or Constructed (1)
//! - TTTTT = Tag number (0-30), or 11111 followed by a base-128 tag number
//!
//! ## Length Encoding
//!
//! - **Short form** (1 byte): lengths 0-127
//! - **Long form**: `0x80 | n` followed by `n` big-endian length bytes,
//!   with no leading zero and only for lengths of 128 and above
//!
//! DER has no indefinite lengths. [`Cbb`] and [`Cbs`] support up to four
//! length bytes.
//!
//! # Modules
//!
//! - [`builder`]: [`Cbb`], a builder that patches length prefixes after the
//!   contents are written
//! - [`parser`]: [`Cbs`], a strict reader
//! - [`set_of`]: SET OF ordering
//! - [`types`]: [`Asn1Tag`] and [`DerLength`]

pub mod builder;
pub mod config;
pub mod parser;
pub mod set_of;
pub mod types;

pub use builder::Cbb;
pub use config::BuilderConfig;
pub use parser::Cbs;
pub use set_of::sort_set_of;
pub use types::{Asn1Tag, Asn1TagClass, DerLength, TAG_NUMBER_MAX};
