//! ASN.1 DER processing for derkit
//!
//! This crate provides the DER pieces of derkit:
//!
//! - [`integer`]: arbitrary-precision INTEGER values and their DER codec
//! - [`der`]: the [`Cbb`] builder, the [`Cbs`] reader and SET OF ordering
//! - [`base128`]: base-128 integers used by tags and OBJECT IDENTIFIERs
//!
//! # Features
//!
//! - `bigint`: conversions between [`Asn1Integer`] and `num_bigint_dig`

pub mod base128;
pub mod der;
pub mod error;
pub mod integer;

pub use der::{Asn1Tag, Asn1TagClass, BuilderConfig, Cbb, Cbs, DerLength, sort_set_of};
pub use error::{Asn1Error, Asn1Result};
pub use integer::{Asn1Integer, decode_der_integer, encode_der_integer};
