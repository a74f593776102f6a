//! Error types shared with `derkit-core`

pub use derkit_core::error::{Asn1Error, Asn1Result};
