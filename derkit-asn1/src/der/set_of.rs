//! DER SET OF ordering
//!
//! DER requires the elements of a SET OF to appear in ascending order of
//! their encodings, compared as octet strings with the shorter one first
//! when one is a prefix of the other.

use crate::der::builder::Cbb;
use crate::der::parser::Cbs;
use crate::error::Asn1Result;

/// Reorder the elements of `cbb`'s contents into DER SET OF order
///
/// Same as [`Cbb::flush_asn1_set_of`].
pub fn sort_set_of(cbb: &Cbb) -> Asn1Result<()> {
    cbb.flush_asn1_set_of()
}

/// Sort the concatenated DER elements in `contents` in place
///
/// The whole buffer is parsed before anything is moved, so a malformed
/// element leaves `contents` untouched.
pub(crate) fn sort_elements(contents: &mut [u8]) -> Asn1Result<()> {
    let mut lens = Vec::new();
    let mut cbs = Cbs::new(contents);
    while !cbs.is_empty() {
        let (_, _, element) = cbs.get_any_asn1_element()?;
        lens.push(element.len());
    }
    if lens.len() < 2 {
        return Ok(());
    }

    let copy = contents.to_vec();
    let mut elements = Vec::with_capacity(lens.len());
    let mut offset = 0;
    for len in lens {
        elements.push(&copy[offset..offset + len]);
        offset += len;
    }
    // Stable, and slice ordering puts a prefix before its extensions.
    elements.sort();

    let mut offset = 0;
    for element in &elements {
        contents[offset..offset + element.len()].copy_from_slice(element);
        offset += element.len();
    }
    log::trace!("sorted {} SET OF elements", elements.len());
    Ok(())
}
