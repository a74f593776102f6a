//! Constant-time comparison and selection primitives
//!
//! Booleans are represented as masks: all-ones for true, all-zeros for false.
//! Masks can be combined with `&`, `|` and `!` and fed to the `ct_select_*`
//! functions, so higher-level code can make secret-dependent decisions
//! without secret-dependent branches.
//!
//! None of these functions branch on, or index memory with, their inputs.
//! The masks passed to the select and conditional copy functions go through
//! [`value_barrier_w`] so the optimizer cannot turn the selection back into a
//! branch. The only functional check available for that property is review of
//! the generated code; the tests below cover the truth tables.
//!
//! # Usage Example
//!
//! ```rust
//! use derkit_core::constant_time::{ct_eq_8, ct_select_8};
//!
//! let secret = 0x42u8;
//! let mask = ct_eq_8(secret, 0x42);
//! assert_eq!(ct_select_8(mask, 1, 2), 1);
//! ```

use crate::error::{Asn1Error, Asn1Result};
use core::hint::black_box;

/// Native machine word used for masks (32 or 64 bits depending on target).
pub type CryptoWord = usize;

const WORD_BITS: u32 = CryptoWord::BITS;

/// Returns `a` unchanged while hiding its value from the optimizer.
#[inline(always)]
pub fn value_barrier_w(a: CryptoWord) -> CryptoWord {
    black_box(a)
}

/// [`value_barrier_w`] for `u32`.
#[inline(always)]
pub fn value_barrier_u32(a: u32) -> u32 {
    black_box(a)
}

/// [`value_barrier_w`] for `u8`.
#[inline(always)]
pub fn value_barrier_u8(a: u8) -> u8 {
    black_box(a)
}

/// Broadcasts the most significant bit of `a` to every bit.
#[inline(always)]
pub fn ct_msb_w(a: CryptoWord) -> CryptoWord {
    0usize.wrapping_sub(a >> (WORD_BITS - 1))
}

/// All-ones if `a < b`, all-zeros otherwise.
///
/// The top bit of `a ^ ((a ^ b) | ((a - b) ^ a))` is the borrow out of
/// `a - b`, computed without relying on a carry flag.
#[inline(always)]
pub fn ct_lt_w(a: CryptoWord, b: CryptoWord) -> CryptoWord {
    ct_msb_w(a ^ ((a ^ b) | (a.wrapping_sub(b) ^ a)))
}

/// All-ones if `a >= b`, all-zeros otherwise.
#[inline(always)]
pub fn ct_ge_w(a: CryptoWord, b: CryptoWord) -> CryptoWord {
    !ct_lt_w(a, b)
}

/// All-ones if `a == 0`, all-zeros otherwise.
#[inline(always)]
pub fn ct_is_zero_w(a: CryptoWord) -> CryptoWord {
    // Only zero has both the top bit of !a and the top bit of a - 1 set.
    ct_msb_w(!a & a.wrapping_sub(1))
}

/// All-ones if `a == b`, all-zeros otherwise.
#[inline(always)]
pub fn ct_eq_w(a: CryptoWord, b: CryptoWord) -> CryptoWord {
    ct_is_zero_w(a ^ b)
}

/// Returns `a` if `mask` is all-ones and `b` if it is all-zeros.
#[inline(always)]
pub fn ct_select_w(mask: CryptoWord, a: CryptoWord, b: CryptoWord) -> CryptoWord {
    let mask = value_barrier_w(mask);
    (mask & a) | (!mask & b)
}

/// 8-bit [`ct_is_zero_w`].
#[inline(always)]
pub fn ct_is_zero_8(a: u8) -> u8 {
    ct_is_zero_w(a as CryptoWord) as u8
}

/// 8-bit [`ct_eq_w`].
#[inline(always)]
pub fn ct_eq_8(a: u8, b: u8) -> u8 {
    ct_eq_w(a as CryptoWord, b as CryptoWord) as u8
}

/// 8-bit [`ct_lt_w`].
#[inline(always)]
pub fn ct_lt_8(a: u8, b: u8) -> u8 {
    ct_lt_w(a as CryptoWord, b as CryptoWord) as u8
}

/// 8-bit [`ct_ge_w`].
#[inline(always)]
pub fn ct_ge_8(a: u8, b: u8) -> u8 {
    ct_ge_w(a as CryptoWord, b as CryptoWord) as u8
}

/// 8-bit [`ct_select_w`]. `mask` must be `0x00` or `0xff`.
#[inline(always)]
pub fn ct_select_8(mask: u8, a: u8, b: u8) -> u8 {
    let mask = value_barrier_u8(mask);
    (mask & a) | (!mask & b)
}

/// All-ones word if the two `i32` values are equal.
#[inline(always)]
pub fn ct_eq_int(a: i32, b: i32) -> CryptoWord {
    ct_eq_w(a as CryptoWord, b as CryptoWord)
}

/// [`ct_select_w`] over `i32`.
#[inline(always)]
pub fn ct_select_int(mask: CryptoWord, a: i32, b: i32) -> i32 {
    ct_select_w(mask, a as CryptoWord, b as CryptoWord) as i32
}

/// Copies `src` into `dst` if `mask` is all-ones; leaves `dst` alone if it is
/// all-zeros. Every byte of both slices is read and every byte of `dst` is
/// written in either case.
///
/// # Errors
/// Returns `OutOfRange` without touching `dst` if the slices differ in
/// length. Lengths are public.
pub fn ct_conditional_memcpy(dst: &mut [u8], src: &[u8], mask: CryptoWord) -> Asn1Result<()> {
    check_same_len(dst, src)?;
    let mask = value_barrier_w(mask) as u8;
    for (d, s) in dst.iter_mut().zip(src) {
        *d = ct_select_8(mask, *s, *d);
    }
    Ok(())
}

/// XORs `src` into `dst` if `mask` is all-ones; XORs zero otherwise.
///
/// # Errors
/// Returns `OutOfRange` without touching `dst` if the slices differ in
/// length.
pub fn ct_conditional_memxor(dst: &mut [u8], src: &[u8], mask: CryptoWord) -> Asn1Result<()> {
    check_same_len(dst, src)?;
    let mask = value_barrier_w(mask) as u8;
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= mask & *s;
    }
    Ok(())
}

fn check_same_len(dst: &[u8], src: &[u8]) -> Asn1Result<()> {
    if dst.len() != src.len() {
        return Err(Asn1Error::OutOfRange(format!(
            "destination holds {} bytes, source {}",
            dst.len(),
            src.len()
        )));
    }
    Ok(())
}

/// All-ones if `a` and `b` hold the same bytes.
///
/// Slices of different length compare unequal immediately; only the
/// contents are treated as secret.
pub fn ct_memeq(a: &[u8], b: &[u8]) -> CryptoWord {
    if a.len() != b.len() {
        return 0;
    }
    let diff = a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y));
    ct_is_zero_w(value_barrier_u8(diff) as CryptoWord)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ONES: CryptoWord = CryptoWord::MAX;

    fn word_samples() -> Vec<CryptoWord> {
        let half = CryptoWord::MAX / 2;
        vec![0, 1, 2, 0x7f, 0x80, 0xff, 0x100, half - 1, half, half + 1, half + 2, ALL_ONES - 1, ALL_ONES]
    }

    fn bool_mask(b: bool) -> CryptoWord {
        if b { ALL_ONES } else { 0 }
    }

    #[test]
    fn test_word_comparisons() {
        for &a in &word_samples() {
            assert_eq!(ct_is_zero_w(a), bool_mask(a == 0), "is_zero({a:#x})");
            assert_eq!(ct_msb_w(a), bool_mask(a >> (WORD_BITS - 1) == 1));
            for &b in &word_samples() {
                assert_eq!(ct_lt_w(a, b), bool_mask(a < b), "lt({a:#x}, {b:#x})");
                assert_eq!(ct_ge_w(a, b), bool_mask(a >= b), "ge({a:#x}, {b:#x})");
                assert_eq!(ct_eq_w(a, b), bool_mask(a == b), "eq({a:#x}, {b:#x})");
                assert_eq!(ct_select_w(ALL_ONES, a, b), a);
                assert_eq!(ct_select_w(0, a, b), b);
            }
        }
    }

    #[test]
    fn test_byte_truth_tables() {
        for a in 0..=255u8 {
            assert_eq!(ct_is_zero_8(a), if a == 0 { 0xff } else { 0 });
            for b in 0..=255u8 {
                let eq = ct_eq_8(a, b);
                assert_eq!(eq, if a == b { 0xff } else { 0 });
                assert_eq!(ct_lt_8(a, b), if a < b { 0xff } else { 0 });
                assert_eq!(ct_ge_8(a, b), if a >= b { 0xff } else { 0 });
                assert_eq!(ct_select_8(0xff, a, b), a);
                assert_eq!(ct_select_8(0x00, a, b), b);
                // Selecting on equality yields `a`, which equals `b` exactly when the mask is set.
                let selected = ct_select_8(eq, a, b);
                assert_eq!(selected, if a == b { a } else { b });
            }
        }
    }

    #[test]
    fn test_int_variants() {
        for &(a, b) in &[(0, 0), (-1, -1), (-1, 1), (i32::MIN, i32::MAX), (7, 7), (i32::MIN, i32::MIN)] {
            assert_eq!(ct_eq_int(a, b), bool_mask(a == b));
            assert_eq!(ct_select_int(ALL_ONES, a, b), a);
            assert_eq!(ct_select_int(0, a, b), b);
        }
    }

    #[test]
    fn test_conditional_memcpy() {
        let src = [1u8, 2, 3, 4];
        let mut dst = [9u8; 4];
        ct_conditional_memcpy(&mut dst, &src, 0).unwrap();
        assert_eq!(dst, [9; 4]);
        ct_conditional_memcpy(&mut dst, &src, ALL_ONES).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn test_conditional_memxor() {
        let src = [0xffu8, 0x0f, 0x00];
        let mut dst = [0x12u8, 0x34, 0x56];
        ct_conditional_memxor(&mut dst, &src, 0).unwrap();
        assert_eq!(dst, [0x12, 0x34, 0x56]);
        ct_conditional_memxor(&mut dst, &src, ALL_ONES).unwrap();
        assert_eq!(dst, [0xed, 0x3b, 0x56]);
    }

    #[test]
    fn test_conditional_length_mismatch() {
        let mut dst = [7u8; 2];
        let err = ct_conditional_memcpy(&mut dst, &[1, 2, 3], ALL_ONES).unwrap_err();
        assert!(matches!(err, Asn1Error::OutOfRange(_)));
        assert!(ct_conditional_memxor(&mut dst, &[1], ALL_ONES).is_err());
        assert_eq!(dst, [7, 7]);
    }

    #[test]
    fn test_memeq() {
        assert_eq!(ct_memeq(b"abc", b"abc"), ALL_ONES);
        assert_eq!(ct_memeq(b"abc", b"abd"), 0);
        assert_eq!(ct_memeq(b"abc", b"ab"), 0);
        assert_eq!(ct_memeq(b"", b""), ALL_ONES);
    }
}
