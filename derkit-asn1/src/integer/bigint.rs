//! Conversions to and from `num-bigint-dig`

use super::Asn1Integer;
use num_bigint_dig::{BigInt, BigUint, Sign};

impl From<&BigInt> for Asn1Integer {
    fn from(value: &BigInt) -> Self {
        let (sign, magnitude) = value.to_bytes_be();
        Asn1Integer::new(magnitude, sign == Sign::Minus)
    }
}

impl From<BigInt> for Asn1Integer {
    fn from(value: BigInt) -> Self {
        Asn1Integer::from(&value)
    }
}

impl From<&BigUint> for Asn1Integer {
    fn from(value: &BigUint) -> Self {
        Asn1Integer::new(value.to_bytes_be(), false)
    }
}

impl From<&Asn1Integer> for BigInt {
    fn from(value: &Asn1Integer) -> Self {
        let sign = if value.is_zero() {
            Sign::NoSign
        } else if value.is_negative() {
            Sign::Minus
        } else {
            Sign::Plus
        };
        BigInt::from_bytes_be(sign, value.magnitude())
    }
}
