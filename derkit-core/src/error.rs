use thiserror::Error;

/// Main error type for derkit operations
///
/// Every fallible operation in the workspace returns this type. There is no
/// partial success: a builder chain that produced one of these is poisoned,
/// and a decoder that produced one of these left its input untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Asn1Error {
    /// A length computation would exceed the representable range.
    #[error("Length overflow: {0}")]
    Overflow(&'static str),

    /// DER INTEGER contents are empty or not minimally encoded.
    #[error("Invalid INTEGER encoding")]
    InvalidInteger,

    /// Input is longer than the supported bound.
    #[error("Input too long: {0} bytes")]
    TooLong(usize),

    /// The builder was used in a way its state machine does not allow.
    #[error("Builder misuse: {0}")]
    BuilderMisuse(&'static str),

    /// Backing storage could not be grown.
    #[error("Allocation of {0} bytes failed")]
    AllocationFailure(usize),

    /// Bytes do not form a valid DER element.
    #[error("Malformed DER: {0}")]
    MalformedDer(String),

    /// A value does not fit the requested native type.
    #[error("Value out of range: {0}")]
    OutOfRange(String),

    /// Dotted-decimal OID text could not be encoded.
    #[error("Invalid object identifier: {0}")]
    InvalidOid(String),
}

/// Result type alias for derkit operations
pub type Asn1Result<T> = Result<T, Asn1Error>;
