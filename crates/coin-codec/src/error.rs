use thiserror::Error;

/// Encoding and decoding failures. Every variant is a rejection of
/// malformed input; none of them is retryable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("invalid base58 data: {0}")]
    Base58(String),

    #[error("invalid bech32 data: {0}")]
    Bech32(String),

    #[error("invalid {kind} version (expected {expected}, got {found})")]
    WrongVersion {
        kind: &'static str,
        expected: u8,
        found: u8,
    },

    #[error("invalid {kind}: not {expected} bytes")]
    WrongLength {
        kind: &'static str,
        expected: usize,
    },

    #[error("invalid private key length / invalid public key compression byte")]
    BadCompressionMarker,

    #[error("invalid bech32 prefix")]
    BadPrefix,

    #[error("not a version-0 witness program")]
    BadWitnessVersion,
}
