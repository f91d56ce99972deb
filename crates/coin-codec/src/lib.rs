//! Address and private key codecs shared by every supported chain.
//!
//! Provides base58check encoding of legacy addresses and WIF private keys
//! with per-chain version bytes, and bech32 encoding of version-0 SegWit
//! addresses with per-chain human-readable prefixes.

pub mod base58;
pub mod error;
pub mod segwit;

pub use base58::{
    decode_base58_address, decode_privkey, encode_base58_address, encode_privkey,
};
pub use error::CodecError;
pub use segwit::{decode_bech32_address, encode_bech32_address};

/// Length of the hash payload carried by every address form.
pub const PUBKEYHASH_LEN: usize = 20;

/// Length of a raw secp256k1 private key.
pub const PRIVKEY_LEN: usize = 32;
