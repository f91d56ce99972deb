use crate::error::CodecError;
use crate::{PRIVKEY_LEN, PUBKEYHASH_LEN};

fn check_version(found: u8, expected: Option<u8>, kind: &'static str) -> Result<(), CodecError> {
    match expected {
        Some(expected) if expected != found => Err(CodecError::WrongVersion {
            kind,
            expected,
            found,
        }),
        _ => Ok(()),
    }
}

fn check_payload(data: &[u8], expected: usize, kind: &'static str) -> Result<(), CodecError> {
    if data.len() != expected {
        return Err(CodecError::WrongLength {
            kind,
            expected,
        });
    }
    Ok(())
}

fn base58check_decode(encoded: &str) -> Result<Vec<u8>, CodecError> {
    bs58::decode(encoded)
        .with_check(None)
        .into_vec()
        .map_err(|e| CodecError::Base58(e.to_string()))
}

/// Encode a 20-byte public key hash as a legacy base58check address
/// under the given version byte.
pub fn encode_base58_address(version: u8, pubkeyhash: &[u8]) -> Result<String, CodecError> {
    check_payload(pubkeyhash, PUBKEYHASH_LEN, "public key hash")?;

    let mut payload = Vec::with_capacity(1 + PUBKEYHASH_LEN);
    payload.push(version);
    payload.extend_from_slice(pubkeyhash);
    Ok(bs58::encode(payload).with_check().into_string())
}

/// Decode a legacy base58check address into its version byte and 20-byte
/// hash. When `verify_version` is given, a mismatching version byte is an
/// error.
pub fn decode_base58_address(
    address: &str,
    verify_version: Option<u8>,
) -> Result<(u8, [u8; PUBKEYHASH_LEN]), CodecError> {
    let raw = base58check_decode(address)?;

    if raw.len() != 1 + PUBKEYHASH_LEN {
        return Err(CodecError::WrongLength {
            kind: "address payload",
            expected: 1 + PUBKEYHASH_LEN,
        });
    }

    let version = raw[0];
    check_version(version, verify_version, "address")?;

    let mut pubkeyhash = [0u8; PUBKEYHASH_LEN];
    pubkeyhash.copy_from_slice(&raw[1..]);
    Ok((version, pubkeyhash))
}

/// Encode a raw 32-byte private key in wallet import format. The trailing
/// `0x01` marks a key whose public key is serialized compressed.
pub fn encode_privkey(
    version: u8,
    privkey: &[u8],
    compressed_pubkey: bool,
) -> Result<String, CodecError> {
    check_payload(privkey, PRIVKEY_LEN, "private key")?;

    let mut payload = Vec::with_capacity(1 + PRIVKEY_LEN + 1);
    payload.push(version);
    payload.extend_from_slice(privkey);
    if compressed_pubkey {
        payload.push(0x01);
    }
    Ok(bs58::encode(payload).with_check().into_string())
}

/// Decode a WIF private key into `(version, key, compressed_pubkey)`.
///
/// Only 33 and 34-byte payloads are accepted; a 34-byte payload must end
/// in the `0x01` compression marker.
pub fn decode_privkey(
    encoded_privkey: &str,
    verify_version: Option<u8>,
) -> Result<(u8, [u8; PRIVKEY_LEN], bool), CodecError> {
    let raw = base58check_decode(encoded_privkey)?;

    if raw.len() != 1 + PRIVKEY_LEN && raw.len() != 1 + PRIVKEY_LEN + 1 {
        return Err(CodecError::WrongLength {
            kind: "private key payload",
            expected: 1 + PRIVKEY_LEN,
        });
    }

    let compressed_pubkey = raw.len() == 1 + PRIVKEY_LEN + 1;
    if compressed_pubkey && raw[raw.len() - 1] != 0x01 {
        return Err(CodecError::BadCompressionMarker);
    }

    let version = raw[0];
    check_version(version, verify_version, "private key")?;

    let mut privkey = [0u8; PRIVKEY_LEN];
    privkey.copy_from_slice(&raw[1..1 + PRIVKEY_LEN]);
    Ok((version, privkey, compressed_pubkey))
}
