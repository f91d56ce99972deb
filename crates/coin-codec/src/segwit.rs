use bech32::{FromBase32, ToBase32, Variant};

use crate::error::CodecError;
use crate::PUBKEYHASH_LEN;

fn check_prefix(prefix: &str) -> Result<(), CodecError> {
    let ok = !prefix.is_empty()
        && prefix.len() <= 4
        && prefix.chars().all(|c| c.is_ascii_lowercase());
    if ok {
        Ok(())
    } else {
        Err(CodecError::BadPrefix)
    }
}

/// Encode a 20-byte public key hash as a version-0 bech32 witness address
/// under the given human-readable prefix.
pub fn encode_bech32_address(prefix: &str, pubkeyhash: &[u8]) -> Result<String, CodecError> {
    if pubkeyhash.len() != PUBKEYHASH_LEN {
        return Err(CodecError::WrongLength {
            kind: "public key hash",
            expected: PUBKEYHASH_LEN,
        });
    }
    check_prefix(prefix)?;

    let version =
        bech32::u5::try_from_u8(0).map_err(|e| CodecError::Bech32(e.to_string()))?;
    let mut data = vec![version];
    data.extend(pubkeyhash.to_base32());

    bech32::encode(prefix, data, Variant::Bech32).map_err(|e| CodecError::Bech32(e.to_string()))
}

/// Decode a bech32 address into its witness version and 20-byte program.
///
/// Only version-0 programs of exactly 20 bytes are accepted. When
/// `verify_prefix` is `None` the prefix embedded in the address itself is
/// accepted as-is.
pub fn decode_bech32_address(
    address: &str,
    verify_prefix: Option<&str>,
) -> Result<(u8, [u8; PUBKEYHASH_LEN]), CodecError> {
    let (hrp, data, variant) =
        bech32::decode(address).map_err(|e| CodecError::Bech32(e.to_string()))?;

    if variant != Variant::Bech32 {
        return Err(CodecError::Bech32("not a bech32-variant address".into()));
    }
    if let Some(expected) = verify_prefix {
        if hrp != expected {
            return Err(CodecError::BadPrefix);
        }
    }

    let version = data
        .first()
        .ok_or_else(|| CodecError::Bech32("empty data section".into()))?
        .to_u8();
    if version != 0 {
        return Err(CodecError::BadWitnessVersion);
    }

    let program =
        Vec::<u8>::from_base32(&data[1..]).map_err(|e| CodecError::Bech32(e.to_string()))?;
    if program.len() != PUBKEYHASH_LEN {
        return Err(CodecError::WrongLength {
            kind: "witness program",
            expected: PUBKEYHASH_LEN,
        });
    }

    let mut pubkeyhash = [0u8; PUBKEYHASH_LEN];
    pubkeyhash.copy_from_slice(&program);
    Ok((version, pubkeyhash))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_HASH: &str = "751e76e8199196d454941c45d1b3a323f1433bd6";

    fn known_hash() -> [u8; 20] {
        hex::decode(KNOWN_HASH).unwrap().try_into().unwrap()
    }

    #[test]
    fn encode_known_vector() {
        let addr = encode_bech32_address("bc", &known_hash()).unwrap();
        assert_eq!(addr, "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4");
    }

    #[test]
    fn roundtrip_with_explicit_prefix() {
        let addr = encode_bech32_address("grlc", &known_hash()).unwrap();
        let (version, hash) = decode_bech32_address(&addr, Some("grlc")).unwrap();
        assert_eq!(version, 0);
        assert_eq!(hash, known_hash());
    }

    #[test]
    fn roundtrip_with_inferred_prefix() {
        let addr = encode_bech32_address("tux", &known_hash()).unwrap();
        let (version, hash) = decode_bech32_address(&addr, None).unwrap();
        assert_eq!(version, 0);
        assert_eq!(hash, known_hash());
    }

    #[test]
    fn decode_rejects_wrong_prefix() {
        let addr = encode_bech32_address("bc", &known_hash()).unwrap();
        assert_eq!(
            decode_bech32_address(&addr, Some("tb")),
            Err(CodecError::BadPrefix)
        );
    }

    #[test]
    fn decode_rejects_corrupted_checksum() {
        let mut addr = encode_bech32_address("bc", &known_hash()).unwrap();
        let last = addr.pop().unwrap();
        addr.push(if last == 'q' { 'p' } else { 'q' });
        assert!(matches!(
            decode_bech32_address(&addr, None),
            Err(CodecError::Bech32(_))
        ));
    }

    #[test]
    fn decode_rejects_wrong_program_length() {
        // P2WSH-style program (32 bytes) must be rejected.
        let version = bech32::u5::try_from_u8(0).unwrap();
        let mut data = vec![version];
        data.extend([0xabu8; 32].to_base32());
        let addr = bech32::encode("bc", data, Variant::Bech32).unwrap();
        assert!(matches!(
            decode_bech32_address(&addr, None),
            Err(CodecError::WrongLength { .. })
        ));
    }

    #[test]
    fn decode_rejects_nonzero_witness_version() {
        let version = bech32::u5::try_from_u8(1).unwrap();
        let mut data = vec![version];
        data.extend(known_hash().to_base32());
        let addr = bech32::encode("bc", data, Variant::Bech32).unwrap();
        assert_eq!(
            decode_bech32_address(&addr, None),
            Err(CodecError::BadWitnessVersion)
        );
    }

    #[test]
    fn encode_rejects_bad_prefix() {
        assert_eq!(
            encode_bech32_address("GRLC", &known_hash()),
            Err(CodecError::BadPrefix)
        );
        assert_eq!(
            encode_bech32_address("toolong", &known_hash()),
            Err(CodecError::BadPrefix)
        );
        assert_eq!(
            encode_bech32_address("", &known_hash()),
            Err(CodecError::BadPrefix)
        );
    }

    #[test]
    fn encode_rejects_short_hash() {
        assert!(matches!(
            encode_bech32_address("bc", &[0u8; 19]),
            Err(CodecError::WrongLength { .. })
        ));
    }
}
