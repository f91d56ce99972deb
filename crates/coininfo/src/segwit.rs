use serde::Deserialize;

use coin_codec::{encode_base58_address, encode_bech32_address, CodecError};

fn default_send_only() -> bool {
    true
}

/// How a chain expresses SegWit addresses for a public key hash.
///
/// A `send_only` form can be paid to but is never indexed for the account
/// and never handed out as a receive address; chains with a native bech32
/// form index it alongside the legacy address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SegwitVariant {
    /// SegWit wrapped in a base58check address under its own version byte.
    Base58 {
        address_version: u8,
        #[serde(default = "default_send_only")]
        send_only: bool,
    },
    /// Native SegWit bech32 address.
    Bech32 {
        prefix: String,
        #[serde(default)]
        send_only: bool,
    },
}

impl SegwitVariant {
    pub fn send_only(&self) -> bool {
        match self {
            SegwitVariant::Base58 { send_only, .. } => *send_only,
            SegwitVariant::Bech32 { send_only, .. } => *send_only,
        }
    }

    /// Encode the SegWit address form for a 20-byte public key hash.
    pub fn encode_segwit_address(&self, pubkeyhash: &[u8]) -> Result<String, CodecError> {
        match self {
            SegwitVariant::Base58 {
                address_version, ..
            } => encode_base58_address(*address_version, pubkeyhash),
            SegwitVariant::Bech32 { prefix, .. } => encode_bech32_address(prefix, pubkeyhash),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash() -> [u8; 20] {
        hex::decode("751e76e8199196d454941c45d1b3a323f1433bd6")
            .unwrap()
            .try_into()
            .unwrap()
    }

    #[test]
    fn bech32_variant_encodes_native_address() {
        let variant = SegwitVariant::Bech32 {
            prefix: "bc".into(),
            send_only: false,
        };
        assert_eq!(
            variant.encode_segwit_address(&hash()).unwrap(),
            "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4"
        );
    }

    #[test]
    fn base58_variant_encodes_wrapped_address() {
        let variant = SegwitVariant::Base58 {
            address_version: 50,
            send_only: true,
        };
        let addr = variant.encode_segwit_address(&hash()).unwrap();
        let (version, decoded) = coin_codec::decode_base58_address(&addr, None).unwrap();
        assert_eq!(version, 50);
        assert_eq!(decoded, hash());
    }

    #[test]
    fn deserialize_defaults() {
        let bech32: SegwitVariant = toml::from_str(r#"type = "bech32"
prefix = "grlc""#)
            .unwrap();
        assert!(!bech32.send_only());

        let base58: SegwitVariant = toml::from_str(r#"type = "base58"
address_version = 50"#)
            .unwrap();
        assert!(base58.send_only());
    }
}
