use serde::Deserialize;

use coin_codec::{
    decode_base58_address, decode_bech32_address, encode_base58_address, encode_privkey,
    PUBKEYHASH_LEN,
};

use crate::error::CoinError;
use crate::segwit::SegwitVariant;
use crate::txout::TxOutType;

/// Parameters of one tracked chain.
#[derive(Debug, Clone, Deserialize)]
pub struct Coin {
    pub name: String,
    pub ticker: String,
    /// Name of this chain's indexer database.
    pub database: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    pub address_version: u8,
    pub p2sh_address_version: u8,
    pub privkey_version: u8,
    #[serde(default)]
    pub segwit: Option<SegwitVariant>,
    #[serde(default)]
    pub allow_tx_subsidy: bool,
}

impl Coin {
    /// Whether this chain indexes a SegWit address next to the legacy one.
    pub fn has_separate_segwit_address(&self) -> bool {
        self.segwit.as_ref().is_some_and(|s| !s.send_only())
    }

    /// The legacy base58check address for a public key hash.
    pub fn legacy_address(&self, pubkeyhash: &[u8]) -> Result<String, CoinError> {
        Ok(encode_base58_address(self.address_version, pubkeyhash)?)
    }

    /// Every address this chain must index for a public key hash: the
    /// legacy form, plus the SegWit form when it is separately indexed.
    pub fn addresses_for_pubkeyhash(&self, pubkeyhash: &[u8]) -> Result<Vec<String>, CoinError> {
        let mut addresses = vec![self.legacy_address(pubkeyhash)?];
        if let Some(segwit) = &self.segwit {
            if !segwit.send_only() {
                addresses.push(segwit.encode_segwit_address(pubkeyhash)?);
            }
        }
        Ok(addresses)
    }

    /// The address handed out for receiving: the SegWit form when the chain
    /// can receive on it, otherwise legacy.
    pub fn default_receive_address(&self, pubkeyhash: &[u8]) -> Result<String, CoinError> {
        match &self.segwit {
            Some(segwit) if !segwit.send_only() => {
                Ok(segwit.encode_segwit_address(pubkeyhash)?)
            }
            _ => self.legacy_address(pubkeyhash),
        }
    }

    /// Classify an address string against this chain's parameters.
    ///
    /// Tries the legacy version byte, then the P2SH version byte, then the
    /// SegWit form; the first decode that succeeds wins.
    pub fn decode_address_and_type(
        &self,
        address: &str,
    ) -> Option<([u8; PUBKEYHASH_LEN], TxOutType)> {
        if let Ok((_, hash)) = decode_base58_address(address, Some(self.address_version)) {
            return Some((hash, TxOutType::P2PKH));
        }
        if let Ok((_, hash)) = decode_base58_address(address, Some(self.p2sh_address_version)) {
            return Some((hash, TxOutType::P2SH));
        }
        match &self.segwit {
            Some(SegwitVariant::Bech32 { prefix, .. }) => {
                if let Ok((_, hash)) = decode_bech32_address(address, Some(prefix)) {
                    return Some((hash, TxOutType::P2WPKH));
                }
            }
            Some(SegwitVariant::Base58 {
                address_version, ..
            }) => {
                if let Ok((_, hash)) = decode_base58_address(address, Some(*address_version)) {
                    return Some((hash, TxOutType::P2WPKH));
                }
            }
            None => {}
        }
        None
    }

    pub fn valid_address(&self, address: &str) -> bool {
        self.decode_address_and_type(address).is_some()
    }

    /// Encode an address of the given output type for a destination hash.
    /// Used to turn stored autopayment destinations back into strings.
    pub fn encode_address(
        &self,
        pubkeyhash: &[u8],
        txout_type: TxOutType,
    ) -> Result<String, CoinError> {
        match txout_type {
            TxOutType::P2PKH => self.legacy_address(pubkeyhash),
            TxOutType::P2SH => {
                Ok(encode_base58_address(self.p2sh_address_version, pubkeyhash)?)
            }
            TxOutType::P2WPKH => match &self.segwit {
                Some(segwit) => Ok(segwit.encode_segwit_address(pubkeyhash)?),
                None => Err(CoinError::UnsupportedOutputType(txout_type)),
            },
            TxOutType::P2WSH => Err(CoinError::UnsupportedOutputType(txout_type)),
        }
    }

    /// WIF-encode a raw private key under this chain's version byte.
    pub fn encode_private_key(&self, privkey: &[u8]) -> Result<String, CoinError> {
        Ok(encode_privkey(self.privkey_version, privkey, true)?)
    }
}

/// Endpoint and version bytes of the key seeding daemon. The keyseeder is
/// not a tracked chain: it has no ticker and no indexer database.
#[derive(Debug, Clone, Deserialize)]
pub struct Keyseeder {
    pub rpc_host: String,
    pub rpc_port: u16,
    pub address_version: u8,
    pub privkey_version: u8,
}

/// The set of configured chains. Built once at startup, read-only after.
#[derive(Debug, Clone)]
pub struct CoinRegistry {
    coins: Vec<Coin>,
}

impl CoinRegistry {
    pub fn new(coins: Vec<Coin>) -> Self {
        CoinRegistry { coins }
    }

    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    pub fn by_ticker(&self, ticker: &str) -> Result<&Coin, CoinError> {
        self.coins
            .iter()
            .find(|coin| coin.ticker.eq_ignore_ascii_case(ticker))
            .ok_or_else(|| CoinError::NotDefined(ticker.to_string()))
    }

    pub fn by_name(&self, name: &str) -> Result<&Coin, CoinError> {
        self.coins
            .iter()
            .find(|coin| coin.name == name)
            .ok_or_else(|| CoinError::NotDefined(name.to_string()))
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

    fn bech32_coin() -> Coin {
        Coin {
            name: "Garlicoin".into(),
            ticker: "GRLC".into(),
            database: "grlc".into(),
            rpc_host: "127.0.0.1".into(),
            rpc_port: 42068,
            address_version: 38,
            p2sh_address_version: 50,
            privkey_version: 176,
            segwit: Some(SegwitVariant::Bech32 {
                prefix: "grlc".into(),
                send_only: false,
            }),
            allow_tx_subsidy: true,
        }
    }

    fn plain_coin() -> Coin {
        Coin {
            name: "Tuxcoin".into(),
            ticker: "TUX".into(),
            database: "tux".into(),
            rpc_host: "127.0.0.1".into(),
            rpc_port: 42072,
            address_version: 65,
            p2sh_address_version: 64,
            privkey_version: 193,
            segwit: None,
            allow_tx_subsidy: false,
        }
    }

    fn wrapped_segwit_coin() -> Coin {
        Coin {
            segwit: Some(SegwitVariant::Base58 {
                address_version: 115,
                send_only: true,
            }),
            ..bech32_coin()
        }
    }

    #[test]
    fn legacy_address_uses_address_version() {
        let addr = bech32_coin().legacy_address(&hash()).unwrap();
        assert_eq!(addr, "GUXByHDZLvU4DnVH9imSFckt3HEQ5cFgE5");
    }

    #[test]
    fn indexed_addresses_include_bech32_form() {
        let addrs = bech32_coin().addresses_for_pubkeyhash(&hash()).unwrap();
        assert_eq!(addrs.len(), 2);
        assert!(addrs[1].starts_with("grlc1"));
    }

    #[test]
    fn indexed_addresses_skip_send_only_segwit() {
        let addrs = wrapped_segwit_coin()
            .addresses_for_pubkeyhash(&hash())
            .unwrap();
        assert_eq!(addrs.len(), 1);
    }

    #[test]
    fn indexed_addresses_without_segwit() {
        let addrs = plain_coin().addresses_for_pubkeyhash(&hash()).unwrap();
        assert_eq!(addrs.len(), 1);
    }

    #[test]
    fn default_receive_prefers_bech32() {
        let addr = bech32_coin().default_receive_address(&hash()).unwrap();
        assert!(addr.starts_with("grlc1"));
    }

    #[test]
    fn default_receive_falls_back_to_legacy() {
        let coin = wrapped_segwit_coin();
        let addr = coin.default_receive_address(&hash()).unwrap();
        assert_eq!(addr, coin.legacy_address(&hash()).unwrap());
    }

    #[test]
    fn classify_legacy_address() {
        let coin = bech32_coin();
        let addr = coin.legacy_address(&hash()).unwrap();
        assert_eq!(
            coin.decode_address_and_type(&addr),
            Some((hash(), TxOutType::P2PKH))
        );
    }

    #[test]
    fn classify_p2sh_address() {
        let coin = bech32_coin();
        let addr = coin.encode_address(&hash(), TxOutType::P2SH).unwrap();
        assert_eq!(
            coin.decode_address_and_type(&addr),
            Some((hash(), TxOutType::P2SH))
        );
    }

    #[test]
    fn classify_bech32_address() {
        let coin = bech32_coin();
        let addr = coin.default_receive_address(&hash()).unwrap();
        assert_eq!(
            coin.decode_address_and_type(&addr),
            Some((hash(), TxOutType::P2WPKH))
        );
    }

    #[test]
    fn classify_foreign_address_fails() {
        // A valid address of another chain does not classify.
        let foreign = plain_coin().legacy_address(&hash()).unwrap();
        assert_eq!(bech32_coin().decode_address_and_type(&foreign), None);
        assert!(!bech32_coin().valid_address(&foreign));
    }

    #[test]
    fn classify_garbage_fails() {
        assert_eq!(bech32_coin().decode_address_and_type("not an address"), None);
    }

    #[test]
    fn encode_address_roundtrips_every_supported_type() {
        let coin = bech32_coin();
        for t in [TxOutType::P2PKH, TxOutType::P2SH, TxOutType::P2WPKH] {
            let addr = coin.encode_address(&hash(), t).unwrap();
            assert_eq!(coin.decode_address_and_type(&addr), Some((hash(), t)));
        }
    }

    #[test]
    fn encode_address_rejects_p2wsh() {
        assert!(matches!(
            bech32_coin().encode_address(&hash(), TxOutType::P2WSH),
            Err(CoinError::UnsupportedOutputType(_))
        ));
    }

    #[test]
    fn encode_address_rejects_segwit_without_variant() {
        assert!(matches!(
            plain_coin().encode_address(&hash(), TxOutType::P2WPKH),
            Err(CoinError::UnsupportedOutputType(_))
        ));
    }

    #[test]
    fn private_key_export_uses_privkey_version() {
        let wif = bech32_coin().encode_private_key(&[1u8; 32]).unwrap();
        let (version, key, compressed) = coin_codec::decode_privkey(&wif, None).unwrap();
        assert_eq!(version, 176);
        assert_eq!(key, [1u8; 32]);
        assert!(compressed);
    }

    #[test]
    fn registry_lookup_by_ticker_is_case_insensitive() {
        let registry = CoinRegistry::new(vec![bech32_coin(), plain_coin()]);
        assert_eq!(registry.by_ticker("grlc").unwrap().ticker, "GRLC");
        assert_eq!(registry.by_ticker("TUX").unwrap().ticker, "TUX");
        assert!(matches!(
            registry.by_ticker("DOGE"),
            Err(CoinError::NotDefined(_))
        ));
    }

    #[test]
    fn registry_lookup_by_name() {
        let registry = CoinRegistry::new(vec![bech32_coin(), plain_coin()]);
        assert_eq!(registry.by_name("Tuxcoin").unwrap().ticker, "TUX");
        assert!(registry.by_name("tuxcoin").is_err());
    }

    #[test]
    fn coin_parses_from_toml() {
        let coin: Coin = toml::from_str(
            r#"
name = "Garlicoin"
ticker = "GRLC"
database = "grlc"
rpc_host = "172.0.0.1"
rpc_port = 42068
address_version = 38
p2sh_address_version = 50
privkey_version = 176
allow_tx_subsidy = true

[segwit]
type = "bech32"
prefix = "grlc"
"#,
        )
        .unwrap();
        assert!(coin.has_separate_segwit_address());
        assert!(coin.allow_tx_subsidy);
    }
}
