use serde::{Deserialize, Serialize};

/// Transaction output script types tracked by the indexer.
///
/// The discriminants are the indexer database's `type_id` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxOutType {
    P2PKH = 1,
    P2SH = 2,
    P2WPKH = 3,
    P2WSH = 4,
}

impl TxOutType {
    pub fn type_id(self) -> i32 {
        self as i32
    }

    pub fn from_type_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(TxOutType::P2PKH),
            2 => Some(TxOutType::P2SH),
            3 => Some(TxOutType::P2WPKH),
            4 => Some(TxOutType::P2WSH),
            _ => None,
        }
    }

    /// Whether spending an output of this type adds a witness section.
    pub fn is_segwit(self) -> bool {
        matches!(self, TxOutType::P2WPKH | TxOutType::P2WSH)
    }

    /// Estimated virtual size of a signed input spending this output type.
    /// Only types the wallet itself can own have an estimate.
    pub fn input_vsize(self) -> Option<u32> {
        match self {
            TxOutType::P2PKH => Some(149),
            TxOutType::P2WPKH => Some(68),
            _ => None,
        }
    }

    /// Length of the destination hash carried in the output script.
    pub fn hash_len(self) -> usize {
        match self {
            TxOutType::P2WSH => 32,
            _ => 20,
        }
    }
}

impl std::fmt::Display for TxOutType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TxOutType::P2PKH => "p2pkh",
            TxOutType::P2SH => "p2sh",
            TxOutType::P2WPKH => "p2wpkh",
            TxOutType::P2WSH => "p2wsh",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_ids_roundtrip() {
        for t in [
            TxOutType::P2PKH,
            TxOutType::P2SH,
            TxOutType::P2WPKH,
            TxOutType::P2WSH,
        ] {
            assert_eq!(TxOutType::from_type_id(t.type_id()), Some(t));
        }
        assert_eq!(TxOutType::from_type_id(0), None);
        assert_eq!(TxOutType::from_type_id(99), None);
    }

    #[test]
    fn segwit_classification() {
        assert!(!TxOutType::P2PKH.is_segwit());
        assert!(!TxOutType::P2SH.is_segwit());
        assert!(TxOutType::P2WPKH.is_segwit());
        assert!(TxOutType::P2WSH.is_segwit());
    }

    #[test]
    fn input_vsizes() {
        assert_eq!(TxOutType::P2PKH.input_vsize(), Some(149));
        assert_eq!(TxOutType::P2WPKH.input_vsize(), Some(68));
        assert_eq!(TxOutType::P2SH.input_vsize(), None);
        assert_eq!(TxOutType::P2WSH.input_vsize(), None);
    }

    #[test]
    fn hash_lengths() {
        assert_eq!(TxOutType::P2PKH.hash_len(), 20);
        assert_eq!(TxOutType::P2WSH.hash_len(), 32);
    }
}
