use rust_decimal::Decimal;
use thiserror::Error;

use coininfo::TxOutType;

/// Transaction assembly and funding errors.
#[derive(Debug, Error)]
pub enum TxBuildError {
    #[error("hash {0} invalid for transaction output type {1}")]
    InvalidHash(String, TxOutType),

    #[error("unsupported transaction output type {0}")]
    UnsupportedOutputType(TxOutType),

    #[error("undecodable destination address: {0}")]
    InvalidAddress(String),

    #[error("invalid transaction id: {0}")]
    InvalidTxid(String),

    #[error("need at least {needed} for outputs and fees, got only {available} in funds")]
    NotEnoughCoins { needed: Decimal, available: Decimal },

    #[error("change output would leave the fee outside its sanity bounds")]
    FeeCalculation,

    #[error("signed transaction is not valid hex: {0}")]
    BadSignedBlob(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn display_not_enough_coins() {
        let err = TxBuildError::NotEnoughCoins {
            needed: dec!(0.5002),
            available: dec!(0.1),
        };
        assert_eq!(
            err.to_string(),
            "need at least 0.5002 for outputs and fees, got only 0.1 in funds"
        );
    }

    #[test]
    fn display_invalid_hash() {
        let err = TxBuildError::InvalidHash("abcd".into(), TxOutType::P2WPKH);
        assert_eq!(
            err.to_string(),
            "hash abcd invalid for transaction output type p2wpkh"
        );
    }
}
