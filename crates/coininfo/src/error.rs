use thiserror::Error;

use crate::txout::TxOutType;

/// Coin lookup and address handling errors.
#[derive(Debug, Error)]
pub enum CoinError {
    #[error("coin not defined: {0}")]
    NotDefined(String),

    #[error("no address form for output type {0}")]
    UnsupportedOutputType(TxOutType),

    #[error(transparent)]
    Codec(#[from] coin_codec::CodecError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_not_defined() {
        let err = CoinError::NotDefined("DOGE".into());
        assert_eq!(err.to_string(), "coin not defined: DOGE");
    }

    #[test]
    fn codec_errors_pass_through() {
        let err: CoinError = coin_codec::CodecError::BadPrefix.into();
        assert_eq!(err.to_string(), "invalid bech32 prefix");
    }
}
