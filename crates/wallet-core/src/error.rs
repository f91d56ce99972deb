use rust_decimal::Decimal;
use thiserror::Error;

/// Errors surfaced by wallet operations and the background processor.
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid account name: {0:?}")]
    InvalidAccountName(String),

    #[error("account already exists: {0}")]
    AccountExists(String),

    #[error("unknown account: {0}")]
    UnknownAccount(String),

    #[error("could not decode private key against any configured chain")]
    KeyImport,

    #[error("stored key material for account {0} is corrupt")]
    CorruptKey(i64),

    #[error("need at least {needed} for outputs and fees, got only {available} in funds")]
    NotEnoughCoins { needed: Decimal, available: Decimal },

    #[error("transaction {0} was not seen on the network in time")]
    TransactionNotSeen(String),

    #[error("indexer returned unusable data: {0}")]
    Indexer(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Codec(#[from] coin_codec::CodecError),

    #[error(transparent)]
    Coin(#[from] coininfo::CoinError),

    #[error(transparent)]
    Build(#[from] txbuilder::TxBuildError),

    #[error(transparent)]
    Rpc(#[from] coindaemon::RpcError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_variants() {
        assert_eq!(
            WalletError::AccountExists("alice".into()).to_string(),
            "account already exists: alice"
        );
        assert_eq!(
            WalletError::TransactionNotSeen("abcd".into()).to_string(),
            "transaction abcd was not seen on the network in time"
        );
    }

    #[test]
    fn builder_errors_convert() {
        let err: WalletError = txbuilder::TxBuildError::FeeCalculation.into();
        assert!(matches!(err, WalletError::Build(_)));
    }
}
