use thiserror::Error;

/// Daemon RPC failures.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("rpc transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("daemon error {code}: {message}")]
    Daemon { code: i64, message: String },

    #[error("unexpected rpc response: {0}")]
    BadResponse(String),

    #[error("daemon could not completely sign the transaction")]
    IncompleteSignature,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_daemon_error() {
        let err = RpcError::Daemon {
            code: -26,
            message: "txn-mempool-conflict".into(),
        };
        assert_eq!(err.to_string(), "daemon error -26: txn-mempool-conflict");
    }
}
