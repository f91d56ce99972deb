use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::RpcError;

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SignRawTransactionResult {
    hex: String,
    complete: bool,
}

/// A coin daemon (or keyseeder) endpoint.
#[derive(Debug, Clone)]
pub struct Daemon {
    client: reqwest::Client,
    url: String,
    username: String,
    password: String,
}

impl Daemon {
    pub fn new(host: &str, port: u16, username: &str, password: &str) -> Self {
        Daemon {
            client: reqwest::Client::new(),
            url: format!("http://{host}:{port}/"),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RpcError> {
        let body = json!({
            "jsonrpc": "1.0",
            "id": "wallet",
            "method": method,
            "params": params,
        });

        let response: RpcResponse<T> = self
            .client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(RpcError::Daemon {
                code: error.code,
                message: error.message,
            });
        }
        response
            .result
            .ok_or_else(|| RpcError::BadResponse(format!("{method}: no result and no error")))
    }

    /// Ask the daemon's wallet for a fresh address. Only used against the
    /// keyseeder.
    pub async fn get_new_address(&self) -> Result<String, RpcError> {
        self.call("getnewaddress", json!([])).await
    }

    /// Export the private key behind an address in WIF. Only used against
    /// the keyseeder.
    pub async fn dump_privkey(&self, address: &str) -> Result<String, RpcError> {
        self.call("dumpprivkey", json!([address])).await
    }

    /// Sign a raw transaction with explicitly supplied WIF keys. Fails when
    /// the daemon reports the signature set as incomplete.
    pub async fn sign_raw_transaction_with_key(
        &self,
        raw_tx_hex: &str,
        privkeys: &[String],
    ) -> Result<String, RpcError> {
        let result: SignRawTransactionResult = self
            .call("signrawtransactionwithkey", json!([raw_tx_hex, privkeys]))
            .await?;
        if !result.complete {
            return Err(RpcError::IncompleteSignature);
        }
        Ok(result.hex)
    }

    /// Submit a signed transaction; returns the txid.
    pub async fn send_raw_transaction(&self, signed_tx_hex: &str) -> Result<String, RpcError> {
        self.call("sendrawtransaction", json!([signed_tx_hex])).await
    }

    /// Txids currently queued in the daemon's mempool.
    pub async fn get_raw_mempool(&self) -> Result<Vec<String>, RpcError> {
        self.call("getrawmempool", json!([])).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_with_result_parses() {
        let response: RpcResponse<String> =
            serde_json::from_str(r#"{"result": "abcd", "error": null, "id": "wallet"}"#).unwrap();
        assert_eq!(response.result.as_deref(), Some("abcd"));
        assert!(response.error.is_none());
    }

    #[test]
    fn response_with_error_parses() {
        let response: RpcResponse<String> = serde_json::from_str(
            r#"{"result": null, "error": {"code": -8, "message": "bad params"}, "id": "wallet"}"#,
        )
        .unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -8);
        assert_eq!(error.message, "bad params");
    }

    #[test]
    fn sign_result_parses() {
        let result: SignRawTransactionResult =
            serde_json::from_str(r#"{"hex": "0200", "complete": true}"#).unwrap();
        assert!(result.complete);
        assert_eq!(result.hex, "0200");
    }

    #[test]
    fn mempool_parses_as_txid_list() {
        let response: RpcResponse<Vec<String>> =
            serde_json::from_str(r#"{"result": ["aa", "bb"], "error": null}"#).unwrap();
        assert_eq!(response.result.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unreachable_daemon_is_a_transport_error() {
        // Nothing listens on this port.
        let daemon = Daemon::new("127.0.0.1", 1, "rpc", "rpcpassword");
        let err = daemon.get_raw_mempool().await.unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }
}
