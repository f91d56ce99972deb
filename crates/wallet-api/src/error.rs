use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use wallet_core::WalletError;

/// An API-level error: an HTTP status plus the `{code, error:{type,
/// message}}` envelope every failure is reported in.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_type: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error_type: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            error_type,
            message: message.into(),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "AuthenticationError",
            "missing or invalid bearer token",
        )
    }

    pub fn bad_request(error_type: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_type, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "UnknownResource", message)
    }
}

impl From<WalletError> for ApiError {
    fn from(error: WalletError) -> Self {
        use txbuilder::TxBuildError;

        let message = error.to_string();
        match error {
            WalletError::InvalidAccountName(_) => {
                Self::bad_request("InvalidAccountName", message)
            }
            WalletError::AccountExists(_) => Self::bad_request("AccountExists", message),
            WalletError::UnknownAccount(_) => Self::not_found(message),
            WalletError::KeyImport => Self::bad_request("InvalidEncoding", message),
            WalletError::NotEnoughCoins { .. } => Self::bad_request("NotEnoughCoins", message),
            WalletError::Codec(_) => Self::bad_request("InvalidEncoding", message),
            WalletError::Coin(coininfo::CoinError::NotDefined(_)) => {
                Self::bad_request("CoinNotDefined", message)
            }
            WalletError::Coin(_) => Self::bad_request("InvalidEncoding", message),
            WalletError::Build(TxBuildError::InvalidAddress(_)) => {
                Self::bad_request("InvalidEncoding", message)
            }
            WalletError::Build(TxBuildError::NotEnoughCoins { .. }) => {
                Self::bad_request("NotEnoughCoins", message)
            }
            WalletError::TransactionNotSeen(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "TransactionNotSeen",
                message,
            ),
            _ => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "InternalError", message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "code": self.status.as_u16(),
            "error": {
                "type": self.error_type,
                "message": self.message,
            },
        });
        (self.status, Json(body)).into_response()
    }
}
