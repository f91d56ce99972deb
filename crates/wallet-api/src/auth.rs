use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use wallet_core::models::{WalletManager, AUTH_TOKEN_SIZE};
use wallet_core::{AppContext, Wallet};

use crate::error::ApiError;

/// Pull the raw token out of an `Authorization: Bearer <base64>` header.
/// Anything malformed, and any token that is not exactly 64 bytes, is
/// rejected outright.
pub fn parse_bearer_token(header: &str) -> Option<Vec<u8>> {
    let mut parts = header.split(' ');
    let scheme = parts.next()?;
    let encoded = parts.next()?;
    if scheme != "Bearer" || parts.next().is_some() {
        return None;
    }

    let token = BASE64.decode(encoded).ok()?;
    if token.len() != AUTH_TOKEN_SIZE {
        return None;
    }
    Some(token)
}

/// The authenticated manager of a request.
pub struct AuthedManager(pub WalletManager);

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for AuthedManager {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(ApiError::unauthorized)?;
        let token = parse_bearer_token(header).ok_or_else(ApiError::unauthorized)?;

        let wallet = Wallet::authenticate(state, &token)
            .await
            .map_err(ApiError::from)?;
        match wallet {
            Some(wallet) => Ok(AuthedManager(wallet.manager)),
            None => Err(ApiError::unauthorized()),
        }
    }
}
