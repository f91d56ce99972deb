use chrono::{Duration, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use coininfo::TxOutType;

use crate::config::IndexerConfig;
use crate::error::WalletError;
use crate::keys;

/// Raw bearer tokens are exactly this many bytes.
pub const AUTH_TOKEN_SIZE: usize = 64;

/// Maximum UTF-8 length of an account name.
pub const ACCOUNT_NAME_LEN: usize = 64;

/// Smallest accepted autopayment interval, in seconds.
pub const MIN_PAYMENT_INTERVAL: i64 = 60;

/// Largest accepted autopayment interval: ten years, in seconds.
pub const MAX_PAYMENT_INTERVAL: i64 = 315_360_000;

/// An API client owning a set of custodial accounts.
#[derive(Debug, Clone, FromRow)]
pub struct WalletManager {
    pub id: i64,
    pub name: String,
    /// SHA256(SHA256(raw token)); the raw token is never stored.
    pub token_hash: Vec<u8>,
}

/// A custodial user under a manager. One flat secp256k1 key, reused on
/// every configured chain.
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: i64,
    pub manager_id: i64,
    pub user: String,
    pub iv: Vec<u8>,
    pub encrypted_key: Vec<u8>,
    pub pubkeyhash: Vec<u8>,
}

impl Account {
    /// Decrypt the stored key with the process-wide encryption key.
    pub fn private_key(&self, encryption_key: &[u8; 16]) -> Result<[u8; 32], WalletError> {
        let iv: [u8; 16] = self
            .iv
            .as_slice()
            .try_into()
            .map_err(|_| WalletError::CorruptKey(self.id))?;
        let encrypted: [u8; 32] = self
            .encrypted_key
            .as_slice()
            .try_into()
            .map_err(|_| WalletError::CorruptKey(self.id))?;
        keys::decrypt_private_key(encryption_key, &iv, &encrypted)
    }

}

/// Binding of an account to one indexer address row on one chain. The
/// referenced row may not exist yet; accessors resolve it on demand.
#[derive(Debug, Clone, FromRow)]
pub struct AccountAddress {
    pub id: i64,
    pub account_id: i64,
    pub coin: String,
    pub address_id: i64,
}

/// Resolved view of an [`AccountAddress`] for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct AccountAddressInfo {
    pub coin: String,
    pub address: Option<String>,
    pub balance: Decimal,
    pub pending: Decimal,
    pub href: Option<String>,
}

/// What an automatic payment does when it fires, encoded in the sign of
/// the stored amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PaymentKind {
    /// Pay out exactly `amount` each time.
    Standard { amount: Decimal },
    /// Sweep the account, leaving at most `amountToKeep` behind.
    ZeroBalance {
        #[serde(rename = "amountToKeep")]
        amount_to_keep: Decimal,
    },
}

impl PaymentKind {
    pub fn from_amount(amount: Decimal) -> Self {
        if amount > Decimal::ZERO {
            PaymentKind::Standard { amount }
        } else {
            PaymentKind::ZeroBalance {
                amount_to_keep: -amount,
            }
        }
    }

    /// The database encoding: positive for standard payments, negated
    /// keep-amount for zero-balance payments.
    pub fn signed_amount(&self) -> Decimal {
        match self {
            PaymentKind::Standard { amount } => *amount,
            PaymentKind::ZeroBalance { amount_to_keep } => -*amount_to_keep,
        }
    }
}

/// Force a payment interval into its accepted range. Zero means "never
/// repeat" and pins to the maximum.
pub fn clamp_payment_interval(interval: i64) -> i64 {
    let mut interval = interval;
    if interval == 0 || interval > MAX_PAYMENT_INTERVAL {
        interval = MAX_PAYMENT_INTERVAL;
    }
    if interval < MIN_PAYMENT_INTERVAL {
        interval = MIN_PAYMENT_INTERVAL;
    }
    interval
}

/// A recurring payment rule owned by an account.
#[derive(Debug, Clone, FromRow)]
pub struct AutomaticPayment {
    pub id: i64,
    pub account_id: i64,
    pub coin: String,
    /// Destination hash; the address form is rebuilt from it and
    /// `txout_type_id` when the payment runs.
    pub pubkeyhash: Vec<u8>,
    pub txout_type_id: i32,
    pub amount: Decimal,
    pub interval: i64,
    pub nextpayment: NaiveDateTime,
}

impl AutomaticPayment {
    pub fn kind(&self) -> PaymentKind {
        PaymentKind::from_amount(self.amount)
    }

    pub fn txout_type(&self) -> Result<TxOutType, WalletError> {
        TxOutType::from_type_id(self.txout_type_id).ok_or_else(|| {
            WalletError::Indexer(format!("unknown txout type id {}", self.txout_type_id))
        })
    }

    /// Force the interval into its accepted range.
    pub fn clamp_interval(&mut self) {
        self.interval = clamp_payment_interval(self.interval);
    }

    /// Step `nextpayment` forward in whole intervals until it is strictly
    /// in the future.
    pub fn advance_nextpayment(&mut self, now: NaiveDateTime) {
        let delta = Duration::seconds(self.interval);
        while self.nextpayment <= now {
            self.nextpayment += delta;
        }
    }
}

/// Link to an object in the indexer's public API.
pub fn make_indexer_ref(
    indexer: &IndexerConfig,
    ticker: &str,
    object_path: &str,
    object_id: &str,
) -> String {
    format!(
        "{}/{}{}/{}/",
        indexer.api_endpoint,
        ticker.to_lowercase(),
        object_path,
        object_id
    )
}

pub fn make_address_ref(indexer: &IndexerConfig, ticker: &str, address: &str) -> String {
    make_indexer_ref(indexer, ticker, &indexer.address_path, address)
}

pub fn make_tx_ref(indexer: &IndexerConfig, ticker: &str, txid: &str) -> String {
    make_indexer_ref(indexer, ticker, &indexer.transaction_path, txid)
}
