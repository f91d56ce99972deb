use rust_decimal::Decimal;
use serde::Deserialize;

use wallet_core::models::PaymentKind;

/// Where a payment goes: a literal address, or another account under the
/// same manager (optionally created on the fly).
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Destination {
    Address {
        address: String,
    },
    Account {
        user: String,
        #[serde(default, rename = "allowCreateNew")]
        allow_create_new: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Body of `POST /accounts/{user}/send/`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendRequest {
    pub coin: String,
    pub amount: Decimal,
    #[serde(default)]
    pub priority: Priority,
    pub destination: Destination,
}

impl SendRequest {
    /// Low-priority sends may ride the subsidized fee rate.
    pub fn subsidized(&self) -> bool {
        self.priority == Priority::Low
    }
}

/// Body of `POST /accounts/{user}/`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountRequest {
    pub user: String,
    /// When present, the account is imported from this WIF key instead of
    /// seeding a fresh one.
    pub privkey: Option<String>,
}

/// One autopayment rule as submitted over the API.
#[derive(Debug, Clone, Deserialize)]
pub struct AutoPaymentRequest {
    pub address: String,
    pub payment: PaymentKind,
    pub interval: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn address_destination_parses() {
        let dest: Destination = serde_json::from_str(
            r#"{"type": "address", "address": "GUXByHDZLvU4DnVH9imSFckt3HEQ5cFgE5"}"#,
        )
        .unwrap();
        assert_eq!(
            dest,
            Destination::Address {
                address: "GUXByHDZLvU4DnVH9imSFckt3HEQ5cFgE5".into()
            }
        );
    }

    #[test]
    fn account_destination_parses_with_default_create_flag() {
        let dest: Destination =
            serde_json::from_str(r#"{"type": "account", "user": "bob"}"#).unwrap();
        assert_eq!(
            dest,
            Destination::Account {
                user: "bob".into(),
                allow_create_new: false
            }
        );

        let dest: Destination = serde_json::from_str(
            r#"{"type": "account", "user": "bob", "allowCreateNew": true}"#,
        )
        .unwrap();
        assert_eq!(
            dest,
            Destination::Account {
                user: "bob".into(),
                allow_create_new: true
            }
        );
    }

    #[test]
    fn unknown_destination_type_is_rejected() {
        let result: Result<Destination, _> =
            serde_json::from_str(r#"{"type": "lightning", "invoice": "lnbc..."}"#);
        assert!(result.is_err());
    }

    #[test]
    fn send_request_parses_with_default_priority() {
        let request: SendRequest = serde_json::from_str(
            r#"{
                "coin": "grlc",
                "amount": "0.5",
                "destination": {"type": "account", "user": "bob"}
            }"#,
        )
        .unwrap();
        assert_eq!(request.priority, Priority::Normal);
        assert!(!request.subsidized());
        assert_eq!(request.amount, dec!(0.5));
    }

    #[test]
    fn low_priority_enables_the_subsidy() {
        let request: SendRequest = serde_json::from_str(
            r#"{
                "coin": "GRLC",
                "amount": 1,
                "priority": "low",
                "destination": {"type": "address", "address": "x"}
            }"#,
        )
        .unwrap();
        assert!(request.subsidized());
    }

    #[test]
    fn invalid_priority_is_rejected() {
        let result: Result<SendRequest, _> = serde_json::from_str(
            r#"{
                "coin": "GRLC",
                "amount": 1,
                "priority": "urgent",
                "destination": {"type": "address", "address": "x"}
            }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn autopayment_request_parses_both_kinds() {
        let request: AutoPaymentRequest = serde_json::from_str(
            r#"{
                "address": "GUXByHDZLvU4DnVH9imSFckt3HEQ5cFgE5",
                "payment": {"type": "standard", "amount": 2},
                "interval": 3600
            }"#,
        )
        .unwrap();
        assert_eq!(request.payment.signed_amount(), dec!(2));

        let request: AutoPaymentRequest = serde_json::from_str(
            r#"{
                "address": "GUXByHDZLvU4DnVH9imSFckt3HEQ5cFgE5",
                "payment": {"type": "zero-balance", "amountToKeep": 3},
                "interval": 86400
            }"#,
        )
        .unwrap();
        assert_eq!(request.payment.signed_amount(), dec!(-3));
    }
}
