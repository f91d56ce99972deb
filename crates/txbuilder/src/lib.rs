//! Unsigned transaction construction for UTXO chains.
//!
//! Assembles output scripts from raw opcodes, serializes inputs and outputs
//! in wire format, estimates virtual sizes, and funds transactions from a
//! candidate UTXO set under the wallet's fee sanity rules.

pub mod builder;
pub mod encode;
pub mod error;
pub mod opcodes;
pub mod script;
pub mod signed;

pub use builder::{TransactionInput, TransactionOutput, UnsignedTransactionBuilder, Utxo};
pub use error::TxBuildError;
pub use signed::SignedTransaction;

use rust_decimal::Decimal;

/// Fee rate charged for ordinary payments, per 1000 bytes.
pub const FEERATE_NETWORK: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Reduced fee rate for operator-initiated transactions on chains that
/// permit it, per 1000 bytes.
pub const FEERATE_SUBSIDY: Decimal = Decimal::from_parts(5, 0, 0, false, 5);

/// Outputs below this amount are treated as dust.
pub const DUST_LIMIT: Decimal = Decimal::from_parts(5, 0, 0, false, 4);
