//! Core of the custodial multi-coin wallet.
//!
//! Owns the persistent model (managers, accounts, address bindings,
//! automatic payments), the per-chain UTXO queries against the indexer
//! databases, account lifecycle, payment and consolidation flows, and the
//! block-triggered background processor.

pub mod autopay;
pub mod background;
pub mod config;
pub mod connections;
pub mod error;
pub mod indexer;
pub mod keys;
pub mod models;
pub mod wallet;

pub use config::Config;
pub use error::WalletError;
pub use wallet::{AccountChain, AppContext, Wallet};
