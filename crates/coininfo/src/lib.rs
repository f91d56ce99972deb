//! Per-chain parameters and address handling.
//!
//! Every supported chain is described by a [`Coin`]: version bytes for the
//! legacy and P2SH address forms, the WIF version byte, the SegWit flavour
//! (if any) and daemon/indexer endpoints. The [`CoinRegistry`] is built once
//! from configuration and read-only afterwards.

pub mod coin;
pub mod error;
pub mod segwit;
pub mod txout;

pub use coin::{Coin, CoinRegistry, Keyseeder};
pub use error::CoinError;
pub use segwit::SegwitVariant;
pub use txout::TxOutType;
