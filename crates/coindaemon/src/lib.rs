//! JSON-RPC client for coin daemons.
//!
//! Speaks the Bitcoin-style JSON-RPC 1.0 dialect over HTTP Basic auth. The
//! same client serves the per-chain daemons and the keyseeder; only the
//! endpoint and credentials differ.

pub mod client;
pub mod error;

pub use client::Daemon;
pub use error::RpcError;
