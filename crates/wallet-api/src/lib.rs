//! HTTP surface of the wallet: bearer-token authentication, account and
//! autopayment CRUD, and the send endpoint, all mapped onto the wallet
//! core. Runs next to the background worker binary.

pub mod auth;
pub mod error;
pub mod requests;
pub mod routes;

pub use error::ApiError;
pub use routes::router;
