use std::collections::HashMap;

use sqlx::mysql::MySqlPool;
use tokio::sync::Mutex;

use coindaemon::Daemon;
use coininfo::{Coin, Keyseeder};

use crate::config::{Credentials, DatabaseConfig};
use crate::error::WalletError;
use crate::indexer::IndexerDb;

/// Owns the database pools and daemon endpoints, plus the two process-wide
/// locks wallet flows serialize on.
///
/// Pools are created lazily, one per database name, and shared from then
/// on; sessions are per-request via sqlx's internal pooling.
pub struct ConnectionManager {
    database: DatabaseConfig,
    coindaemon_credentials: Credentials,
    keyseeder_credentials: Credentials,
    keyseeder: Keyseeder,
    pools: Mutex<HashMap<String, MySqlPool>>,
    /// Serializes the whole account create/import flow.
    pub account_create_lock: Mutex<()>,
    /// Serializes UTXO selection and funding of concurrent sends.
    pub tx_create_lock: Mutex<()>,
}

impl ConnectionManager {
    pub fn new(
        database: DatabaseConfig,
        coindaemon_credentials: Credentials,
        keyseeder_credentials: Credentials,
        keyseeder: Keyseeder,
    ) -> Self {
        ConnectionManager {
            database,
            coindaemon_credentials,
            keyseeder_credentials,
            keyseeder,
            pools: Mutex::new(HashMap::new()),
            account_create_lock: Mutex::new(()),
            tx_create_lock: Mutex::new(()),
        }
    }

    async fn pool(&self, database: &str) -> Result<MySqlPool, WalletError> {
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(database) {
            return Ok(pool.clone());
        }
        let pool = MySqlPool::connect_lazy(&self.database.url(database))?;
        pools.insert(database.to_string(), pool.clone());
        Ok(pool)
    }

    /// The wallet's own database.
    pub async fn wallet_pool(&self) -> Result<MySqlPool, WalletError> {
        self.pool(&self.database.wallet_db).await
    }

    /// A chain's indexer database.
    pub async fn indexer(&self, coin: &Coin) -> Result<IndexerDb, WalletError> {
        Ok(IndexerDb::new(self.pool(&coin.database).await?))
    }

    /// Name of the wallet database, for queries that join across schemas.
    pub fn wallet_db_name(&self) -> &str {
        &self.database.wallet_db
    }

    pub fn coindaemon(&self, coin: &Coin) -> Daemon {
        Daemon::new(
            &coin.rpc_host,
            coin.rpc_port,
            &self.coindaemon_credentials.username,
            &self.coindaemon_credentials.password,
        )
    }

    pub fn keyseeder_daemon(&self) -> Daemon {
        Daemon::new(
            &self.keyseeder.rpc_host,
            self.keyseeder.rpc_port,
            &self.keyseeder_credentials.username,
            &self.keyseeder_credentials.password,
        )
    }

    pub fn keyseeder(&self) -> &Keyseeder {
        &self.keyseeder
    }
}
