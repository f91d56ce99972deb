use rust_decimal::Decimal;
use sqlx::{MySql, Transaction};

use coin_codec::decode_privkey;
use coindaemon::Daemon;
use coininfo::{Coin, CoinRegistry};
use txbuilder::{SignedTransaction, UnsignedTransactionBuilder, Utxo};

use crate::config::Config;
use crate::connections::ConnectionManager;
use crate::error::WalletError;
use crate::indexer::{self, UtxoFilter};
use crate::keys;
use crate::models::{
    make_address_ref, Account, AccountAddress, AccountAddressInfo, WalletManager,
    ACCOUNT_NAME_LEN, AUTH_TOKEN_SIZE,
};

/// Addresses start consolidating once they hold at least this many
/// spendable outputs.
pub const MIN_CONSOLIDATION_UTXOS: i64 = 100;

/// Upper bound on inputs per consolidation transaction.
pub const MAX_CONSOLIDATION_UTXOS: u32 = 650;

/// How long a broadcast waits for the indexer to pick the transaction up.
pub const BROADCAST_WAIT_SECONDS: u64 = 10;

/// Everything a request needs: configuration, the read-only coin registry,
/// pools, daemons and the process-wide locks and encryption key.
pub struct AppContext {
    pub config: Config,
    pub registry: CoinRegistry,
    pub connections: ConnectionManager,
    pub encryption_key: [u8; 16],
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self, WalletError> {
        let encryption_key = config.encryption_key_bytes()?;
        let registry = CoinRegistry::new(config.coins.clone());
        let connections = ConnectionManager::new(
            config.database.clone(),
            config.coindaemon_credentials.clone(),
            config.keyseeder_credentials.clone(),
            config.keyseeder.clone(),
        );
        Ok(AppContext {
            config,
            registry,
            connections,
            encryption_key,
        })
    }
}

enum KeySource {
    /// Fresh key pair from the keyseeder daemon.
    Generate,
    /// User-supplied WIF key, tried against every configured chain.
    Import(String),
}

/// A manager's view of their accounts.
pub struct Wallet<'a> {
    pub ctx: &'a AppContext,
    pub manager: WalletManager,
}

impl<'a> Wallet<'a> {
    /// Resolve a raw bearer token to its manager. Tokens are matched by
    /// double-SHA256; anything but a 64-byte token can never match.
    pub async fn authenticate(
        ctx: &'a AppContext,
        raw_token: &[u8],
    ) -> Result<Option<Wallet<'a>>, WalletError> {
        if raw_token.len() != AUTH_TOKEN_SIZE {
            return Ok(None);
        }
        let hash = keys::token_hash(raw_token);
        let pool = ctx.connections.wallet_pool().await?;
        let manager = sqlx::query_as::<_, WalletManager>(
            "SELECT id, name, tokenhash AS token_hash FROM manager WHERE tokenhash = ?",
        )
        .bind(hash.to_vec())
        .fetch_optional(&pool)
        .await?;
        Ok(manager.map(|manager| Wallet { ctx, manager }))
    }

    pub async fn accounts(&self) -> Result<Vec<Account>, WalletError> {
        let pool = self.ctx.connections.wallet_pool().await?;
        Ok(sqlx::query_as::<_, Account>(
            "SELECT id, manager AS manager_id, user, iv, `key` AS encrypted_key, pubkeyhash \
             FROM account WHERE manager = ? ORDER BY id",
        )
        .bind(self.manager.id)
        .fetch_all(&pool)
        .await?)
    }

    pub async fn account(&self, name: &str) -> Result<Option<Account>, WalletError> {
        let pool = self.ctx.connections.wallet_pool().await?;
        Ok(sqlx::query_as::<_, Account>(
            "SELECT id, manager AS manager_id, user, iv, `key` AS encrypted_key, pubkeyhash \
             FROM account WHERE manager = ? AND user = ?",
        )
        .bind(self.manager.id)
        .bind(name)
        .fetch_optional(&pool)
        .await?)
    }

    pub async fn create_account(&self, name: &str) -> Result<Account, WalletError> {
        self.create_or_import(name, KeySource::Generate).await
    }

    pub async fn import_account(&self, name: &str, wif: &str) -> Result<Account, WalletError> {
        self.create_or_import(name, KeySource::Import(wif.to_string()))
            .await
    }

    async fn obtain_key(&self, source: &KeySource) -> Result<([u8; 32], [u8; 20]), WalletError> {
        match source {
            KeySource::Generate => {
                let daemon = self.ctx.connections.keyseeder_daemon();
                keys::generate_key(&daemon, self.ctx.connections.keyseeder()).await
            }
            KeySource::Import(wif) => {
                for coin in self.ctx.registry.coins() {
                    if let Ok((_, privkey, _)) = decode_privkey(wif, Some(coin.privkey_version)) {
                        let pubkeyhash = keys::pubkeyhash_for_privkey(&privkey)?;
                        return Ok((privkey, pubkeyhash));
                    }
                }
                Err(WalletError::KeyImport)
            }
        }
    }

    async fn create_or_import(
        &self,
        name: &str,
        source: KeySource,
    ) -> Result<Account, WalletError> {
        let _guard = self.ctx.connections.account_create_lock.lock().await;

        if name.len() > ACCOUNT_NAME_LEN {
            return Err(WalletError::InvalidAccountName(name.to_string()));
        }

        let pool = self.ctx.connections.wallet_pool().await?;
        let existing: Option<i64> =
            sqlx::query_scalar("SELECT id FROM account WHERE manager = ? AND user = ?")
                .bind(self.manager.id)
                .bind(name)
                .fetch_optional(&pool)
                .await?;
        if existing.is_some() {
            return Err(WalletError::AccountExists(name.to_string()));
        }

        let (privkey, pubkeyhash) = self.obtain_key(&source).await?;
        let iv = keys::random_iv();
        let encrypted = keys::encrypt_private_key(&self.ctx.encryption_key, &iv, &privkey)?;

        let mut wallet_tx = pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO account (manager, user, iv, `key`, pubkeyhash) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(self.manager.id)
        .bind(name)
        .bind(iv.to_vec())
        .bind(encrypted.to_vec())
        .bind(pubkeyhash.to_vec())
        .execute(&mut *wallet_tx)
        .await?;
        let account_id = result.last_insert_id() as i64;

        for coin in self.ctx.registry.coins() {
            if let Err(error) = self
                .bind_coin_addresses(&mut wallet_tx, coin, account_id, &pubkeyhash)
                .await
            {
                tracing::warn!(
                    coin = %coin.ticker,
                    account = name,
                    %error,
                    "address import failed, rolling back account creation"
                );
                wallet_tx.rollback().await?;
                return Err(error);
            }
        }
        wallet_tx.commit().await?;

        tracing::info!(account = name, manager = self.manager.id, "account created");

        let account = sqlx::query_as::<_, Account>(
            "SELECT id, manager AS manager_id, user, iv, `key` AS encrypted_key, pubkeyhash \
             FROM account WHERE id = ?",
        )
        .bind(account_id)
        .fetch_one(&pool)
        .await?;
        Ok(account)
    }

    /// Import the account's addresses into one chain's indexer and record
    /// the bindings. The indexer writes commit only when every address of
    /// the chain went through; the wallet rows ride on the caller's
    /// transaction.
    async fn bind_coin_addresses(
        &self,
        wallet_tx: &mut Transaction<'_, MySql>,
        coin: &Coin,
        account_id: i64,
        pubkeyhash: &[u8; 20],
    ) -> Result<(), WalletError> {
        let addresses = coin.addresses_for_pubkeyhash(pubkeyhash)?;
        let indexer = self.ctx.connections.indexer(coin).await?;
        let mut coin_tx = indexer.pool().begin().await?;

        for address in &addresses {
            let address_id = indexer::import_address(&mut *coin_tx, address).await?;
            sqlx::query("INSERT INTO addressbinding (account, coin, address) VALUES (?, ?, ?)")
                .bind(account_id)
                .bind(&coin.ticker)
                .bind(address_id)
                .execute(&mut **wallet_tx)
                .await?;
        }

        coin_tx.commit().await?;
        Ok(())
    }
}

/// One account's presence on one chain: its indexed addresses, balance,
/// spendable outputs and transaction flows.
pub struct AccountChain<'a> {
    pub ctx: &'a AppContext,
    pub account: &'a Account,
    pub coin: &'a Coin,
}

impl<'a> AccountChain<'a> {
    pub fn new(ctx: &'a AppContext, account: &'a Account, coin: &'a Coin) -> Self {
        AccountChain { ctx, account, coin }
    }

    fn daemon(&self) -> Daemon {
        self.ctx.connections.coindaemon(self.coin)
    }

    pub async fn bindings(&self) -> Result<Vec<AccountAddress>, WalletError> {
        let pool = self.ctx.connections.wallet_pool().await?;
        Ok(sqlx::query_as::<_, AccountAddress>(
            "SELECT id, account AS account_id, coin, address AS address_id \
             FROM addressbinding WHERE account = ? AND coin = ? ORDER BY id",
        )
        .bind(self.account.id)
        .bind(&self.coin.ticker)
        .fetch_all(&pool)
        .await?)
    }

    pub async fn address_ids(&self) -> Result<Vec<i64>, WalletError> {
        Ok(self
            .bindings()
            .await?
            .into_iter()
            .map(|binding| binding.address_id)
            .collect())
    }

    /// Resolved address details for API responses. Bindings whose address
    /// row has not been indexed yet come back with empty balances.
    pub async fn address_infos(&self) -> Result<Vec<AccountAddressInfo>, WalletError> {
        let indexer = self.ctx.connections.indexer(self.coin).await?;
        let mut infos = Vec::new();
        for binding in self.bindings().await? {
            let row = indexer.address_by_id(binding.address_id).await?;
            infos.push(match row {
                Some(row) => AccountAddressInfo {
                    coin: binding.coin.clone(),
                    href: Some(make_address_ref(
                        &self.ctx.config.indexer,
                        &binding.coin,
                        &row.address,
                    )),
                    address: Some(row.address),
                    balance: row.balance,
                    pending: row.pending,
                },
                None => AccountAddressInfo {
                    coin: binding.coin.clone(),
                    address: None,
                    balance: Decimal::ZERO,
                    pending: Decimal::ZERO,
                    href: None,
                },
            });
        }
        Ok(infos)
    }

    pub fn preferred_address(&self) -> Result<String, WalletError> {
        Ok(self
            .coin
            .default_receive_address(&self.account.pubkeyhash)?)
    }

    pub fn change_address(&self) -> Result<String, WalletError> {
        self.preferred_address()
    }

    pub async fn utxos(
        &self,
        filter: UtxoFilter,
        max_utxos: Option<u32>,
    ) -> Result<Vec<Utxo>, WalletError> {
        let indexer = self.ctx.connections.indexer(self.coin).await?;
        let address_ids = self.address_ids().await?;
        indexer.utxos(&address_ids, filter, max_utxos).await
    }

    pub async fn balance(&self, filter: UtxoFilter) -> Result<Decimal, WalletError> {
        let indexer = self.ctx.connections.indexer(self.coin).await?;
        let address_ids = self.address_ids().await?;
        indexer.balance(&address_ids, filter).await
    }

    /// Sign a built transaction via the coin daemon with the account's key.
    pub async fn sign(
        &self,
        tx: UnsignedTransactionBuilder<'_>,
    ) -> Result<SignedTransaction, WalletError> {
        let privkey = self.account.private_key(&self.ctx.encryption_key)?;
        let wif = self.coin.encode_private_key(&privkey)?;
        let signed_hex = self
            .daemon()
            .sign_raw_transaction_with_key(&tx.raw_hex(), &[wif])
            .await?;
        Ok(SignedTransaction::new(tx, signed_hex)?)
    }

    /// Submit a signed transaction. With `wait_until_seen` the call polls
    /// the indexer for up to ten seconds and fails when the transaction
    /// never shows up there.
    pub async fn broadcast(
        &self,
        signed: &SignedTransaction,
        wait_until_seen: bool,
    ) -> Result<String, WalletError> {
        let txid = self.daemon().send_raw_transaction(&signed.hex).await?;
        tracing::info!(coin = %self.coin.ticker, %txid, fee = %signed.fee, "broadcast");

        if wait_until_seen {
            let indexer = self.ctx.connections.indexer(self.coin).await?;
            let mut seen = false;
            for _ in 0..BROADCAST_WAIT_SECONDS {
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                if indexer.transaction_exists(&txid).await? {
                    seen = true;
                    break;
                }
            }
            if !seen {
                return Err(WalletError::TransactionNotSeen(txid));
            }
        }
        Ok(txid)
    }

    /// Build, fund and sign a payment to one destination. UTXO selection
    /// and funding run under the tx-create lock so concurrent sends cannot
    /// pick the same outputs.
    pub async fn send(
        &self,
        destination_address: &str,
        amount: Decimal,
        spend_unconfirmed: bool,
        subsidized: bool,
    ) -> Result<SignedTransaction, WalletError> {
        let return_address = self.change_address()?;
        let mut tx = UnsignedTransactionBuilder::for_coin(self.coin, subsidized);
        tx.add_output(destination_address, amount)?;

        {
            let _guard = self.ctx.connections.tx_create_lock.lock().await;
            let filter = if spend_unconfirmed {
                UtxoFilter::unconfirmed()
            } else {
                UtxoFilter::confirmed()
            };
            let utxos = self.utxos(filter, None).await?;
            tx.fund_transaction(&utxos, &return_address)?;
        }

        self.sign(tx).await
    }

    /// Collapse the account's fragmented outputs on this chain into a
    /// single one at the change address, broadcasting immediately.
    pub async fn consolidate(&self, subsidized: bool) -> Result<String, WalletError> {
        let destination = self.change_address()?;
        let mut tx = UnsignedTransactionBuilder::for_coin(self.coin, subsidized);

        let utxos = self
            .utxos(UtxoFilter::confirmed(), Some(MAX_CONSOLIDATION_UTXOS))
            .await?;
        for utxo in &utxos {
            tx.add_input(utxo)?;
        }
        tx.add_return_output(&destination)?;

        let signed = self.sign(tx).await?;
        self.broadcast(&signed, false).await
    }
}
