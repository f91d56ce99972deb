use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use coininfo::Coin;

use crate::autopay;
use crate::error::WalletError;
use crate::models::{Account, AutomaticPayment};
use crate::wallet::{AccountChain, AppContext, MIN_CONSOLIDATION_UTXOS};

/// Ceiling on wallet-created transactions sitting in a daemon's mempool.
pub const MAX_QUEUED_TXS: i64 = 8;

/// How often the worker looks for new blocks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Minimum spacing between two full runs for the same chain.
pub const RUN_COOLDOWN: Duration = Duration::from_secs(60);

/// Per-chain memory of the worker: the last block hash it reacted to and
/// when it last did a full run.
#[derive(Debug, Default)]
pub struct CoinState {
    lastcheck: Option<Instant>,
    pub lastblockhash: Vec<u8>,
}

impl CoinState {
    pub fn new() -> Self {
        CoinState::default()
    }

    /// Remember a new tip hash. Returns whether a full run is due, i.e.
    /// the cooldown since the previous run has passed; the hash is
    /// remembered either way.
    pub fn update(&mut self, blockhash: &[u8]) -> bool {
        self.lastblockhash = blockhash.to_vec();

        let now = Instant::now();
        if let Some(lastcheck) = self.lastcheck {
            if now.duration_since(lastcheck) < RUN_COOLDOWN {
                return false;
            }
        }
        self.lastcheck = Some(now);
        true
    }
}

/// The block-triggered worker: consolidates fragmented addresses first,
/// then executes due automatic payments, per chain and bounded by the
/// daemon's mempool budget.
pub struct BackgroundProcessor {
    ctx: Arc<AppContext>,
    states: HashMap<String, CoinState>,
}

impl BackgroundProcessor {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        BackgroundProcessor {
            ctx,
            states: HashMap::new(),
        }
    }

    /// Run until the process is told to shut down. A signal only wins the
    /// race while the worker is idle, so a running pass always finishes.
    pub async fn run(&mut self) {
        let mut ticker = tokio::time::interval(POLL_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = &mut shutdown => {
                    tracing::info!("shutting down background processor");
                    return;
                }
            }
        }
    }

    /// One poll over every configured chain. A chain's failure is logged
    /// and does not stop the others.
    pub async fn tick(&mut self) {
        let ctx = self.ctx.clone();
        for coin in ctx.registry.coins() {
            if let Err(error) = self.process_coin(coin).await {
                tracing::warn!(coin = %coin.ticker, %error, "background pass failed");
            }
        }
    }

    async fn process_coin(&mut self, coin: &Coin) -> Result<(), WalletError> {
        let indexer = self.ctx.connections.indexer(coin).await?;
        let Some(tip) = indexer.tip().await? else {
            return Ok(());
        };

        let state = self.states.entry(coin.ticker.clone()).or_default();
        if tip.hash == state.lastblockhash {
            return Ok(());
        }

        tracing::info!(coin = %coin.ticker, height = tip.height, hash = %hex::encode(&tip.hash), "new block");
        if !state.update(&tip.hash) {
            tracing::info!(coin = %coin.ticker, "skipping run, too soon");
            return Ok(());
        }

        let mempool_size = self.ctx.connections.coindaemon(coin).get_raw_mempool().await?.len() as i64;
        let max_work = MAX_QUEUED_TXS - mempool_size;
        if max_work <= 0 {
            tracing::info!(coin = %coin.ticker, mempool_size, "skipping run, mempool full");
            return Ok(());
        }

        tracing::info!(coin = %coin.ticker, mempool_size, max_work, "starting background pass");
        let remaining = self.consolidate_for_coin(coin, max_work).await?;
        if remaining > 0 {
            self.run_automatic_payments(coin, remaining).await?;
        }
        tracing::info!(coin = %coin.ticker, "background pass finished");
        Ok(())
    }

    async fn load_account(&self, account_id: i64) -> Result<Option<Account>, WalletError> {
        let pool = self.ctx.connections.wallet_pool().await?;
        Ok(sqlx::query_as::<_, Account>(
            "SELECT id, manager AS manager_id, user, iv, `key` AS encrypted_key, pubkeyhash \
             FROM account WHERE id = ?",
        )
        .bind(account_id)
        .fetch_optional(&pool)
        .await?)
    }

    /// Pass 1: collapse every address that has accumulated enough
    /// spendable outputs, while budget remains. Per-address failures are
    /// logged and charged nothing against the budget.
    async fn consolidate_for_coin(
        &self,
        coin: &Coin,
        mut max_work: i64,
    ) -> Result<i64, WalletError> {
        let indexer = self.ctx.connections.indexer(coin).await?;
        let candidates = indexer
            .consolidation_candidates(
                self.ctx.connections.wallet_db_name(),
                &coin.ticker,
                MIN_CONSOLIDATION_UTXOS,
            )
            .await?;

        for candidate in candidates {
            let Some(account) = self.load_account(candidate.account_id).await? else {
                continue;
            };
            tracing::info!(
                coin = %coin.ticker,
                address = %candidate.address,
                utxos = candidate.utxo_count,
                "consolidating"
            );

            let chain = AccountChain::new(&self.ctx, &account, coin);
            match chain.consolidate(true).await {
                Ok(txid) => {
                    tracing::info!(coin = %coin.ticker, %txid, "consolidation broadcast");
                    max_work -= 1;
                }
                Err(error) => {
                    tracing::warn!(coin = %coin.ticker, address = %candidate.address, %error, "consolidation failed");
                    continue;
                }
            }
            if max_work <= 0 {
                break;
            }
        }
        Ok(max_work)
    }

    async fn next_due_payment(
        &self,
        coin: &Coin,
    ) -> Result<Option<AutomaticPayment>, WalletError> {
        let pool = self.ctx.connections.wallet_pool().await?;
        Ok(sqlx::query_as::<_, AutomaticPayment>(
            "SELECT id, account AS account_id, coin, pubkeyhash, txout_type_id, amount, \
             `interval`, nextpayment \
             FROM autopayment WHERE coin = ? AND nextpayment <= ? \
             ORDER BY nextpayment, id LIMIT 1",
        )
        .bind(&coin.ticker)
        .bind(Utc::now().naive_utc())
        .fetch_optional(&pool)
        .await?)
    }

    /// Pass 2: execute due automatic payments while budget remains. Each
    /// rule's schedule is advanced and persisted whether or not its
    /// transaction went through, so a failing rule cannot wedge the queue.
    async fn run_automatic_payments(
        &self,
        coin: &Coin,
        mut max_work: i64,
    ) -> Result<i64, WalletError> {
        let pool = self.ctx.connections.wallet_pool().await?;

        loop {
            let Some(mut payment) = self.next_due_payment(coin).await? else {
                break;
            };

            match self.execute_payment(coin, &payment).await {
                Ok(Some(txid)) => {
                    tracing::info!(coin = %coin.ticker, %txid, payment = payment.id, "autopayment broadcast");
                    max_work -= 1;
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(payment = payment.id, %error, "autopayment failed");
                }
            }

            payment.clamp_interval();
            payment.advance_nextpayment(Utc::now().naive_utc());
            sqlx::query("UPDATE autopayment SET `interval` = ?, nextpayment = ? WHERE id = ?")
                .bind(payment.interval)
                .bind(payment.nextpayment)
                .bind(payment.id)
                .execute(&pool)
                .await?;

            if max_work <= 0 {
                break;
            }
        }
        Ok(max_work)
    }

    async fn execute_payment(
        &self,
        coin: &Coin,
        payment: &AutomaticPayment,
    ) -> Result<Option<String>, WalletError> {
        let Some(account) = self.load_account(payment.account_id).await? else {
            return Err(WalletError::UnknownAccount(format!(
                "account {} of autopayment {}",
                payment.account_id, payment.id
            )));
        };

        let chain = AccountChain::new(&self.ctx, &account, coin);
        match autopay::execute(&chain, payment).await? {
            Some(signed) => {
                let txid = chain.broadcast(&signed, true).await?;
                Ok(Some(txid))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_runs_immediately() {
        let mut state = CoinState::new();
        assert!(state.update(b"block-1"));
        assert_eq!(state.lastblockhash, b"block-1");
    }

    #[test]
    fn second_block_within_cooldown_is_skipped_but_remembered() {
        let mut state = CoinState::new();
        assert!(state.update(b"block-1"));
        assert!(!state.update(b"block-2"));
        // The skipped block's hash still replaces the remembered one.
        assert_eq!(state.lastblockhash, b"block-2");
    }
}
