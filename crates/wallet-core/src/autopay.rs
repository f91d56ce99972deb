use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use coininfo::TxOutType;
use txbuilder::{SignedTransaction, UnsignedTransactionBuilder};

use crate::error::WalletError;
use crate::indexer::UtxoFilter;
use crate::models::{AutomaticPayment, PaymentKind};
use crate::wallet::{AccountChain, AppContext};

/// A rule as submitted through the API, before it has a row.
#[derive(Debug, Clone)]
pub struct NewAutomaticPayment {
    pub pubkeyhash: [u8; 20],
    pub txout_type: TxOutType,
    pub kind: PaymentKind,
    pub interval: i64,
}

const SELECT_PAYMENT: &str = "SELECT id, account AS account_id, coin, pubkeyhash, \
     txout_type_id, amount, `interval`, nextpayment FROM autopayment";

pub async fn list_for_account(
    ctx: &AppContext,
    account_id: i64,
    coin: Option<&str>,
) -> Result<Vec<AutomaticPayment>, WalletError> {
    let pool = ctx.connections.wallet_pool().await?;
    let payments = match coin {
        Some(coin) => {
            sqlx::query_as::<_, AutomaticPayment>(&format!(
                "{SELECT_PAYMENT} WHERE account = ? AND coin = ? ORDER BY id"
            ))
            .bind(account_id)
            .bind(coin)
            .fetch_all(&pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, AutomaticPayment>(&format!(
                "{SELECT_PAYMENT} WHERE account = ? ORDER BY id"
            ))
            .bind(account_id)
            .fetch_all(&pool)
            .await?
        }
    };
    Ok(payments)
}

async fn insert_on(
    executor: &mut sqlx::MySqlConnection,
    account_id: i64,
    coin: &str,
    rule: &NewAutomaticPayment,
) -> Result<i64, WalletError> {
    let interval = crate::models::clamp_payment_interval(rule.interval);
    let nextpayment = Utc::now().naive_utc() + Duration::seconds(interval);

    let result = sqlx::query(
        "INSERT INTO autopayment (account, coin, pubkeyhash, txout_type_id, amount, \
         `interval`, nextpayment) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(account_id)
    .bind(coin)
    .bind(rule.pubkeyhash.to_vec())
    .bind(rule.txout_type.type_id())
    .bind(rule.kind.signed_amount())
    .bind(interval)
    .bind(nextpayment)
    .execute(&mut *executor)
    .await?;
    Ok(result.last_insert_id() as i64)
}

/// Append one rule for an account on a coin.
pub async fn insert(
    ctx: &AppContext,
    account_id: i64,
    coin: &str,
    rule: &NewAutomaticPayment,
) -> Result<(), WalletError> {
    let pool = ctx.connections.wallet_pool().await?;
    let mut conn = pool.acquire().await?;
    insert_on(&mut *conn, account_id, coin, rule).await?;
    Ok(())
}

/// Replace every rule an account has on a coin with the given set.
pub async fn replace_for_coin(
    ctx: &AppContext,
    account_id: i64,
    coin: &str,
    rules: &[NewAutomaticPayment],
) -> Result<(), WalletError> {
    let pool = ctx.connections.wallet_pool().await?;
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM autopayment WHERE account = ? AND coin = ?")
        .bind(account_id)
        .bind(coin)
        .execute(&mut *tx)
        .await?;
    for rule in rules {
        insert_on(&mut *tx, account_id, coin, rule).await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn delete_for_coin(
    ctx: &AppContext,
    account_id: i64,
    coin: &str,
) -> Result<u64, WalletError> {
    let pool = ctx.connections.wallet_pool().await?;
    let result = sqlx::query("DELETE FROM autopayment WHERE account = ? AND coin = ?")
        .bind(account_id)
        .bind(coin)
        .execute(&pool)
        .await?;
    Ok(result.rows_affected())
}

/// The change amount a zero-balance payment has to leave behind.
///
/// Immature funds stay in the account anyway, so they count against the
/// requested keep-amount; only the part not covered by them needs an
/// explicit change output.
pub fn effective_keep(keep: Decimal, balance: Decimal, immature_inclusive: Decimal) -> Decimal {
    (keep + balance - immature_inclusive).max(Decimal::ZERO)
}

/// Execute one automatic payment rule against its chain. Returns the
/// signed transaction to broadcast, or `None` when there is nothing to do.
pub async fn execute(
    chain: &AccountChain<'_>,
    payment: &AutomaticPayment,
) -> Result<Option<SignedTransaction>, WalletError> {
    let destination = chain
        .coin
        .encode_address(&payment.pubkeyhash, payment.txout_type()?)?;

    match payment.kind() {
        PaymentKind::Standard { amount } => {
            let balance = chain.balance(UtxoFilter::unconfirmed()).await?;
            if balance <= amount {
                return Err(WalletError::NotEnoughCoins {
                    needed: amount,
                    available: balance,
                });
            }
            let signed = chain.send(&destination, amount, true, false).await?;
            Ok(Some(signed))
        }

        PaymentKind::ZeroBalance { amount_to_keep } => {
            let utxos = chain.utxos(UtxoFilter::unconfirmed(), None).await?;
            if utxos.is_empty() {
                return Ok(None);
            }

            let keep = if amount_to_keep > Decimal::ZERO {
                let balance = chain.balance(UtxoFilter::unconfirmed()).await?;
                let immature_inclusive = chain.balance(UtxoFilter::everything()).await?;
                let keep = effective_keep(amount_to_keep, balance, immature_inclusive);
                if keep > balance {
                    return Err(WalletError::NotEnoughCoins {
                        needed: keep,
                        available: balance,
                    });
                }
                keep
            } else {
                Decimal::ZERO
            };

            let mut tx = UnsignedTransactionBuilder::for_coin(chain.coin, false);
            for utxo in &utxos {
                tx.add_input(utxo)?;
            }
            if keep > Decimal::ZERO {
                tx.add_output(&chain.change_address()?, keep)?;
            }
            tx.add_return_output(&destination)?;

            Ok(Some(chain.sign(tx).await?))
        }
    }
}
