use rust_decimal::Decimal;
use sqlx::mysql::MySqlPool;
use sqlx::{FromRow, MySqlConnection};

use coininfo::TxOutType;
use txbuilder::Utxo;

use crate::error::WalletError;

/// Depth a coinbase output needs before it may be spent.
pub const COINBASE_MATURITY: i64 = 100;

/// Highest block the indexer has seen for a chain.
#[derive(Debug, Clone, FromRow)]
pub struct BlockTip {
    pub id: i64,
    pub height: i64,
    pub hash: Vec<u8>,
}

/// An indexed address row.
#[derive(Debug, Clone, FromRow)]
pub struct AddressRow {
    pub id: i64,
    pub address: String,
    pub balance: Decimal,
    pub pending: Decimal,
}

/// Which output rows count as spendable for a query.
#[derive(Debug, Clone, Copy, Default)]
pub struct UtxoFilter {
    /// Accept outputs of transactions the indexer has not confirmed yet.
    pub include_unconfirmed: bool,
    /// Accept immature coinbase outputs too; doublespent transactions are
    /// then filtered explicitly instead.
    pub include_immature: bool,
}

impl UtxoFilter {
    pub fn confirmed() -> Self {
        UtxoFilter::default()
    }

    pub fn unconfirmed() -> Self {
        UtxoFilter {
            include_unconfirmed: true,
            include_immature: false,
        }
    }

    pub fn everything() -> Self {
        UtxoFilter {
            include_unconfirmed: true,
            include_immature: true,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
struct UtxoRow {
    address: String,
    txid: Vec<u8>,
    vout: i32,
    type_id: i32,
    amount: Decimal,
}

/// An address bound to an account that has accumulated enough spendable
/// outputs to be worth consolidating.
#[derive(Debug, Clone, FromRow)]
pub struct ConsolidationCandidate {
    pub account_id: i64,
    pub address: String,
    pub utxo_count: i64,
}

const UTXO_JOINS: &str = "FROM transaction_output o \
     JOIN address a ON a.id = o.address_id \
     JOIN `transaction` t ON t.id = o.transaction_id \
     LEFT JOIN transaction_input i ON i.output_id = o.id \
     LEFT JOIN coinbase_info cb ON cb.transaction_id = t.id \
     LEFT JOIN block b ON b.id = cb.block_id";

const UTXO_BASE_FILTER: &str =
    "o.spent_by_id IS NULL AND i.id IS NULL";

const MATURITY_FILTER: &str = "(cb.block_id IS NULL OR b.height <= ?)";

fn in_placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Read access to one chain's indexer database.
#[derive(Debug, Clone)]
pub struct IndexerDb {
    pool: MySqlPool,
}

impl IndexerDb {
    pub fn new(pool: MySqlPool) -> Self {
        IndexerDb { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// The highest-height block row, if the chain has any blocks indexed.
    pub async fn tip(&self) -> Result<Option<BlockTip>, WalletError> {
        Ok(sqlx::query_as::<_, BlockTip>(
            "SELECT id, height, hash FROM block ORDER BY height DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Height at which a coinbase output counts as mature.
    pub async fn coinbase_maturity_height(&self) -> Result<i64, WalletError> {
        let tip_height = self.tip().await?.map(|tip| tip.height).unwrap_or(0);
        Ok(tip_height - COINBASE_MATURITY)
    }

    fn utxo_conditions(filter: UtxoFilter) -> String {
        if filter.include_unconfirmed && filter.include_immature {
            format!("{UTXO_BASE_FILTER} AND t.doublespends_id IS NULL")
        } else if filter.include_unconfirmed {
            format!("{UTXO_BASE_FILTER} AND {MATURITY_FILTER}")
        } else {
            format!("{UTXO_BASE_FILTER} AND t.confirmation IS NOT NULL AND {MATURITY_FILTER}")
        }
    }

    fn needs_maturity_bind(filter: UtxoFilter) -> bool {
        !(filter.include_unconfirmed && filter.include_immature)
    }

    /// The spendable outputs of a set of addresses, oldest first.
    pub async fn utxos(
        &self,
        address_ids: &[i64],
        filter: UtxoFilter,
        max_utxos: Option<u32>,
    ) -> Result<Vec<Utxo>, WalletError> {
        if address_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT a.address AS address, t.txid AS txid, o.`index` AS vout, \
             o.type_id AS type_id, o.amount AS amount \
             {UTXO_JOINS} WHERE a.id IN ({}) AND {} ORDER BY o.id",
            in_placeholders(address_ids.len()),
            Self::utxo_conditions(filter),
        );
        if max_utxos.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut query = sqlx::query_as::<_, UtxoRow>(&sql);
        for id in address_ids {
            query = query.bind(*id);
        }
        if Self::needs_maturity_bind(filter) {
            query = query.bind(self.coinbase_maturity_height().await?);
        }
        if let Some(limit) = max_utxos {
            query = query.bind(limit);
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                let txout_type = TxOutType::from_type_id(row.type_id).ok_or_else(|| {
                    WalletError::Indexer(format!("unknown txout type id {}", row.type_id))
                })?;
                Ok(Utxo {
                    txid: hex::encode(&row.txid),
                    vout: row.vout as u32,
                    txout_type,
                    amount: row.amount,
                    address: row.address,
                })
            })
            .collect()
    }

    /// Summed spendable amount of a set of addresses.
    pub async fn balance(
        &self,
        address_ids: &[i64],
        filter: UtxoFilter,
    ) -> Result<Decimal, WalletError> {
        if address_ids.is_empty() {
            return Ok(Decimal::ZERO);
        }

        let sql = format!(
            "SELECT SUM(o.amount) {UTXO_JOINS} WHERE a.id IN ({}) AND {}",
            in_placeholders(address_ids.len()),
            Self::utxo_conditions(filter),
        );

        let mut query = sqlx::query_scalar::<_, Option<Decimal>>(&sql);
        for id in address_ids {
            query = query.bind(*id);
        }
        if Self::needs_maturity_bind(filter) {
            query = query.bind(self.coinbase_maturity_height().await?);
        }

        Ok(query.fetch_one(&self.pool).await?.unwrap_or(Decimal::ZERO))
    }

    pub async fn address_by_id(&self, id: i64) -> Result<Option<AddressRow>, WalletError> {
        Ok(sqlx::query_as::<_, AddressRow>(
            "SELECT id, address, balance, pending FROM address WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Whether the indexer has picked up a transaction yet.
    pub async fn transaction_exists(&self, txid_hex: &str) -> Result<bool, WalletError> {
        let txid = hex::decode(txid_hex)
            .map_err(|e| WalletError::Indexer(format!("bad txid {txid_hex}: {e}")))?;
        let id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM `transaction` WHERE txid = ? LIMIT 1")
                .bind(txid)
                .fetch_optional(&self.pool)
                .await?;
        Ok(id.is_some())
    }

    /// Per-address count of spendable, mature, non-mempool outputs over the
    /// whole account-address universe of one coin, keeping addresses with
    /// at least `min_utxos` of them. Joins the wallet database's binding
    /// table across schemas.
    pub async fn consolidation_candidates(
        &self,
        wallet_db: &str,
        ticker: &str,
        min_utxos: i64,
    ) -> Result<Vec<ConsolidationCandidate>, WalletError> {
        let maturity = self.coinbase_maturity_height().await?;
        let sql = format!(
            "SELECT ab.account AS account_id, a.address AS address, \
             COUNT(o.id) AS utxo_count \
             FROM `{wallet_db}`.addressbinding ab \
             JOIN address a ON a.id = ab.address \
             JOIN transaction_output o ON o.address_id = a.id \
             JOIN `transaction` t ON t.id = o.transaction_id \
             LEFT JOIN transaction_input i ON i.output_id = o.id \
             LEFT JOIN coinbase_info cb ON cb.transaction_id = t.id \
             LEFT JOIN block b ON b.id = cb.block_id \
             WHERE ab.coin = ? AND {UTXO_BASE_FILTER} AND {MATURITY_FILTER} \
             GROUP BY a.id, a.address, ab.account \
             HAVING COUNT(o.id) >= ?",
        );

        Ok(sqlx::query_as::<_, ConsolidationCandidate>(&sql)
            .bind(ticker)
            .bind(maturity)
            .bind(min_utxos)
            .fetch_all(&self.pool)
            .await?)
    }
}

/// Look up an address in a chain's indexer, creating the row when the
/// chain has not seen it yet. Runs on the caller's transaction so a failed
/// account import rolls the row back with everything else.
pub async fn import_address(
    conn: &mut MySqlConnection,
    address: &str,
) -> Result<i64, WalletError> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM address WHERE address = ?")
        .bind(address)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let result = sqlx::query("INSERT INTO address (address, balance, pending) VALUES (?, 0, 0)")
        .bind(address)
        .execute(&mut *conn)
        .await?;
    Ok(result.last_insert_id() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_expand() {
        assert_eq!(in_placeholders(1), "?");
        assert_eq!(in_placeholders(3), "?, ?, ?");
    }

    #[test]
    fn confirmed_mode_requires_confirmation_and_maturity() {
        let sql = IndexerDb::utxo_conditions(UtxoFilter::confirmed());
        assert!(sql.contains("t.confirmation IS NOT NULL"));
        assert!(sql.contains("b.height <= ?"));
        assert!(!sql.contains("doublespends_id"));
        assert!(IndexerDb::needs_maturity_bind(UtxoFilter::confirmed()));
    }

    #[test]
    fn unconfirmed_mode_drops_confirmation_filter() {
        let sql = IndexerDb::utxo_conditions(UtxoFilter::unconfirmed());
        assert!(!sql.contains("confirmation IS NOT NULL"));
        assert!(sql.contains("b.height <= ?"));
    }

    #[test]
    fn immature_mode_swaps_maturity_for_doublespend_filter() {
        let sql = IndexerDb::utxo_conditions(UtxoFilter::everything());
        assert!(!sql.contains("b.height"));
        assert!(sql.contains("t.doublespends_id IS NULL"));
        assert!(!IndexerDb::needs_maturity_bind(UtxoFilter::everything()));
    }

    #[test]
    fn every_mode_excludes_spent_and_mempool_referenced_outputs() {
        for filter in [
            UtxoFilter::confirmed(),
            UtxoFilter::unconfirmed(),
            UtxoFilter::everything(),
        ] {
            let sql = IndexerDb::utxo_conditions(filter);
            assert!(sql.contains("o.spent_by_id IS NULL"));
            assert!(sql.contains("i.id IS NULL"));
        }
    }
}
