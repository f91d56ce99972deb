use rust_decimal::Decimal;

use crate::builder::{TransactionInput, TransactionOutput, UnsignedTransactionBuilder};
use crate::error::TxBuildError;

/// A fully signed transaction together with the fee accounting of the
/// builder it came from. Broadcasting is the caller's business; this type
/// only carries the blob and its numbers.
#[derive(Debug)]
pub struct SignedTransaction {
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub total_in: Decimal,
    pub total_out: Decimal,
    pub fee: Decimal,
    pub target_feerate: Decimal,
    pub estimated_size: usize,
    /// The signed transaction in hex, as returned by the signing daemon.
    pub hex: String,
    /// Actual wire size of the signed transaction.
    pub size: usize,
    pub actual_feerate: Decimal,
}

impl SignedTransaction {
    pub fn new(
        unsigned: UnsignedTransactionBuilder<'_>,
        raw_signed_tx: String,
    ) -> Result<Self, TxBuildError> {
        let raw = hex::decode(&raw_signed_tx)
            .map_err(|e| TxBuildError::BadSignedBlob(e.to_string()))?;
        if raw.is_empty() {
            return Err(TxBuildError::BadSignedBlob("empty transaction".into()));
        }

        let total_in = unsigned.total_in();
        let total_out = unsigned.total_out();
        let fee = unsigned.current_fee();
        let estimated_size = unsigned.estimated_size();
        let size = raw.len();

        Ok(SignedTransaction {
            inputs: unsigned.inputs,
            outputs: unsigned.outputs,
            total_in,
            total_out,
            fee,
            target_feerate: unsigned.feerate,
            estimated_size,
            hex: raw_signed_tx,
            size,
            actual_feerate: fee / Decimal::from(size as u64) * Decimal::from(1000u32),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Utxo;
    use coininfo::{Coin, SegwitVariant, TxOutType};
    use rust_decimal_macros::dec;

    fn test_coin() -> Coin {
        Coin {
            name: "Garlicoin".into(),
            ticker: "GRLC".into(),
            database: "grlc".into(),
            rpc_host: "127.0.0.1".into(),
            rpc_port: 42068,
            address_version: 38,
            p2sh_address_version: 50,
            privkey_version: 176,
            segwit: Some(SegwitVariant::Bech32 {
                prefix: "grlc".into(),
                send_only: false,
            }),
            allow_tx_subsidy: false,
        }
    }

    fn funded_builder(coin: &Coin) -> UnsignedTransactionBuilder<'_> {
        let mut tx = UnsignedTransactionBuilder::new(coin);
        tx.add_output(&coin.legacy_address(&[0x11; 20]).unwrap(), dec!(0.5))
            .unwrap();
        tx.fund_transaction(
            &[Utxo {
                txid: "ab".repeat(32),
                vout: 0,
                txout_type: TxOutType::P2PKH,
                amount: dec!(1),
                address: "addr".into(),
            }],
            &coin.legacy_address(&[0x22; 20]).unwrap(),
        )
        .unwrap();
        tx
    }

    #[test]
    fn captures_builder_accounting() {
        let coin = test_coin();
        let tx = funded_builder(&coin);
        let fee = tx.current_fee();
        let estimated = tx.estimated_size();

        // Pretend the daemon returned a 200-byte signed blob.
        let signed = SignedTransaction::new(tx, "00".repeat(200)).unwrap();
        assert_eq!(signed.fee, fee);
        assert_eq!(signed.estimated_size, estimated);
        assert_eq!(signed.size, 200);
        assert_eq!(signed.total_in, dec!(1));
        assert_eq!(signed.actual_feerate, fee / dec!(200) * dec!(1000));
        assert_eq!(signed.inputs.len(), 1);
        assert_eq!(signed.outputs.len(), 2);
    }

    #[test]
    fn rejects_non_hex_blob() {
        let coin = test_coin();
        let tx = funded_builder(&coin);
        assert!(matches!(
            SignedTransaction::new(tx, "not hex!".into()),
            Err(TxBuildError::BadSignedBlob(_))
        ));
    }

    #[test]
    fn rejects_empty_blob() {
        let coin = test_coin();
        let tx = funded_builder(&coin);
        assert!(matches!(
            SignedTransaction::new(tx, String::new()),
            Err(TxBuildError::BadSignedBlob(_))
        ));
    }

}
