use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use coininfo::{Coin, TxOutType};

use crate::encode::{encode_blob, encode_u32, encode_u64, encode_varint};
use crate::error::TxBuildError;
use crate::script::output_script;
use crate::{DUST_LIMIT, FEERATE_NETWORK, FEERATE_SUBSIDY};

const SATOSHIS_PER_COIN: Decimal = Decimal::from_parts(100_000_000, 0, 0, false, 0);

/// An unspent output owned by an account, as produced by the indexer query.
#[derive(Debug, Clone)]
pub struct Utxo {
    /// Transaction id in display (big-endian hex) order.
    pub txid: String,
    pub vout: u32,
    pub txout_type: TxOutType,
    pub amount: Decimal,
    /// The address the output pays to; signing keys are looked up by it.
    pub address: String,
}

/// One input of a transaction under construction.
#[derive(Debug, Clone)]
pub struct TransactionInput {
    pub address: String,
    pub amount: Decimal,
    pub txid: String,
    raw_txid: Vec<u8>,
    pub vout: u32,
    pub txout_type: TxOutType,
    estimated_vsize: u32,
    need_witness: bool,
}

impl TransactionInput {
    pub fn new(utxo: &Utxo) -> Result<Self, TxBuildError> {
        let raw_txid =
            hex::decode(&utxo.txid).map_err(|_| TxBuildError::InvalidTxid(utxo.txid.clone()))?;
        let estimated_vsize = utxo
            .txout_type
            .input_vsize()
            .ok_or(TxBuildError::UnsupportedOutputType(utxo.txout_type))?;

        Ok(TransactionInput {
            address: utxo.address.clone(),
            amount: utxo.amount,
            txid: utxo.txid.clone(),
            raw_txid,
            vout: utxo.vout,
            txout_type: utxo.txout_type,
            estimated_vsize,
            need_witness: utxo.txout_type.is_segwit(),
        })
    }

    /// Wire form: reversed txid, output index, empty script, final sequence.
    pub fn raw(&self) -> Vec<u8> {
        let mut raw: Vec<u8> = self.raw_txid.iter().rev().copied().collect();
        raw.extend(encode_u32(self.vout));
        raw.extend(encode_varint(0));
        raw.extend(encode_u32(0xffff_ffff));
        raw
    }
}

/// One output of a transaction under construction.
#[derive(Debug, Clone)]
pub struct TransactionOutput {
    pub amount: Decimal,
    satoshis: u64,
    script: Vec<u8>,
}

impl TransactionOutput {
    pub fn new(
        destination_hash: &[u8],
        output_type: TxOutType,
        amount: Decimal,
    ) -> Result<Self, TxBuildError> {
        let mut output = TransactionOutput {
            amount: Decimal::ZERO,
            satoshis: 0,
            script: output_script(destination_hash, output_type)?,
        };
        output.set_amount(amount);
        Ok(output)
    }

    pub fn set_amount(&mut self, amount: Decimal) {
        self.amount = amount;
        self.satoshis = (amount * SATOSHIS_PER_COIN)
            .trunc()
            .to_u64()
            .unwrap_or(0);
    }

    pub fn raw(&self) -> Vec<u8> {
        let mut raw = encode_u64(self.satoshis).to_vec();
        raw.extend(encode_blob(&self.script));
        raw
    }
}

/// Builds an unsigned transaction: collects inputs and outputs, estimates
/// size and fees, and selects funding inputs from a candidate UTXO set.
#[derive(Debug)]
pub struct UnsignedTransactionBuilder<'a> {
    pub coin: &'a Coin,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub feerate: Decimal,
}

impl<'a> UnsignedTransactionBuilder<'a> {
    pub const VERSION: u32 = 2;

    pub fn new(coin: &'a Coin) -> Self {
        Self::with_feerate(coin, FEERATE_NETWORK)
    }

    pub fn with_feerate(coin: &'a Coin, feerate: Decimal) -> Self {
        UnsignedTransactionBuilder {
            coin,
            inputs: Vec::new(),
            outputs: Vec::new(),
            feerate,
        }
    }

    /// Pick the fee rate for a possibly-subsidized transaction. The subsidy
    /// rate applies only when asked for and the chain permits it.
    pub fn for_coin(coin: &'a Coin, subsidized: bool) -> Self {
        let feerate = if subsidized && coin.allow_tx_subsidy {
            FEERATE_SUBSIDY
        } else {
            FEERATE_NETWORK
        };
        Self::with_feerate(coin, feerate)
    }

    pub fn add_input(&mut self, utxo: &Utxo) -> Result<(), TxBuildError> {
        self.inputs.push(TransactionInput::new(utxo)?);
        Ok(())
    }

    /// Add a destination output, classifying the address against the coin.
    pub fn add_output(&mut self, address: &str, amount: Decimal) -> Result<(), TxBuildError> {
        let (hash, output_type) = self
            .coin
            .decode_address_and_type(address)
            .ok_or_else(|| TxBuildError::InvalidAddress(address.to_string()))?;
        self.outputs
            .push(TransactionOutput::new(&hash, output_type, amount)?);
        Ok(())
    }

    /// Add an output that soaks up everything above the required fee, then
    /// verify the fee ends up inside its sanity bounds.
    pub fn add_return_output(&mut self, address: &str) -> Result<(), TxBuildError> {
        let (hash, output_type) = self
            .coin
            .decode_address_and_type(address)
            .ok_or_else(|| TxBuildError::InvalidAddress(address.to_string()))?;

        let index = self.outputs.len();
        self.outputs
            .push(TransactionOutput::new(&hash, output_type, Decimal::ZERO)?);
        let amount = self.total_in() - self.total_out() - self.required_fee();
        self.outputs[index].set_amount(amount);

        if !self.fee_is_sane() {
            return Err(TxBuildError::FeeCalculation);
        }
        Ok(())
    }

    /// Serialize the unsigned transaction: version 2, no witness data,
    /// locktime 0.
    pub fn raw(&self) -> Vec<u8> {
        let mut raw = encode_u32(Self::VERSION).to_vec();
        raw.extend(encode_varint(self.inputs.len() as u64));
        for input in &self.inputs {
            raw.extend(input.raw());
        }
        raw.extend(encode_varint(self.outputs.len() as u64));
        for output in &self.outputs {
            raw.extend(output.raw());
        }
        raw.extend(encode_u32(0));
        raw
    }

    pub fn raw_hex(&self) -> String {
        hex::encode(self.raw())
    }

    /// Estimated signed size: the raw serialization, plus the witness
    /// section header when any input needs one, plus the difference between
    /// each input's signed vsize and its unsigned wire size.
    pub fn estimated_size(&self) -> usize {
        let mut length = self.raw().len();

        if self.inputs.iter().any(|input| input.need_witness) {
            length += 2;
        }
        length += self
            .inputs
            .iter()
            .map(|input| input.estimated_vsize as usize - input.raw().len())
            .sum::<usize>();

        length
    }

    /// Distinct input addresses whose keys are needed for signing.
    pub fn required_keys(&self) -> Vec<String> {
        let mut addresses: Vec<String> = Vec::new();
        for input in &self.inputs {
            if !addresses.contains(&input.address) {
                addresses.push(input.address.clone());
            }
        }
        addresses
    }

    pub fn total_in(&self) -> Decimal {
        self.inputs.iter().map(|input| input.amount).sum()
    }

    pub fn total_out(&self) -> Decimal {
        self.outputs.iter().map(|output| output.amount).sum()
    }

    pub fn required_fee(&self) -> Decimal {
        Decimal::from(self.estimated_size() as u64) * self.feerate / Decimal::from(1000u32)
    }

    pub fn current_fee(&self) -> Decimal {
        self.total_in() - self.total_out()
    }

    pub fn fee_is_sane(&self) -> bool {
        let current = self.current_fee();
        let target = self.required_fee();
        current >= target && current < target * Decimal::new(11, 1)
    }

    /// Whether the selected inputs can settle the outputs: either the
    /// overshoot is small enough to burn as fee, or large enough to pay a
    /// non-dust change output on top of the fee.
    pub fn funded(&self) -> bool {
        let amount_in = self.total_in();
        let amount_out = self.total_out();
        let fee = self.required_fee();
        let min_amount_out = amount_out + fee;
        let max_amount_out = amount_out + fee * Decimal::TWO;

        (amount_in >= min_amount_out && amount_in <= max_amount_out)
            || amount_in >= min_amount_out + DUST_LIMIT
    }

    /// Select funding inputs for the outputs added so far.
    ///
    /// Candidates are re-added smallest first until the transaction is
    /// funded; dust-sized UTXOs are left for consolidation rather than
    /// dragged into payments. A single oversized input may then be dropped
    /// again, and any remaining overshoot beyond the dust limit goes to a
    /// change output at `return_address`.
    pub fn fund_transaction(
        &mut self,
        utxos: &[Utxo],
        return_address: &str,
    ) -> Result<(), TxBuildError> {
        // Check that the payout target is within reach at all.
        for utxo in utxos {
            self.add_input(utxo)?;
        }
        if self.total_in() < self.total_out() + self.required_fee() {
            return Err(TxBuildError::NotEnoughCoins {
                needed: self.total_out() + self.required_fee(),
                available: self.total_in(),
            });
        }

        // Rebuild the selection lowest-amount first.
        self.inputs.clear();
        let mut candidates: Vec<&Utxo> = utxos.iter().collect();
        candidates.sort_by(|a, b| a.amount.cmp(&b.amount));

        for utxo in candidates {
            if utxo.amount <= DUST_LIMIT {
                continue;
            }
            self.add_input(utxo)?;
            if self.funded() {
                break;
            }
        }
        if !self.funded() {
            return Err(TxBuildError::NotEnoughCoins {
                needed: self.total_out() + self.required_fee(),
                available: self.total_in(),
            });
        }

        // One attempt at dropping an input the selection overshot with.
        // Inputs that would leave tiny UTXOs behind stay in and get
        // consolidated instead.
        self.inputs.reverse();
        if !self.fee_is_sane() {
            let fee_mismatch = self.current_fee() - self.required_fee();
            let position = self.inputs.iter().position(|input| {
                input.amount > DUST_LIMIT
                    && (input.amount * Decimal::TWO < fee_mismatch
                        || input.amount + Decimal::ONE < fee_mismatch)
            });
            if let Some(position) = position {
                self.inputs.remove(position);
            }
        }

        if self.current_fee() - self.required_fee() > DUST_LIMIT {
            self.add_return_output(return_address)?;
        }
        Ok(())
    }
}
