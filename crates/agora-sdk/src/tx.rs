//! Transaction building and signing for eCash.
//!
//! A [`TxBuilder`] holds ordered inputs (each with the data needed to sign
//! it and a [`Signatory`] that produces its scriptSig) and ordered outputs.
//! [`TxBuilder::sign`] balances an optional leftover output against a fee
//! computed from a dummy-signed copy of the transaction, then signs for real.
//! [`TxBuilder::measure`] only ever signs with placeholders and returns a
//! byte count, so a dummy-signed transaction never leaves this module.

use std::sync::Arc;

use bitcoin::absolute::LockTime;
use bitcoin::consensus::encode::{VarInt, serialize};
use bitcoin::{OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness};

use crate::ecc::{Ecc, EccDummy};
use crate::error::{Error, Result};
use crate::script::{ScriptBuilder, cut_out_codesep, sha256d};

pub const TX_VERSION: i32 = 2;

/// Preimage bytes before the outpoint: version, hashPrevouts, hashSequence.
/// Under ANYONECANPAY they are `02000000` followed by 64 zero bytes, which a
/// covenant can rebuild with `OP_2 <68> OP_NUM2BIN`.
pub const PREIMAGE_INTRO_LEN: usize = 4 + 32 + 32;

/// Sighash flags with the FORKID bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigHashType(u8);

impl SigHashType {
    pub const ALL_BIP143: Self = Self(0x41);
    pub const NONE_BIP143: Self = Self(0x42);
    pub const SINGLE_BIP143: Self = Self(0x43);
    pub const ALL_ANYONECANPAY_BIP143: Self = Self(0xc1);
    pub const NONE_ANYONECANPAY_BIP143: Self = Self(0xc2);
    pub const SINGLE_ANYONECANPAY_BIP143: Self = Self(0xc3);

    const BASE_MASK: u8 = 0x1f;
    const NONE: u8 = 0x02;
    const SINGLE: u8 = 0x03;
    const ANYONECANPAY: u8 = 0x80;

    pub fn to_u8(self) -> u8 {
        self.0
    }

    fn base(self) -> u8 {
        self.0 & Self::BASE_MASK
    }

    fn anyone_can_pay(self) -> bool {
        self.0 & Self::ANYONECANPAY != 0
    }
}

/// Data needed to compute the sighash of an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignData {
    /// Value of the output being spent, in sats.
    pub value: u64,
    /// Redeem script of a P2SH output; used as scriptCode when present.
    pub redeem_script: Option<ScriptBuf>,
    /// Output script; used as scriptCode for non-P2SH outputs.
    pub output_script: Option<ScriptBuf>,
}

impl SignData {
    pub fn p2sh(value: u64, redeem_script: ScriptBuf) -> Self {
        Self {
            value,
            redeem_script: Some(redeem_script),
            output_script: None,
        }
    }

    pub fn with_output_script(value: u64, output_script: ScriptBuf) -> Self {
        Self {
            value,
            redeem_script: None,
            output_script: Some(output_script),
        }
    }

    fn script_code(&self) -> Option<&ScriptBuf> {
        self.redeem_script.as_ref().or(self.output_script.as_ref())
    }
}

/// An input as it will appear in the transaction, before signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub prev_out: OutPoint,
    pub sign_data: Option<SignData>,
    pub sequence: Sequence,
}

impl TxInput {
    pub fn new(prev_out: OutPoint, sign_data: SignData) -> Self {
        Self {
            prev_out,
            sign_data: Some(sign_data),
            sequence: Sequence::MAX,
        }
    }
}

/// Produces the scriptSig for one input.
pub trait Signatory: Send + Sync {
    fn sign(&self, ecc: &dyn Ecc, input: &UnsignedTxInput<'_>) -> Result<ScriptBuf>;
}

/// Input of a [`TxBuilder`].
#[derive(Clone)]
pub struct TxBuilderInput {
    pub input: TxInput,
    pub signatory: Option<Arc<dyn Signatory>>,
}

impl TxBuilderInput {
    pub fn new(input: TxInput, signatory: Arc<dyn Signatory>) -> Self {
        Self {
            input,
            signatory: Some(signatory),
        }
    }
}

impl std::fmt::Debug for TxBuilderInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxBuilderInput")
            .field("input", &self.input)
            .field("has_signatory", &self.signatory.is_some())
            .finish()
    }
}

/// Output of a [`TxBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxBuilderOutput {
    /// Output with a fixed value.
    Fixed(TxOut),
    /// Output receiving whatever is left after fixed outputs and fee.
    Leftover(ScriptBuf),
}

impl From<TxOut> for TxBuilderOutput {
    fn from(output: TxOut) -> Self {
        TxBuilderOutput::Fixed(output)
    }
}

/// Transaction with all outputs fixed and no scriptSigs yet.
#[derive(Debug, Clone)]
pub struct UnsignedTx {
    tx: Transaction,
    inputs: Vec<TxInput>,
}

impl UnsignedTx {
    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn input_at(&self, input_idx: usize) -> UnsignedTxInput<'_> {
        UnsignedTxInput {
            input_idx,
            unsigned_tx: self,
        }
    }
}

/// One input of an [`UnsignedTx`], the view a [`Signatory`] signs.
#[derive(Debug, Clone, Copy)]
pub struct UnsignedTxInput<'a> {
    input_idx: usize,
    unsigned_tx: &'a UnsignedTx,
}

impl UnsignedTxInput<'_> {
    pub fn input_idx(&self) -> usize {
        self.input_idx
    }

    pub fn tx(&self) -> &Transaction {
        &self.unsigned_tx.tx
    }

    pub fn tx_input(&self) -> &TxInput {
        &self.unsigned_tx.inputs[self.input_idx]
    }

    pub fn sign_data(&self) -> Result<&SignData> {
        self.tx_input()
            .sign_data
            .as_ref()
            .ok_or(Error::MissingSignData(self.input_idx))
    }

    /// BIP143 preimage with FORKID, fork value 0.
    ///
    /// With `codesep_idx`, the scriptCode is the part of the script after
    /// that `OP_CODESEPARATOR`.
    pub fn sighash_preimage(
        &self,
        sig_hash_type: SigHashType,
        codesep_idx: Option<usize>,
    ) -> Result<Vec<u8>> {
        let tx = &self.unsigned_tx.tx;
        let input = self.tx_input();
        let sign_data = self.sign_data()?;
        let script = sign_data
            .script_code()
            .ok_or(Error::MissingSignData(self.input_idx))?;
        let script_code = match codesep_idx {
            Some(idx) => cut_out_codesep(script.as_bytes(), idx)?,
            None => script.as_bytes().to_vec(),
        };

        let base = sig_hash_type.base();
        let acp = sig_hash_type.anyone_can_pay();

        let hash_prevouts = if acp {
            [0; 32]
        } else {
            let mut buf = Vec::with_capacity(36 * tx.input.len());
            for txin in &tx.input {
                buf.extend(serialize(&txin.previous_output));
            }
            sha256d(&buf)
        };
        let hash_sequence = if acp || base == SigHashType::SINGLE || base == SigHashType::NONE {
            [0; 32]
        } else {
            let mut buf = Vec::with_capacity(4 * tx.input.len());
            for txin in &tx.input {
                buf.extend_from_slice(&txin.sequence.to_consensus_u32().to_le_bytes());
            }
            sha256d(&buf)
        };
        let hash_outputs = if base != SigHashType::SINGLE && base != SigHashType::NONE {
            let mut buf = Vec::new();
            for output in &tx.output {
                buf.extend(serialize(output));
            }
            sha256d(&buf)
        } else if base == SigHashType::SINGLE && self.input_idx < tx.output.len() {
            sha256d(&serialize(&tx.output[self.input_idx]))
        } else {
            [0; 32]
        };

        let mut preimage = Vec::with_capacity(160 + script_code.len());
        preimage.extend_from_slice(&tx.version.to_le_bytes());
        preimage.extend_from_slice(&hash_prevouts);
        preimage.extend_from_slice(&hash_sequence);
        preimage.extend(serialize(&input.prev_out));
        preimage.extend(serialize(&VarInt(script_code.len() as u64)));
        preimage.extend_from_slice(&script_code);
        preimage.extend_from_slice(&sign_data.value.to_le_bytes());
        preimage.extend_from_slice(&input.sequence.to_consensus_u32().to_le_bytes());
        preimage.extend_from_slice(&hash_outputs);
        preimage.extend_from_slice(&tx.lock_time.to_consensus_u32().to_le_bytes());
        preimage.extend_from_slice(&u32::from(sig_hash_type.to_u8()).to_le_bytes());
        Ok(preimage)
    }
}

/// Signs a plain P2PKH input.
pub struct P2pkhSignatory {
    pub sk: [u8; 32],
    pub pk: [u8; 33],
    pub sig_hash_type: SigHashType,
}

impl Signatory for P2pkhSignatory {
    fn sign(&self, ecc: &dyn Ecc, input: &UnsignedTxInput<'_>) -> Result<ScriptBuf> {
        let preimage = input.sighash_preimage(self.sig_hash_type, None)?;
        let mut sig = ecc.ecdsa_sign(&self.sk, &sha256d(&preimage))?;
        sig.push(self.sig_hash_type.to_u8());
        Ok(ScriptBuilder::new()
            .push_bytes(&sig)
            .push_bytes(&self.pk)
            .into_script())
    }
}

/// Builds and signs a transaction.
#[derive(Debug, Clone)]
pub struct TxBuilder {
    pub version: i32,
    pub lock_time: LockTime,
    pub inputs: Vec<TxBuilderInput>,
    pub outputs: Vec<TxBuilderOutput>,
}

impl Default for TxBuilder {
    fn default() -> Self {
        Self {
            version: TX_VERSION,
            lock_time: LockTime::ZERO,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl TxBuilder {
    pub fn new(inputs: Vec<TxBuilderInput>, outputs: Vec<TxBuilderOutput>) -> Self {
        Self {
            inputs,
            outputs,
            ..Default::default()
        }
    }

    /// Balance the leftover output (if any) and sign every input.
    ///
    /// The fee is `ceil(size * fee_per_kb / 1000)` where `size` is measured
    /// on a dummy-signed copy. A leftover below `dust_limit` is dropped.
    pub fn sign(&self, ecc: &dyn Ecc, fee_per_kb: u64, dust_limit: u64) -> Result<Transaction> {
        let mut outputs = self.fixed_outputs(0)?;
        if let Some(leftover_idx) = self.leftover_idx()? {
            let available = self.input_sum()?;
            let fixed: u64 = outputs.iter().map(|output| output.value).sum();
            let size = serialize(&self.sign_with(&EccDummy, outputs.clone())?).len();
            let fee = fee_for_size(size, fee_per_kb);
            let required = fixed + fee;
            let leftover = available
                .checked_sub(required)
                .ok_or(Error::InsufficientInputValue {
                    available,
                    required,
                })?;
            log::trace!("tx size {size} bytes, fee {fee} sats, leftover {leftover} sats");
            if leftover < dust_limit {
                outputs.remove(leftover_idx);
            } else {
                outputs[leftover_idx].value = leftover;
            }
        }
        self.sign_with(ecc, outputs)
    }

    /// Serialized size of the transaction signed with placeholder signatures.
    ///
    /// A leftover output is counted with its value unset.
    pub fn measure(&self) -> Result<usize> {
        let tx = self.sign_with(&EccDummy, self.fixed_outputs(0)?)?;
        Ok(serialize(&tx).len())
    }

    fn leftover_idx(&self) -> Result<Option<usize>> {
        let mut found = None;
        for (idx, output) in self.outputs.iter().enumerate() {
            if matches!(output, TxBuilderOutput::Leftover(_)) {
                if found.is_some() {
                    return Err(Error::Encoding("more than one leftover output".into()));
                }
                found = Some(idx);
            }
        }
        Ok(found)
    }

    fn fixed_outputs(&self, leftover_value: u64) -> Result<Vec<TxOut>> {
        self.leftover_idx()?;
        Ok(self
            .outputs
            .iter()
            .map(|output| match output {
                TxBuilderOutput::Fixed(txout) => txout.clone(),
                TxBuilderOutput::Leftover(script) => TxOut {
                    value: leftover_value,
                    script_pubkey: script.clone(),
                },
            })
            .collect())
    }

    fn input_sum(&self) -> Result<u64> {
        self.inputs
            .iter()
            .enumerate()
            .map(|(idx, input)| {
                input
                    .input
                    .sign_data
                    .as_ref()
                    .map(|sign_data| sign_data.value)
                    .ok_or(Error::MissingSignData(idx))
            })
            .sum()
    }

    fn sign_with(&self, ecc: &dyn Ecc, outputs: Vec<TxOut>) -> Result<Transaction> {
        let unsigned = UnsignedTx {
            tx: Transaction {
                version: self.version,
                lock_time: self.lock_time,
                input: self
                    .inputs
                    .iter()
                    .map(|input| TxIn {
                        previous_output: input.input.prev_out,
                        script_sig: ScriptBuf::new(),
                        sequence: input.input.sequence,
                        witness: Witness::new(),
                    })
                    .collect(),
                output: outputs,
            },
            inputs: self.inputs.iter().map(|input| input.input.clone()).collect(),
        };
        let mut signed = unsigned.tx.clone();
        for (idx, input) in self.inputs.iter().enumerate() {
            let signatory = input
                .signatory
                .as_ref()
                .ok_or(Error::MissingSignatory(idx))?;
            signed.input[idx].script_sig = signatory.sign(ecc, &unsigned.input_at(idx))?;
        }
        Ok(signed)
    }
}

/// `ceil(size * fee_per_kb / 1000)`
pub fn fee_for_size(size: usize, fee_per_kb: u64) -> u64 {
    (size as u64 * fee_per_kb).div_ceil(1000)
}
