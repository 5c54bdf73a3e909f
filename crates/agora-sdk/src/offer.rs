//! A single offer UTXO and the transactions that accept or cancel it.

use std::sync::Arc;

use bitcoin::{OutPoint, Script, ScriptBuf, Transaction, TxOut};

use crate::config::{DEFAULT_DUST_LIMIT, DEFAULT_FEE_PER_KB};
use crate::ecc::Ecc;
use crate::error::{Error, Result};
use crate::oneshot::{AgoraOneshot, AgoraOneshotCancelSignatory, AgoraOneshotSignatory};
use crate::partial::{AgoraPartial, AgoraPartialCancelSignatory, AgoraPartialSignatory};
use crate::token::{Token, TokenProtocol, alp_send, empp_script, slp_send};
use crate::tx::{Signatory, TxBuilder, TxBuilderInput, TxBuilderOutput, TxInput, fee_for_size};

/// Covenant enforcing an offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgoraOfferVariant {
    Oneshot(AgoraOneshot),
    Partial(AgoraPartial),
}

/// Parameters for [`AgoraOffer::accept_tx`].
#[derive(Debug, Clone)]
pub struct AcceptTxParams {
    /// Arbitrary key signing the covenant preimage; a fresh random one is
    /// recommended. Must pair with `covenant_pk`.
    pub covenant_sk: [u8; 32],
    pub covenant_pk: [u8; 33],
    /// Inputs covering the asked sats plus the fee. They must carry sign
    /// data and a signatory; wrong data builds a tx that fails at broadcast.
    pub fuel_inputs: Vec<TxBuilderInput>,
    /// Receives the tokens and any leftover sats.
    pub recipient_script: ScriptBuf,
    /// Required for partial offers.
    pub accepted_tokens: Option<u64>,
    pub dust_amount: Option<u64>,
    pub fee_per_kb: Option<u64>,
}

/// Parameters for [`AgoraOffer::cancel_tx`].
#[derive(Debug, Clone)]
pub struct CancelTxParams {
    /// Must pair with the offer's cancel (or maker) key for the tx to be
    /// valid; this is not checked here.
    pub cancel_sk: [u8; 32],
    pub fuel_inputs: Vec<TxBuilderInput>,
    /// Receives the tokens and any leftover sats.
    pub recipient_script: ScriptBuf,
    pub dust_amount: Option<u64>,
    pub fee_per_kb: Option<u64>,
}

/// One UTXO offering tokens.
#[derive(Debug, Clone)]
pub struct AgoraOffer {
    pub variant: AgoraOfferVariant,
    pub outpoint: OutPoint,
    /// Spend data of the offer output (value and covenant redeem script).
    pub tx_builder_input: TxInput,
    /// Tokens held by the offer output.
    pub token: Token,
}

impl AgoraOffer {
    /// Build and sign a tx accepting this offer.
    ///
    /// Outputs are the covenant's outputs, then a dust output and a leftover
    /// output to `recipient_script`.
    pub fn accept_tx(&self, ecc: &dyn Ecc, params: AcceptTxParams) -> Result<Transaction> {
        let dust_amount = params.dust_amount.unwrap_or(DEFAULT_DUST_LIMIT);
        let fee_per_kb = params.fee_per_kb.unwrap_or(DEFAULT_FEE_PER_KB);
        let builder = self.accept_tx_builder(
            params.covenant_sk,
            params.covenant_pk,
            params.fuel_inputs,
            vec![
                TxBuilderOutput::Fixed(TxOut {
                    value: dust_amount,
                    script_pubkey: params.recipient_script.clone(),
                }),
                TxBuilderOutput::Leftover(params.recipient_script),
            ],
            params.accepted_tokens,
        )?;
        builder.sign(ecc, fee_per_kb, dust_amount)
    }

    /// Fee in sats to accept this offer, on top of the asked sats.
    ///
    /// Measured on a tx signed with placeholder keys.
    pub fn accept_fee_sats(
        &self,
        recipient_script: &Script,
        extra_inputs: &[TxBuilderInput],
        fee_per_kb: Option<u64>,
        accepted_tokens: Option<u64>,
    ) -> Result<u64> {
        let builder = self.accept_tx_builder(
            [0; 32],
            [0; 33],
            extra_inputs.to_vec(),
            vec![TxBuilderOutput::Fixed(TxOut {
                value: 0,
                script_pubkey: recipient_script.to_owned(),
            })],
            accepted_tokens,
        )?;
        let size = builder.measure()?;
        Ok(fee_for_size(size, fee_per_kb.unwrap_or(DEFAULT_FEE_PER_KB)))
    }

    /// Build and sign a tx returning all offered tokens to `recipient_script`.
    pub fn cancel_tx(&self, ecc: &dyn Ecc, params: CancelTxParams) -> Result<Transaction> {
        let dust_amount = params.dust_amount.unwrap_or(DEFAULT_DUST_LIMIT);
        let fee_per_kb = params.fee_per_kb.unwrap_or(DEFAULT_FEE_PER_KB);
        let builder = self.cancel_tx_builder(
            params.cancel_sk,
            params.fuel_inputs,
            vec![
                TxBuilderOutput::Fixed(TxOut {
                    value: dust_amount,
                    script_pubkey: params.recipient_script.clone(),
                }),
                TxBuilderOutput::Leftover(params.recipient_script),
            ],
        )?;
        builder.sign(ecc, fee_per_kb, dust_amount)
    }

    /// Fee in sats to cancel this offer.
    ///
    /// `extra_inputs` can hold e.g. an ad input, to quote a cancel and
    /// re-offer in one go.
    pub fn cancel_fee_sats(
        &self,
        recipient_script: &Script,
        extra_inputs: &[TxBuilderInput],
        fee_per_kb: Option<u64>,
    ) -> Result<u64> {
        let builder = self.cancel_tx_builder(
            [0; 32],
            extra_inputs.to_vec(),
            vec![TxBuilderOutput::Fixed(TxOut {
                value: 0,
                script_pubkey: recipient_script.to_owned(),
            })],
        )?;
        let size = builder.measure()?;
        Ok(fee_for_size(size, fee_per_kb.unwrap_or(DEFAULT_FEE_PER_KB)))
    }

    /// Sats asked by the maker, excluding fees.
    pub fn asked_sats(&self, accepted_tokens: Option<u64>) -> Result<u64> {
        match &self.variant {
            AgoraOfferVariant::Oneshot(oneshot) => Ok(oneshot.asked_sats()),
            AgoraOfferVariant::Partial(partial) => {
                let accepted_tokens =
                    accepted_tokens.ok_or(Error::MissingParameter("accepted_tokens"))?;
                partial.asked_sats(accepted_tokens)
            }
        }
    }

    fn offer_input(&self, signatory: impl Signatory + 'static) -> TxBuilderInput {
        TxBuilderInput::new(self.tx_builder_input.clone(), Arc::new(signatory))
    }

    fn accept_tx_builder(
        &self,
        covenant_sk: [u8; 32],
        covenant_pk: [u8; 33],
        fuel_inputs: Vec<TxBuilderInput>,
        extra_outputs: Vec<TxBuilderOutput>,
        accepted_tokens: Option<u64>,
    ) -> Result<TxBuilder> {
        match &self.variant {
            AgoraOfferVariant::Oneshot(oneshot) => {
                if self.token.token_type.protocol != TokenProtocol::Slp {
                    return Err(Error::UnsupportedProtocol(
                        self.token.token_type.protocol.to_string(),
                    ));
                }
                let mut inputs = fuel_inputs;
                inputs.push(self.offer_input(AgoraOneshotSignatory {
                    covenant_sk,
                    covenant_pk,
                    num_enforced_outputs: oneshot.enforced_outputs.len(),
                }));
                let outputs = oneshot
                    .enforced_outputs
                    .iter()
                    .cloned()
                    .map(TxBuilderOutput::Fixed)
                    .chain(extra_outputs)
                    .collect();
                Ok(TxBuilder::new(inputs, outputs))
            }
            AgoraOfferVariant::Partial(partial) => {
                let accepted_tokens =
                    accepted_tokens.ok_or(Error::MissingParameter("accepted_tokens"))?;
                partial.validate()?;
                let trunc_factor = partial.trunc_factor()?;
                if accepted_tokens == 0 || accepted_tokens % trunc_factor != 0 {
                    return Err(Error::InvalidAcceptAmount {
                        accepted_tokens,
                        trunc_factor,
                    });
                }
                let offered_tokens = self.token.amount;
                let remainder_tokens = offered_tokens.checked_sub(accepted_tokens).ok_or(
                    Error::AcceptAmountTooLarge {
                        accepted_tokens,
                        offered_tokens,
                    },
                )?;
                if remainder_tokens % trunc_factor != 0 {
                    return Err(Error::UnalignedRemainder {
                        remainder_tokens,
                        trunc_factor,
                    });
                }
                let accepted_trunc_tokens = accepted_tokens / trunc_factor;

                let mut inputs = vec![self.offer_input(AgoraPartialSignatory {
                    params: partial.clone(),
                    accepted_trunc_tokens,
                    covenant_sk,
                    covenant_pk,
                })];
                inputs.extend(fuel_inputs);

                let mut send_amounts = vec![0];
                if remainder_tokens > 0 {
                    send_amounts.push(remainder_tokens);
                }
                send_amounts.push(accepted_tokens);

                let mut outputs = vec![
                    TxBuilderOutput::Fixed(TxOut {
                        value: 0,
                        script_pubkey: partial.send_script(&send_amounts)?,
                    }),
                    TxBuilderOutput::Fixed(TxOut {
                        value: partial.asked_sats(accepted_tokens)?,
                        script_pubkey: partial.maker_script(),
                    }),
                ];
                if remainder_tokens > 0 {
                    outputs.push(TxBuilderOutput::Fixed(TxOut {
                        value: partial.dust_amount,
                        script_pubkey: partial.remainder_script(accepted_trunc_tokens)?,
                    }));
                }
                outputs.extend(extra_outputs);
                Ok(TxBuilder::new(inputs, outputs))
            }
        }
    }

    fn cancel_tx_builder(
        &self,
        cancel_sk: [u8; 32],
        fuel_inputs: Vec<TxBuilderInput>,
        extra_outputs: Vec<TxBuilderOutput>,
    ) -> Result<TxBuilder> {
        let (offer_input, protocol) = match &self.variant {
            AgoraOfferVariant::Oneshot(_) => (
                self.offer_input(AgoraOneshotCancelSignatory { cancel_sk }),
                TokenProtocol::Slp,
            ),
            AgoraOfferVariant::Partial(partial) => (
                self.offer_input(AgoraPartialCancelSignatory { maker_sk: cancel_sk }),
                partial.token_protocol,
            ),
        };
        let token_type = self.token.token_type.number;
        let amounts = [self.token.amount];
        let send_script = match protocol {
            TokenProtocol::Slp => slp_send(&self.token.token_id, token_type, &amounts)?,
            TokenProtocol::Alp => {
                empp_script(&[alp_send(&self.token.token_id, token_type, &amounts)?])?
            }
        };
        let mut inputs = fuel_inputs;
        inputs.push(offer_input);
        let outputs = std::iter::once(TxBuilderOutput::Fixed(TxOut {
            value: 0,
            script_pubkey: send_script,
        }))
        .chain(extra_outputs)
        .collect();
        Ok(TxBuilder::new(inputs, outputs))
    }
}
