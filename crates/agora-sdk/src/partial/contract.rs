//! Partial covenant script.
//!
//! Layout: `<scaled trunc tokens, 4 bytes LE> OP_CODESEPARATOR <body>`.
//!
//! Only the 4-byte prefix depends on the offered amount. To enforce the
//! remainder output of a fractional accept, the body takes its own bytes from
//! the scriptCode of the pushed sighash preimage (everything after the
//! separator), prepends the new prefix and hashes the result into a P2SH
//! output. The body embeds its own length for that, see
//! [`AgoraPartial::update_script_len`].
//!
//! Accept scriptSig, bottom to top: covenant pk, covenant sig (DER, no
//! sighash byte), serialized outputs after the covenant outputs, accepted
//! scaled tokens, preimage from the outpoint on, `OP_1`, redeem script.
//!
//! Cancel scriptSig: `<sig‖ALL|FORKID> OP_0 <redeem script>`, signed by the
//! maker key.

use bitcoin::consensus::encode::{VarInt, serialize};
use bitcoin::{ScriptBuf, TxOut};

use super::params::AgoraPartial;
use crate::error::{Error, Result};
use crate::oneshot::AGORA_LOKAD_ID;
use crate::script::{
    OP_0, OP_0NOTEQUAL, OP_2, OP_2DUP, OP_3, OP_3DUP, OP_ADD, OP_BIN2NUM, OP_CAT,
    OP_CHECKDATASIGVERIFY, OP_CHECKSIG, OP_CODESEPARATOR, OP_DIV, OP_DROP, OP_DUP, OP_ELSE,
    OP_ENDIF, OP_EQUAL, OP_EQUALVERIFY, OP_FROMALTSTACK, OP_GREATERTHANOREQUAL, OP_HASH160,
    OP_HASH256, OP_IF, OP_MOD, OP_NIP, OP_NUM2BIN, OP_NUMEQUALVERIFY, OP_OVER, OP_PICK,
    OP_REVERSEBYTES, OP_ROT, OP_SHA256, OP_SPLIT, OP_SUB, OP_SWAP, OP_TOALTSTACK, OP_VERIFY,
    ScriptBuilder, p2pkh_script, p2sh_of, sha_rmd160,
};
use crate::token::{
    ALP_AMOUNT_LEN, SLP_AMOUNT_LEN, TokenProtocol, alp_send, empp_script, slp_send,
};
use crate::tx::{PREIMAGE_INTRO_LEN, SigHashType};

/// Bytes of the scaled amount pushed at the start of the script.
const SCALED_PUSH_LEN: usize = 4;

/// Size of the outpoint at the start of the pushed preimage.
const OUTPOINT_LEN: usize = 36;

/// Value and sequence between the scriptCode and hashOutputs.
const VALUE_SEQUENCE_LEN: usize = 8 + 4;

impl AgoraPartial {
    /// Locking (redeem) script of the offer.
    pub fn script(&self) -> Result<ScriptBuf> {
        let mut script = self.script_prefix(self.scaled_trunc_tokens()?)?;
        script.extend(self.script_body(self.script_len)?);
        Ok(ScriptBuf::from_bytes(script))
    }

    /// Measure the body and store its length, until it is stable.
    ///
    /// The body pushes numbers derived from its own length, so changing
    /// `script_len` can change the body size; the size never shrinks when the
    /// length grows, so this converges within a few rounds.
    pub fn update_script_len(&mut self) -> Result<()> {
        for _ in 0..8 {
            let len = self.script_body(self.script_len)?.len();
            if len == self.script_len {
                return Ok(());
            }
            self.script_len = len;
        }
        Err(Error::InvalidOfferParams(format!(
            "script length did not settle (last {})",
            self.script_len
        )))
    }

    /// Advertisement pushdata, carried in the eMPP output of ALP sends so
    /// indexers can recognize the offer.
    ///
    /// `"AGR0" "PARTIAL" u8 u8 u64le u64le u64le <maker pk>`
    pub fn ad_pushdata(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + 7 + 2 + 24 + 33);
        data.extend_from_slice(AGORA_LOKAD_ID);
        data.extend_from_slice(Self::COVENANT_VARIANT.as_bytes());
        data.push(self.num_token_trunc_bytes);
        data.push(self.num_sats_trunc_bytes);
        data.extend_from_slice(&self.token_scale_factor.to_le_bytes());
        data.extend_from_slice(&self.scaled_trunc_tokens_per_trunc_sat.to_le_bytes());
        data.extend_from_slice(&self.min_accepted_scaled_trunc_tokens.to_le_bytes());
        data.extend_from_slice(&self.maker_pk);
        data
    }

    /// Token SEND script for this offer's token. `amounts[i]` goes to output
    /// `i + 1`.
    pub fn send_script(&self, amounts: &[u64]) -> Result<ScriptBuf> {
        match self.token_protocol {
            TokenProtocol::Slp => slp_send(&self.token_id, self.token_type, amounts),
            TokenProtocol::Alp => empp_script(&[
                self.ad_pushdata(),
                alp_send(&self.token_id, self.token_type, amounts)?,
            ]),
        }
    }

    /// Maker payment output script.
    pub fn maker_script(&self) -> ScriptBuf {
        p2pkh_script(&sha_rmd160(&self.maker_pk))
    }

    fn amount_len(&self) -> usize {
        match self.token_protocol {
            TokenProtocol::Slp => SLP_AMOUNT_LEN,
            TokenProtocol::Alp => ALP_AMOUNT_LEN,
        }
    }

    /// Width of one amount inside the SEND script. SLP amounts are separate
    /// pushes, ALP amounts are raw bytes of the section.
    fn encoded_amount_len(&self) -> usize {
        match self.token_protocol {
            TokenProtocol::Slp => 1 + SLP_AMOUNT_LEN,
            TokenProtocol::Alp => ALP_AMOUNT_LEN,
        }
    }

    fn script_prefix(&self, scaled_trunc_tokens: u64) -> Result<Vec<u8>> {
        let scaled = u32::try_from(scaled_trunc_tokens).map_err(|_| {
            Error::InvalidOfferParams(format!(
                "scaled amount {scaled_trunc_tokens} does not fit the script"
            ))
        })?;
        let mut prefix = Vec::with_capacity(SCALED_PUSH_LEN + 2);
        prefix.push(SCALED_PUSH_LEN as u8);
        prefix.extend_from_slice(&scaled.to_le_bytes());
        prefix.push(OP_CODESEPARATOR);
        Ok(prefix)
    }

    /// Serialized SEND output (value 0) for `num_amounts` amounts, cut right
    /// after the first amount. The covenant appends the remaining amounts.
    pub fn send_output_intro(&self, num_amounts: usize) -> Result<Vec<u8>> {
        let output = TxOut {
            value: 0,
            script_pubkey: self.send_script(&vec![0; num_amounts])?,
        };
        let ser = serialize(&output);
        let tail = num_amounts.saturating_sub(1) * self.encoded_amount_len();
        Ok(ser[..ser.len() - tail].to_vec())
    }

    /// Encode the truncated token amount on the stack as it appears in the
    /// SEND message, including the low zero bytes.
    fn encode_trunc_amount(&self, builder: ScriptBuilder) -> ScriptBuilder {
        let num_trunc = usize::from(self.num_token_trunc_bytes);
        let builder = builder
            .push_int((self.amount_len() - num_trunc) as i64)
            .op(OP_NUM2BIN);
        let builder = if num_trunc > 0 {
            builder.push_bytes(&vec![0; num_trunc]).ops(&[OP_SWAP, OP_CAT])
        } else {
            builder
        };
        match self.token_protocol {
            // BE8 behind its push opcode
            TokenProtocol::Slp => builder
                .op(OP_REVERSEBYTES)
                .push_int(SLP_AMOUNT_LEN as i64)
                .ops(&[OP_SWAP, OP_CAT]),
            TokenProtocol::Alp => builder,
        }
    }

    fn script_body(&self, script_len: usize) -> Result<Vec<u8>> {
        self.validate()?;
        let scale = self.token_scale_factor as i64;
        let price = self.scaled_trunc_tokens_per_trunc_sat as i64;
        let num_sats_trunc = usize::from(self.num_sats_trunc_bytes);
        let script_code_len_size = serialize(&VarInt(script_len as u64)).len();
        let script_code_offset = OUTPOINT_LEN + script_code_len_size;
        let hash_outputs_offset = script_code_offset + script_len + VALUE_SEQUENCE_LEN;

        let maker_output_script = serialize(&self.maker_script());
        let mut remainder_output_intro = self.dust_amount.to_le_bytes().to_vec();
        remainder_output_intro.extend_from_slice(&[23, OP_HASH160, 20]);

        // Stack: covenant pk, sig, buyer outputs, accepted, preimage, is_accept, offered
        let b = ScriptBuilder::new()
            .ops(&[OP_SWAP, OP_IF])
            .ops(&[OP_BIN2NUM, OP_2, OP_PICK])
            .op(OP_DUP)
            .push_int(self.min_accepted_scaled_trunc_tokens as i64)
            .ops(&[OP_GREATERTHANOREQUAL, OP_VERIFY])
            .op(OP_DUP)
            .push_int(scale)
            .ops(&[OP_MOD, OP_0, OP_NUMEQUALVERIFY])
            .ops(&[OP_2DUP, OP_GREATERTHANOREQUAL, OP_VERIFY])
            .op(OP_SUB);

        // Maker output: ceil(accepted / price) truncated sats.
        let b = b.op(OP_2).op(OP_PICK);
        let b = if price > 1 {
            b.push_int(price - 1).op(OP_ADD)
        } else {
            b
        };
        let b = b
            .push_int(price)
            .op(OP_DIV)
            .push_int((8 - num_sats_trunc) as i64)
            .op(OP_NUM2BIN);
        let b = if num_sats_trunc > 0 {
            b.push_bytes(&vec![0; num_sats_trunc]).ops(&[OP_SWAP, OP_CAT])
        } else {
            b
        };
        let b = b
            .push_bytes(&maker_output_script)
            .ops(&[OP_CAT, OP_TOALTSTACK]);

        // Fractional accept: SEND [0, remainder, accepted] plus remainder covenant.
        let b = b
            .ops(&[OP_DUP, OP_0NOTEQUAL, OP_IF])
            .op(OP_DUP)
            .push_int(scale)
            .op(OP_DIV);
        let b = self.encode_trunc_amount(b);
        let b = b.op(OP_3).op(OP_PICK).push_int(scale).op(OP_DIV);
        let b = self.encode_trunc_amount(b);
        let b = b
            .op(OP_CAT)
            .push_bytes(&self.send_output_intro(3)?)
            .ops(&[OP_SWAP, OP_CAT, OP_FROMALTSTACK, OP_CAT])
            .op(OP_SWAP)
            .push_int(SCALED_PUSH_LEN as i64)
            .op(OP_NUM2BIN)
            .push_int(SCALED_PUSH_LEN as i64)
            .ops(&[OP_SWAP, OP_CAT])
            .push_bytes(&[OP_CODESEPARATOR])
            .op(OP_CAT)
            .op(OP_2)
            .op(OP_PICK)
            .push_int(script_code_offset as i64)
            .ops(&[OP_SPLIT, OP_NIP])
            .push_int(script_len as i64)
            .ops(&[OP_SPLIT, OP_DROP, OP_CAT, OP_HASH160])
            .push_bytes(&remainder_output_intro)
            .ops(&[OP_SWAP, OP_CAT])
            .push_bytes(&[OP_EQUAL])
            .ops(&[OP_CAT, OP_CAT]);

        // Full accept: SEND [0, accepted].
        let b = b
            .op(OP_ELSE)
            .ops(&[OP_DROP, OP_OVER])
            .push_int(scale)
            .op(OP_DIV);
        let b = self.encode_trunc_amount(b);
        let b = b
            .push_bytes(&self.send_output_intro(2)?)
            .ops(&[OP_SWAP, OP_CAT, OP_FROMALTSTACK, OP_CAT])
            .op(OP_ENDIF);

        // Covenant outputs ‖ buyer outputs must hash to hashOutputs.
        let b = b
            .ops(&[OP_ROT, OP_DROP, OP_ROT, OP_CAT, OP_HASH256, OP_OVER])
            .push_int(hash_outputs_offset as i64)
            .ops(&[OP_SPLIT, OP_NIP])
            .push_int(32)
            .ops(&[OP_SPLIT, OP_DROP, OP_EQUALVERIFY]);

        // Rebuild the full preimage and tie it to the real sighash.
        let b = b
            .op(OP_2)
            .push_int(PREIMAGE_INTRO_LEN as i64)
            .ops(&[OP_NUM2BIN, OP_SWAP, OP_CAT, OP_SHA256])
            .ops(&[OP_3DUP, OP_ROT, OP_CHECKDATASIGVERIFY, OP_DROP])
            .push_bytes(&[SigHashType::ALL_ANYONECANPAY_BIP143.to_u8()])
            .ops(&[OP_CAT, OP_SWAP]);

        // Cancel
        let b = b
            .op(OP_ELSE)
            .op(OP_DROP)
            .push_bytes(&self.maker_pk)
            .ops(&[OP_ENDIF, OP_CHECKSIG]);

        Ok(b.into_bytes())
    }

    /// Number of outputs the covenant enforces when accepting
    /// `accepted_trunc_tokens`: SEND and maker payment, plus the remainder
    /// covenant for a fractional accept.
    pub fn num_covenant_outputs(&self, accepted_trunc_tokens: u64) -> usize {
        if accepted_trunc_tokens < self.trunc_tokens {
            3
        } else {
            2
        }
    }

    /// P2SH output script of the remainder offer after accepting
    /// `accepted_trunc_tokens`.
    pub fn remainder_script(&self, accepted_trunc_tokens: u64) -> Result<ScriptBuf> {
        let remainder = match self.trunc_tokens.checked_sub(accepted_trunc_tokens) {
            Some(remainder) => remainder,
            None => {
                return Err(Error::AcceptAmountTooLarge {
                    accepted_tokens: accepted_trunc_tokens.saturating_mul(self.trunc_factor()?),
                    offered_tokens: self.offered_tokens()?,
                });
            }
        };
        let rest = self.with_trunc_tokens(remainder);
        Ok(p2sh_of(rest.script()?.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{Op, cut_out_codesep, parse_ops};

    const TOKEN_ID: &str = "4242424242424242424242424242424242424242424242424242424242424242";

    fn partial(protocol: TokenProtocol) -> AgoraPartial {
        let mut partial = AgoraPartial {
            trunc_tokens: 1000,
            num_token_trunc_bytes: 1,
            token_scale_factor: 1000,
            scaled_trunc_tokens_per_trunc_sat: 333,
            num_sats_trunc_bytes: 1,
            maker_pk: [3; 33],
            min_accepted_scaled_trunc_tokens: 10_000,
            token_id: TOKEN_ID.to_string(),
            token_type: match protocol {
                TokenProtocol::Slp => 1,
                TokenProtocol::Alp => 0,
            },
            token_protocol: protocol,
            script_len: 0x7f,
            dust_amount: 546,
        };
        partial.update_script_len().unwrap();
        partial
    }

    #[test]
    fn script_len_matches_body() {
        for protocol in [TokenProtocol::Slp, TokenProtocol::Alp] {
            let p = partial(protocol);
            let script = p.script().unwrap();
            let body = cut_out_codesep(script.as_bytes(), 0).unwrap();
            assert_eq!(body.len(), p.script_len);
            assert_eq!(script.len(), p.script_len + 6);
        }
    }

    #[test]
    fn script_starts_with_scaled_amount() {
        let p = partial(TokenProtocol::Slp);
        let script = p.script().unwrap();
        assert_eq!(script.as_bytes()[0], 4);
        assert_eq!(&script.as_bytes()[1..5], &1_000_000u32.to_le_bytes());
        assert_eq!(script.as_bytes()[5], OP_CODESEPARATOR);
    }

    #[test]
    fn body_is_independent_of_amount() {
        let p = partial(TokenProtocol::Alp);
        let rest = p.with_trunc_tokens(7);
        let a = p.script().unwrap();
        let b = rest.script().unwrap();
        assert_eq!(a.as_bytes()[5..], b.as_bytes()[5..]);
        assert_ne!(a.as_bytes()[1..5], b.as_bytes()[1..5]);
    }

    #[test]
    fn body_embeds_send_intros() {
        for (protocol, amount_width) in [(TokenProtocol::Slp, 9), (TokenProtocol::Alp, 6)] {
            let p = partial(protocol);
            let script = p.script().unwrap();
            let ops = parse_ops(script.as_bytes()).unwrap();
            for num_amounts in [2, 3] {
                let mut amounts = vec![5 << 8; num_amounts];
                amounts[0] = 0;
                let full_send = serialize(&TxOut {
                    value: 0,
                    script_pubkey: p.send_script(&amounts).unwrap(),
                });
                let intro = p.send_output_intro(num_amounts).unwrap();
                assert!(full_send.starts_with(&intro));
                assert_eq!(full_send.len() - intro.len(), (num_amounts - 1) * amount_width);
                assert!(ops.contains(&Op::Push(intro)));
            }
        }
    }

    #[test]
    fn ad_pushdata_layout() {
        let p = partial(TokenProtocol::Alp);
        let ad = p.ad_pushdata();
        assert_eq!(&ad[..11], b"AGR0PARTIAL");
        assert_eq!(ad[11], 1);
        assert_eq!(ad[12], 1);
        assert_eq!(&ad[13..21], &1000u64.to_le_bytes());
        assert_eq!(&ad[21..29], &333u64.to_le_bytes());
        assert_eq!(&ad[29..37], &10_000u64.to_le_bytes());
        assert_eq!(&ad[37..], &[3; 33]);
    }

    #[test]
    fn alp_send_carries_ad() {
        let p = partial(TokenProtocol::Alp);
        let script = p.send_script(&[0, 256]).unwrap();
        let ops = parse_ops(script.as_bytes()).unwrap();
        assert_eq!(ops[2], Op::Push(p.ad_pushdata()));
    }

    #[test]
    fn remainder_script_is_p2sh_of_new_offer() {
        let p = partial(TokenProtocol::Slp);
        let expected = p2sh_of(p.with_trunc_tokens(600).script().unwrap().as_bytes());
        assert_eq!(p.remainder_script(400).unwrap(), expected);
        assert!(matches!(
            p.remainder_script(1001),
            Err(Error::AcceptAmountTooLarge { .. })
        ));
        assert_eq!(p.num_covenant_outputs(400), 3);
        assert_eq!(p.num_covenant_outputs(1000), 2);
    }
}
