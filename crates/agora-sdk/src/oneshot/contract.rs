//! Locking and advertisement scripts of the one-shot covenant.
//!
//! Accept path: the spender pushes the sighash preimage (from the outpoint
//! on) and their own outputs. The script appends those outputs to the
//! enforced ones, checks the hash against the preimage's hashOutputs, then
//! verifies the same signature twice: once with `OP_CHECKDATASIG` over the
//! preimage and once with `OP_CHECKSIG` over the real sighash. Both passing
//! proves the pushed preimage is the real one.
//!
//! Cancel path: a plain signature by `cancel_pk`.

use bitcoin::ScriptBuf;

use super::params::AgoraOneshot;
use crate::error::{Error, Result};
use crate::script::{
    OP_2, OP_3DUP, OP_CAT, OP_CHECKDATASIGVERIFY, OP_CHECKSIG, OP_CHECKSIGVERIFY,
    OP_CODESEPARATOR, OP_DROP, OP_ELSE, OP_ENDIF, OP_EQUAL, OP_EQUALVERIFY, OP_HASH256, OP_IF,
    OP_NIP, OP_NUM2BIN, OP_OVER, OP_ROT, OP_SHA256, OP_SPLIT, OP_SWAP, Op, ScriptBuilder,
    parse_ops,
};
use crate::tx::{PREIMAGE_INTRO_LEN, SigHashType};

/// Magic identifying Agora advertisements.
pub const AGORA_LOKAD_ID: &[u8; 4] = b"AGR0";

/// Offset of hashOutputs in the preimage pushed by the spender, which starts
/// at the outpoint: outpoint 36, scriptCode `01 ac` 2, value 8, sequence 4.
const PREIMAGE_HASH_OUTPUTS_OFFSET: i64 = 36 + 2 + 8 + 4;

impl AgoraOneshot {
    pub fn script(&self) -> ScriptBuf {
        ScriptBuilder::new()
            .op(OP_IF)
            .push_bytes(&self.enforced_outputs_ser())
            .ops(&[OP_SWAP, OP_CAT, OP_HASH256, OP_OVER])
            .push_int(PREIMAGE_HASH_OUTPUTS_OFFSET)
            .ops(&[OP_SPLIT, OP_NIP])
            .push_int(32)
            .ops(&[OP_SPLIT, OP_DROP, OP_EQUALVERIFY])
            // version 2 followed by the zeroed hashPrevouts/hashSequence
            .op(OP_2)
            .push_int(PREIMAGE_INTRO_LEN as i64)
            .ops(&[OP_NUM2BIN, OP_SWAP, OP_CAT, OP_SHA256])
            .ops(&[OP_3DUP, OP_ROT, OP_CHECKDATASIGVERIFY, OP_DROP])
            .push_bytes(&[SigHashType::ALL_ANYONECANPAY_BIP143.to_u8()])
            .ops(&[OP_CAT, OP_SWAP])
            .op(OP_ELSE)
            .push_bytes(&self.cancel_pk)
            .ops(&[OP_ENDIF, OP_CODESEPARATOR, OP_CHECKSIG])
            .into_script()
    }

    /// Script advertising the offer before it is funded. Spending it reveals
    /// the terms so indexers can pick the offer up.
    pub fn ad_script(&self) -> ScriptBuf {
        ScriptBuilder::new()
            .push_bytes(&self.ad_outputs_ser())
            .op(OP_DROP)
            .push_bytes(&self.cancel_pk)
            .op(OP_CHECKSIGVERIFY)
            .push_bytes(Self::COVENANT_VARIANT.as_bytes())
            .op(OP_EQUALVERIFY)
            .push_bytes(AGORA_LOKAD_ID)
            .op(OP_EQUAL)
            .into_script()
    }
}

/// Terms recovered from a one-shot advertisement script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OneshotAd {
    pub cancel_pk: [u8; 33],
    /// Serialized enforced outputs after the token SEND.
    pub outputs_ser: Vec<u8>,
}

/// Parse a script produced by [`AgoraOneshot::ad_script`].
pub fn parse_ad_script(script: &[u8]) -> Result<OneshotAd> {
    let ops = parse_ops(script)?;
    let bad = |what: &str| Error::UnparseableOffer(format!("oneshot ad script: {what}"));
    match ops.as_slice() {
        [
            Op::Push(outputs_ser),
            Op::Code(OP_DROP),
            Op::Push(cancel_pk),
            Op::Code(OP_CHECKSIGVERIFY),
            Op::Push(variant),
            Op::Code(OP_EQUALVERIFY),
            Op::Push(lokad),
            Op::Code(OP_EQUAL),
        ] => {
            if lokad.as_slice() != AGORA_LOKAD_ID {
                return Err(bad("wrong lokad id"));
            }
            if variant.as_slice() != AgoraOneshot::COVENANT_VARIANT.as_bytes() {
                return Err(bad("wrong covenant variant"));
            }
            let cancel_pk = <[u8; 33]>::try_from(cancel_pk.as_slice())
                .map_err(|_| bad("cancel pubkey must be 33 bytes"))?;
            Ok(OneshotAd {
                cancel_pk,
                outputs_ser: outputs_ser.clone(),
            })
        }
        _ => Err(bad("unexpected ops")),
    }
}
