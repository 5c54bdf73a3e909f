use bitcoin::ScriptBuf;

use super::params::AgoraPartial;
use crate::ecc::Ecc;
use crate::error::Result;
use crate::oneshot::params::serialize_outputs;
use crate::oneshot::witness::{covenant_cancel_script_sig, redeem_script};
use crate::script::{OP_1, ScriptBuilder, sha256d};
use crate::tx::{PREIMAGE_INTRO_LEN, SigHashType, Signatory, UnsignedTxInput};

/// Accepts `accepted_trunc_tokens` of a partial offer.
pub struct AgoraPartialSignatory {
    pub params: AgoraPartial,
    pub accepted_trunc_tokens: u64,
    pub covenant_sk: [u8; 32],
    pub covenant_pk: [u8; 33],
}

impl Signatory for AgoraPartialSignatory {
    fn sign(&self, ecc: &dyn Ecc, input: &UnsignedTxInput<'_>) -> Result<ScriptBuf> {
        let redeem_script = redeem_script(input)?;
        let preimage = input.sighash_preimage(SigHashType::ALL_ANYONECANPAY_BIP143, Some(0))?;
        let sig = ecc.ecdsa_sign(&self.covenant_sk, &sha256d(&preimage))?;
        let num_covenant_outputs = self.params.num_covenant_outputs(self.accepted_trunc_tokens);
        let buyer_outputs =
            serialize_outputs(input.tx().output.get(num_covenant_outputs..).unwrap_or_default());
        let accepted_scaled = self.accepted_trunc_tokens * self.params.token_scale_factor;
        Ok(ScriptBuilder::new()
            .push_bytes(&self.covenant_pk)
            .push_bytes(&sig)
            .push_bytes(&buyer_outputs)
            .push_int(accepted_scaled as i64)
            .push_bytes(&preimage[PREIMAGE_INTRO_LEN..])
            .op(OP_1)
            .push_bytes(redeem_script.as_bytes())
            .into_script())
    }
}

/// Cancels a partial offer with the maker key.
pub struct AgoraPartialCancelSignatory {
    pub maker_sk: [u8; 32],
}

impl Signatory for AgoraPartialCancelSignatory {
    fn sign(&self, ecc: &dyn Ecc, input: &UnsignedTxInput<'_>) -> Result<ScriptBuf> {
        covenant_cancel_script_sig(ecc, &self.maker_sk, input)
    }
}
