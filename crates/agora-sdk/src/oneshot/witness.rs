use bitcoin::ScriptBuf;

use super::params::serialize_outputs;
use crate::ecc::Ecc;
use crate::error::{Error, Result};
use crate::script::{OP_0, OP_1, ScriptBuilder, sha256d};
use crate::tx::{PREIMAGE_INTRO_LEN, SigHashType, Signatory, UnsignedTxInput};

/// Redeem script pushed by every spend of a P2SH covenant.
pub(crate) fn redeem_script(input: &UnsignedTxInput<'_>) -> Result<ScriptBuf> {
    input
        .sign_data()?
        .redeem_script
        .clone()
        .ok_or(Error::MissingSignData(input.input_idx()))
}

/// Accepts a one-shot offer.
///
/// The covenant key is arbitrary; it only has to sign the preimage so the
/// script can check it against the real sighash.
pub struct AgoraOneshotSignatory {
    pub covenant_sk: [u8; 32],
    pub covenant_pk: [u8; 33],
    pub num_enforced_outputs: usize,
}

impl Signatory for AgoraOneshotSignatory {
    fn sign(&self, ecc: &dyn Ecc, input: &UnsignedTxInput<'_>) -> Result<ScriptBuf> {
        let redeem_script = redeem_script(input)?;
        let preimage = input.sighash_preimage(SigHashType::ALL_ANYONECANPAY_BIP143, Some(0))?;
        let sig = ecc.ecdsa_sign(&self.covenant_sk, &sha256d(&preimage))?;
        let outputs = &input.tx().output;
        let buyer_outputs =
            serialize_outputs(outputs.get(self.num_enforced_outputs..).unwrap_or_default());
        Ok(ScriptBuilder::new()
            .push_bytes(&self.covenant_pk)
            .push_bytes(&sig)
            .push_bytes(&preimage[PREIMAGE_INTRO_LEN..])
            .push_bytes(&buyer_outputs)
            .op(OP_1)
            .push_bytes(redeem_script.as_bytes())
            .into_script())
    }
}

/// Cancels a one-shot offer with the maker's cancel key.
pub struct AgoraOneshotCancelSignatory {
    pub cancel_sk: [u8; 32],
}

impl Signatory for AgoraOneshotCancelSignatory {
    fn sign(&self, ecc: &dyn Ecc, input: &UnsignedTxInput<'_>) -> Result<ScriptBuf> {
        covenant_cancel_script_sig(ecc, &self.cancel_sk, input)
    }
}

/// `<sig‖ALL|FORKID> OP_0 <redeem script>`, shared by both covenants.
pub(crate) fn covenant_cancel_script_sig(
    ecc: &dyn Ecc,
    cancel_sk: &[u8; 32],
    input: &UnsignedTxInput<'_>,
) -> Result<ScriptBuf> {
    let redeem_script = redeem_script(input)?;
    let preimage = input.sighash_preimage(SigHashType::ALL_BIP143, Some(0))?;
    let mut sig = ecc.ecdsa_sign(cancel_sk, &sha256d(&preimage))?;
    sig.push(SigHashType::ALL_BIP143.to_u8());
    Ok(ScriptBuilder::new()
        .push_bytes(&sig)
        .op(OP_0)
        .push_bytes(redeem_script.as_bytes())
        .into_script())
}
