use bitcoin::TxOut;
use bitcoin::consensus::encode::serialize;

/// Parameters of a one-shot offer: the whole offered amount is bought at
/// once by paying exactly `enforced_outputs`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgoraOneshot {
    /// Outputs every accepting transaction must start with. Output 0 is the
    /// SLP SEND moving the offered tokens to output 2.
    pub enforced_outputs: Vec<TxOut>,
    /// Key that can cancel the offer.
    pub cancel_pk: [u8; 33],
}

impl AgoraOneshot {
    /// Tag identifying this covenant in plugin data and ad scripts.
    pub const COVENANT_VARIANT: &'static str = "ONESHOT";

    pub fn new(enforced_outputs: Vec<TxOut>, cancel_pk: [u8; 33]) -> Self {
        Self {
            enforced_outputs,
            cancel_pk,
        }
    }

    /// Sats the maker asks for, i.e. the total value of the enforced outputs.
    pub fn asked_sats(&self) -> u64 {
        self.enforced_outputs.iter().map(|output| output.value).sum()
    }

    /// Concatenated serialization of the enforced outputs.
    pub fn enforced_outputs_ser(&self) -> Vec<u8> {
        serialize_outputs(&self.enforced_outputs)
    }

    /// Serialization of the enforced outputs after the token SEND, as
    /// published in the advertisement and in the plugin data.
    pub fn ad_outputs_ser(&self) -> Vec<u8> {
        serialize_outputs(self.enforced_outputs.get(1..).unwrap_or_default())
    }
}

pub(crate) fn serialize_outputs(outputs: &[TxOut]) -> Vec<u8> {
    outputs.iter().flat_map(serialize).collect()
}
