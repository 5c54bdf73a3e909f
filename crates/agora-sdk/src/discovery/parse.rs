//! Reconstructing offers from indexer plugin data.
//!
//! `data[0]` is the hex of the covenant variant tag and selects the parser.
//! Oneshot: `data[1]` is the serialized enforced outputs after the token
//! SEND. Partial: `data[1..=5]` are `num_token_trunc_bytes`,
//! `num_sats_trunc_bytes` (1 byte each), `token_scale_factor`,
//! `scaled_trunc_tokens_per_trunc_sat` and `min_accepted_scaled_trunc_tokens`
//! (u64 LE each). Both take their key from the `P`-prefixed group.

use bitcoin::consensus::encode::deserialize_partial;
use bitcoin::{OutPoint, TxOut};

use super::endpoint::{PluginEntry, Utxo};
use super::{ONESHOT_HEX, PARTIAL_HEX, PUBKEY_PREFIX};
use crate::config::AgoraConfig;
use crate::error::{Error, Result};
use crate::offer::{AgoraOffer, AgoraOfferVariant};
use crate::oneshot::AgoraOneshot;
use crate::partial::AgoraPartial;
use crate::token::{Token, TokenProtocol, slp_send};
use crate::tx::{SignData, TxInput};

/// Body length a partial offer's script is first measured with.
const INITIAL_SCRIPT_LEN: usize = 0x7f;

type OfferParser = fn(&Utxo, &PluginEntry, &AgoraConfig) -> Result<AgoraOffer>;

/// Covenant tag (hex) to parser.
const OFFER_PARSERS: &[(&str, OfferParser)] = &[
    (ONESHOT_HEX, parse_oneshot_offer),
    (PARTIAL_HEX, parse_partial_offer),
];

/// Parse an indexer UTXO into an offer.
///
/// `Ok(None)` means the UTXO carries no Agora data or an unknown covenant
/// tag. Malformed data is an error.
pub fn parse_offer_utxo(utxo: &Utxo, config: &AgoraConfig) -> Result<Option<AgoraOffer>> {
    let Some(plugin) = utxo
        .plugins
        .as_ref()
        .and_then(|plugins| plugins.get(&config.plugin_name))
    else {
        return Ok(None);
    };
    let Some(variant) = plugin.data.first() else {
        return Ok(None);
    };
    match OFFER_PARSERS.iter().find(|(tag, _)| *tag == variant.as_str()) {
        Some((_, parser)) => parser(utxo, plugin, config).map(Some),
        None => Ok(None),
    }
}

fn unparseable(msg: impl Into<String>) -> Error {
    Error::UnparseableOffer(msg.into())
}

fn utxo_token(utxo: &Utxo) -> Result<Token> {
    let token = utxo
        .token
        .as_ref()
        .ok_or_else(|| unparseable("offer utxo holds no token"))?;
    Token::try_from(token)
}

fn data_item(plugin: &PluginEntry, idx: usize) -> Result<Vec<u8>> {
    let item = plugin
        .data
        .get(idx)
        .ok_or_else(|| unparseable(format!("missing data[{idx}]")))?;
    Ok(hex::decode(item)?)
}

fn data_u8(plugin: &PluginEntry, idx: usize) -> Result<u8> {
    match data_item(plugin, idx)?.as_slice() {
        [byte] => Ok(*byte),
        other => Err(unparseable(format!(
            "data[{idx}] must be 1 byte, got {}",
            other.len()
        ))),
    }
}

fn data_u64(plugin: &PluginEntry, idx: usize) -> Result<u64> {
    let bytes = data_item(plugin, idx)?;
    let bytes = <[u8; 8]>::try_from(bytes.as_slice())
        .map_err(|_| unparseable(format!("data[{idx}] must be 8 bytes, got {}", bytes.len())))?;
    Ok(u64::from_le_bytes(bytes))
}

/// Public key from the first `P`-prefixed group.
fn group_pubkey(plugin: &PluginEntry) -> Result<[u8; 33]> {
    let group = plugin
        .groups
        .iter()
        .find(|group| group.starts_with(PUBKEY_PREFIX))
        .ok_or_else(|| unparseable("no pubkey group"))?;
    let mut pk = [0u8; 33];
    hex::decode_to_slice(&group[PUBKEY_PREFIX.len()..], &mut pk)?;
    Ok(pk)
}

fn offer_input(utxo: &Utxo, redeem_script: bitcoin::ScriptBuf) -> Result<(OutPoint, TxInput)> {
    let outpoint = OutPoint::try_from(&utxo.outpoint)?;
    Ok((
        outpoint,
        TxInput::new(outpoint, SignData::p2sh(utxo.value, redeem_script)),
    ))
}

fn parse_oneshot_offer(utxo: &Utxo, plugin: &PluginEntry, _: &AgoraConfig) -> Result<AgoraOffer> {
    let token = utxo_token(utxo)?;
    if token.token_type.protocol != TokenProtocol::Slp {
        return Err(Error::UnsupportedProtocol(
            token.token_type.protocol.to_string(),
        ));
    }
    let outputs_ser = data_item(plugin, 1)?;
    let mut enforced_outputs = vec![TxOut {
        value: 0,
        script_pubkey: slp_send(&token.token_id, token.token_type.number, &[0, token.amount])?,
    }];
    let mut rest = outputs_ser.as_slice();
    while !rest.is_empty() {
        let (output, consumed) = deserialize_partial::<TxOut>(rest)
            .map_err(|e| unparseable(format!("enforced outputs: {e}")))?;
        enforced_outputs.push(output);
        rest = &rest[consumed..];
    }
    let oneshot = AgoraOneshot::new(enforced_outputs, group_pubkey(plugin)?);
    let (outpoint, tx_builder_input) = offer_input(utxo, oneshot.script())?;
    Ok(AgoraOffer {
        variant: AgoraOfferVariant::Oneshot(oneshot),
        outpoint,
        tx_builder_input,
        token,
    })
}

fn parse_partial_offer(
    utxo: &Utxo,
    plugin: &PluginEntry,
    config: &AgoraConfig,
) -> Result<AgoraOffer> {
    let token = utxo_token(utxo)?;
    let num_token_trunc_bytes = data_u8(plugin, 1)?;
    let trunc_tokens = token
        .amount
        .checked_shr(8 * u32::from(num_token_trunc_bytes))
        .ok_or_else(|| unparseable(format!("{num_token_trunc_bytes} token trunc bytes")))?;
    let mut partial = AgoraPartial {
        trunc_tokens,
        num_token_trunc_bytes,
        num_sats_trunc_bytes: data_u8(plugin, 2)?,
        token_scale_factor: data_u64(plugin, 3)?,
        scaled_trunc_tokens_per_trunc_sat: data_u64(plugin, 4)?,
        min_accepted_scaled_trunc_tokens: data_u64(plugin, 5)?,
        maker_pk: group_pubkey(plugin)?,
        token_id: token.token_id.clone(),
        token_type: token.token_type.number,
        token_protocol: token.token_type.protocol,
        script_len: INITIAL_SCRIPT_LEN,
        dust_amount: config.dust_amount,
    };
    partial.update_script_len()?;
    let (outpoint, tx_builder_input) = offer_input(utxo, partial.script()?)?;
    Ok(AgoraOffer {
        variant: AgoraOfferVariant::Partial(partial),
        outpoint,
        tx_builder_input,
        token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(data: &[&str], groups: &[&str]) -> PluginEntry {
        PluginEntry {
            data: data.iter().map(|s| s.to_string()).collect(),
            groups: groups.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn pubkey_comes_from_p_group() {
        let pk = [2; 33];
        let plugin = entry(
            &[],
            &[&format!("54{}", "11".repeat(32)), &format!("50{}", hex::encode(pk))],
        );
        assert_eq!(group_pubkey(&plugin).unwrap(), pk);
        assert!(matches!(
            group_pubkey(&entry(&[], &["5411"])),
            Err(Error::UnparseableOffer(_))
        ));
        assert!(group_pubkey(&entry(&[], &["50aabb"])).is_err());
    }

    #[test]
    fn fixed_width_data_items() {
        let plugin = entry(&["00", "0102", "2a00000000000000"], &[]);
        assert!(matches!(data_u8(&plugin, 1), Err(Error::UnparseableOffer(_))));
        assert_eq!(data_u8(&plugin, 0).unwrap(), 0);
        assert_eq!(data_u64(&plugin, 2).unwrap(), 42);
        assert!(data_u64(&plugin, 1).is_err());
        assert!(data_item(&plugin, 3).is_err());
        assert!(matches!(
            data_item(&entry(&["zz"], &[]), 0),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn utxo_without_agora_data_is_skipped() {
        let utxo = Utxo {
            outpoint: crate::discovery::UtxoOutPoint {
                txid: "00".repeat(32),
                out_idx: 0,
            },
            value: 546,
            token: None,
            plugins: None,
        };
        assert!(parse_offer_utxo(&utxo, &AgoraConfig::default()).unwrap().is_none());
    }
}
