use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;

use bitcoin::{OutPoint, Txid};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::token::{Token, TokenProtocol, TokenType, U64StringSerde};

/// Group listing and UTXO queries of an indexer plugin.
///
/// Implemented by the transport (an HTTP client in production, an in-memory
/// mock in tests). Failures should be reported as [`Error::Transport`]; the
/// discovery client does not retry.
pub trait PluginEndpoint: Send + Sync {
    /// One page of groups starting with `prefix_hex`, from `start_hex` on.
    fn groups(
        &self,
        prefix_hex: &str,
        start_hex: Option<&str>,
        page_size: usize,
    ) -> impl Future<Output = Result<PluginGroups>> + Send;

    /// All UTXOs in the group `group_hex`.
    fn utxos(&self, group_hex: &str) -> impl Future<Output = Result<PluginUtxos>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginGroup {
    /// Full group key in hex, prefix included.
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginGroups {
    pub groups: Vec<PluginGroup>,
    /// Cursor for the next page; empty when there are no more pages.
    pub next_start: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PluginUtxos {
    pub utxos: Vec<Utxo>,
}

/// Data a plugin attached to an output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PluginEntry {
    /// Hex-encoded data items.
    #[serde(default)]
    pub data: Vec<String>,
    /// Hex-encoded group keys the output belongs to.
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoOutPoint {
    /// Txid as displayed (big-endian hex).
    pub txid: String,
    pub out_idx: u32,
}

impl TryFrom<&UtxoOutPoint> for OutPoint {
    type Error = Error;

    fn try_from(outpoint: &UtxoOutPoint) -> Result<Self> {
        let txid = Txid::from_str(&outpoint.txid)
            .map_err(|e| Error::Encoding(format!("txid {}: {e}", outpoint.txid)))?;
        Ok(OutPoint {
            txid,
            vout: outpoint.out_idx,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtxoTokenType {
    /// Protocol name; anything but `SLP` and `ALP` is unsupported.
    pub protocol: String,
    pub number: u8,
}

/// Token as reported by the indexer, before its protocol is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoToken {
    pub token_id: String,
    pub token_type: UtxoTokenType,
    #[serde(with = "U64StringSerde")]
    pub amount: u64,
    #[serde(default)]
    pub is_mint_baton: bool,
}

impl TryFrom<&UtxoToken> for Token {
    type Error = Error;

    fn try_from(token: &UtxoToken) -> Result<Self> {
        Ok(Token {
            token_id: token.token_id.clone(),
            token_type: TokenType {
                protocol: TokenProtocol::from_str(&token.token_type.protocol)?,
                number: token.token_type.number,
            },
            amount: token.amount,
            is_mint_baton: token.is_mint_baton,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub outpoint: UtxoOutPoint,
    /// Value in sats.
    #[serde(with = "U64StringSerde")]
    pub value: u64,
    #[serde(default)]
    pub token: Option<UtxoToken>,
    /// Plugin data keyed by plugin name.
    #[serde(default)]
    pub plugins: Option<HashMap<String, PluginEntry>>,
}
