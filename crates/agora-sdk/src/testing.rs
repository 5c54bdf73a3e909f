//! Shared helpers for unit and integration tests.
//!
//! Provides an in-memory [`PluginEndpoint`], indexer UTXOs carrying the
//! plugin data the Agora plugin would attach to an offer, and funded P2PKH
//! fuel inputs.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use bitcoin::{OutPoint, ScriptBuf, Txid};

use crate::config::DEFAULT_DUST_LIMIT;
use crate::discovery::{
    FUNGIBLE_TOKEN_ID_PREFIX, ONESHOT_HEX, PARTIAL_HEX, PUBKEY_PREFIX, PluginEndpoint,
    PluginEntry, PluginGroup, PluginGroups, PluginUtxos, TOKEN_ID_PREFIX, Utxo, UtxoOutPoint,
    UtxoToken, UtxoTokenType,
};
use crate::ecc::{Ecc, Secp256k1Ecc};
use crate::error::{Error, Result};
use crate::oneshot::AgoraOneshot;
use crate::partial::AgoraPartial;
use crate::script::{p2pkh_script, sha_rmd160};
use crate::token::TokenProtocol;
use crate::tx::{P2pkhSignatory, SigHashType, SignData, TxBuilderInput, TxInput};

// ---------------------------------------------------------------------------
// Keys and ids
// ---------------------------------------------------------------------------

/// 64-char hex token id made of `byte` repeated.
pub fn test_token_id(byte: u8) -> String {
    hex::encode([byte; 32])
}

pub fn test_outpoint(byte: u8, vout: u32) -> OutPoint {
    OutPoint {
        txid: Txid::from_str(&hex::encode([byte; 32])).expect("valid txid"),
        vout,
    }
}

pub fn test_pubkey(sk: &[u8; 32]) -> [u8; 33] {
    Secp256k1Ecc::new().derive_pubkey(sk).expect("valid secret key")
}

pub fn test_p2pkh_script(sk: &[u8; 32]) -> ScriptBuf {
    p2pkh_script(&sha_rmd160(&test_pubkey(sk)))
}

/// P2PKH input worth `value` sats, spendable by `sk`.
pub fn fuel_input(sk: [u8; 32], value: u64, txid_byte: u8) -> TxBuilderInput {
    let pk = test_pubkey(&sk);
    TxBuilderInput::new(
        TxInput::new(
            test_outpoint(txid_byte, 0),
            SignData::with_output_script(value, p2pkh_script(&sha_rmd160(&pk))),
        ),
        Arc::new(P2pkhSignatory {
            sk,
            pk,
            sig_hash_type: SigHashType::ALL_BIP143,
        }),
    )
}

// ---------------------------------------------------------------------------
// Offers
// ---------------------------------------------------------------------------

/// Partial offer of 1000 truncated tokens (256 base units each) at a price
/// of 333 scaled tokens per 256 sats, with its script length settled.
pub fn test_partial(
    token_id: &str,
    protocol: TokenProtocol,
    maker_pk: [u8; 33],
) -> Result<AgoraPartial> {
    let mut partial = AgoraPartial {
        trunc_tokens: 1000,
        num_token_trunc_bytes: 1,
        token_scale_factor: 1000,
        scaled_trunc_tokens_per_trunc_sat: 333,
        num_sats_trunc_bytes: 1,
        maker_pk,
        min_accepted_scaled_trunc_tokens: 10_000,
        token_id: token_id.to_string(),
        token_type: match protocol {
            TokenProtocol::Slp => 1,
            TokenProtocol::Alp => 0,
        },
        token_protocol: protocol,
        script_len: 0x7f,
        dust_amount: DEFAULT_DUST_LIMIT,
    };
    partial.update_script_len()?;
    Ok(partial)
}

fn utxo_token(token_id: &str, protocol: &str, number: u8, amount: u64) -> UtxoToken {
    UtxoToken {
        token_id: token_id.to_string(),
        token_type: UtxoTokenType {
            protocol: protocol.to_string(),
            number,
        },
        amount,
        is_mint_baton: false,
    }
}

fn agora_plugins(entry: PluginEntry) -> Option<HashMap<String, PluginEntry>> {
    Some(HashMap::from([(crate::config::PLUGIN_NAME.to_string(), entry)]))
}

/// Indexer UTXO of `partial`, as the Agora plugin reports it.
pub fn partial_offer_utxo(partial: &AgoraPartial, txid_byte: u8) -> Result<Utxo> {
    Ok(Utxo {
        outpoint: UtxoOutPoint {
            txid: hex::encode([txid_byte; 32]),
            out_idx: 1,
        },
        value: partial.dust_amount,
        token: Some(utxo_token(
            &partial.token_id,
            &partial.token_protocol.to_string(),
            partial.token_type,
            partial.offered_tokens()?,
        )),
        plugins: agora_plugins(PluginEntry {
            data: vec![
                PARTIAL_HEX.to_string(),
                hex::encode([partial.num_token_trunc_bytes]),
                hex::encode([partial.num_sats_trunc_bytes]),
                hex::encode(partial.token_scale_factor.to_le_bytes()),
                hex::encode(partial.scaled_trunc_tokens_per_trunc_sat.to_le_bytes()),
                hex::encode(partial.min_accepted_scaled_trunc_tokens.to_le_bytes()),
            ],
            groups: vec![
                format!("{PUBKEY_PREFIX}{}", hex::encode(partial.maker_pk)),
                format!("{TOKEN_ID_PREFIX}{}", partial.token_id),
                format!("{FUNGIBLE_TOKEN_ID_PREFIX}{}", partial.token_id),
            ],
        }),
    })
}

/// Indexer UTXO of an SLP one-shot offer holding `amount` of `token_id`.
pub fn oneshot_offer_utxo(
    oneshot: &AgoraOneshot,
    token_id: &str,
    amount: u64,
    txid_byte: u8,
) -> Utxo {
    Utxo {
        outpoint: UtxoOutPoint {
            txid: hex::encode([txid_byte; 32]),
            out_idx: 1,
        },
        value: DEFAULT_DUST_LIMIT,
        token: Some(utxo_token(token_id, "SLP", 1, amount)),
        plugins: agora_plugins(PluginEntry {
            data: vec![
                ONESHOT_HEX.to_string(),
                hex::encode(oneshot.ad_outputs_ser()),
            ],
            groups: vec![
                format!("{PUBKEY_PREFIX}{}", hex::encode(oneshot.cancel_pk)),
                format!("{TOKEN_ID_PREFIX}{token_id}"),
            ],
        }),
    }
}

// ---------------------------------------------------------------------------
// Mock indexer
// ---------------------------------------------------------------------------

/// A `groups` call as received by [`MockPluginEndpoint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupsRequest {
    pub prefix_hex: String,
    pub start_hex: Option<String>,
    pub page_size: usize,
}

/// In-memory indexer plugin.
///
/// Group pages are keyed by prefix and start cursor, UTXO lists by group.
/// Unknown keys answer with an empty result; groups in `failing` answer
/// with a transport error.
#[derive(Debug, Default)]
pub struct MockPluginEndpoint {
    pages: HashMap<(String, Option<String>), PluginGroups>,
    utxos: HashMap<String, Vec<Utxo>>,
    failing: Vec<String>,
    groups_requests: Mutex<Vec<GroupsRequest>>,
    utxos_requests: Mutex<Vec<String>>,
}

impl MockPluginEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `groups` (without prefix) for `prefix_hex` from `start_hex`,
    /// pointing at `next_start` (empty for the last page).
    pub fn with_page(
        mut self,
        prefix_hex: &str,
        start_hex: Option<&str>,
        groups: &[&str],
        next_start: &str,
    ) -> Self {
        self.pages.insert(
            (prefix_hex.to_string(), start_hex.map(str::to_string)),
            PluginGroups {
                groups: groups
                    .iter()
                    .map(|id| PluginGroup {
                        group: format!("{prefix_hex}{id}"),
                    })
                    .collect(),
                next_start: next_start.to_string(),
            },
        );
        self
    }

    pub fn with_utxos(mut self, group_hex: &str, utxos: Vec<Utxo>) -> Self {
        self.utxos.insert(group_hex.to_string(), utxos);
        self
    }

    pub fn with_failing_group(mut self, group_hex: &str) -> Self {
        self.failing.push(group_hex.to_string());
        self
    }

    pub fn groups_requests(&self) -> Vec<GroupsRequest> {
        self.groups_requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn utxos_requests(&self) -> Vec<String> {
        self.utxos_requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl PluginEndpoint for MockPluginEndpoint {
    async fn groups(
        &self,
        prefix_hex: &str,
        start_hex: Option<&str>,
        page_size: usize,
    ) -> Result<PluginGroups> {
        if let Ok(mut requests) = self.groups_requests.lock() {
            requests.push(GroupsRequest {
                prefix_hex: prefix_hex.to_string(),
                start_hex: start_hex.map(str::to_string),
                page_size,
            });
        }
        Ok(self
            .pages
            .get(&(prefix_hex.to_string(), start_hex.map(str::to_string)))
            .cloned()
            .unwrap_or_else(|| PluginGroups {
                groups: vec![],
                next_start: String::new(),
            }))
    }

    async fn utxos(&self, group_hex: &str) -> Result<PluginUtxos> {
        if let Ok(mut requests) = self.utxos_requests.lock() {
            requests.push(group_hex.to_string());
        }
        if self.failing.iter().any(|group| group == group_hex) {
            return Err(Error::Transport(format!("group {group_hex} unavailable")));
        }
        Ok(PluginUtxos {
            utxos: self.utxos.get(group_hex).cloned().unwrap_or_default(),
        })
    }
}
