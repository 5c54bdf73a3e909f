//! Finding active offers through an indexer running the Agora plugin.
//!
//! The plugin groups offer UTXOs under keys made of a one-byte namespace
//! prefix and an identifier, all in hex.

pub(crate) mod endpoint;
pub(crate) mod parse;
pub(crate) mod service;

pub use endpoint::{
    PluginEndpoint, PluginEntry, PluginGroup, PluginGroups, PluginUtxos, Utxo, UtxoOutPoint,
    UtxoToken, UtxoTokenType,
};
pub use parse::parse_offer_utxo;
pub use service::Agora;

// ---------------------------------------------------------------------------
// Group key prefixes
// ---------------------------------------------------------------------------

/// `"T"`: any token id.
pub const TOKEN_ID_PREFIX: &str = "54";
/// `"P"`: cancel / maker public key.
pub const PUBKEY_PREFIX: &str = "50";
/// `"F"`: fungible token id.
pub const FUNGIBLE_TOKEN_ID_PREFIX: &str = "46";
/// `"G"`: group token id of non-fungible tokens.
pub const GROUP_TOKEN_ID_PREFIX: &str = "47";

// ---------------------------------------------------------------------------
// Covenant tags
// ---------------------------------------------------------------------------

/// `"ONESHOT"` in hex.
pub const ONESHOT_HEX: &str = "4f4e4553484f54";
/// `"PARTIAL"` in hex.
pub const PARTIAL_HEX: &str = "5041525449414c";
