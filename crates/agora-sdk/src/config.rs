use serde::Deserialize;

/// Name under which the indexer exposes the Agora plugin.
pub const PLUGIN_NAME: &str = "agora";

/// Minimum value of a payable output, in sats.
pub const DEFAULT_DUST_LIMIT: u64 = 546;

/// Default fee rate, in sats per 1000 bytes.
pub const DEFAULT_FEE_PER_KB: u64 = 1000;

/// Largest page the indexer serves for a group listing.
pub const PLUGIN_GROUPS_MAX_PAGE_SIZE: usize = 50;

/// Configuration for the [`Agora`](crate::discovery::Agora) client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AgoraConfig {
    /// Plugin name queried on the indexer.
    pub plugin_name: String,
    /// Dust amount assumed by parsed partial offers for their remainder output.
    pub dust_amount: u64,
    /// Page size for group listings.
    pub page_size: usize,
}

impl Default for AgoraConfig {
    fn default() -> Self {
        Self {
            plugin_name: PLUGIN_NAME.to_string(),
            dust_amount: DEFAULT_DUST_LIMIT,
            page_size: PLUGIN_GROUPS_MAX_PAGE_SIZE,
        }
    }
}
