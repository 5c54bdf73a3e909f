use super::endpoint::PluginEndpoint;
use super::parse::parse_offer_utxo;
use super::{FUNGIBLE_TOKEN_ID_PREFIX, GROUP_TOKEN_ID_PREFIX, PUBKEY_PREFIX, TOKEN_ID_PREFIX};
use crate::config::AgoraConfig;
use crate::error::Result;
use crate::offer::AgoraOffer;

/// Queries active offers from an indexer with the Agora plugin loaded.
///
/// Every method awaits one indexer request at a time; dropping the returned
/// future between pages stops the enumeration.
pub struct Agora<P> {
    endpoint: P,
    config: AgoraConfig,
}

impl<P: PluginEndpoint> Agora<P> {
    pub fn new(endpoint: P) -> Self {
        Self::with_config(endpoint, AgoraConfig::default())
    }

    pub fn with_config(endpoint: P, config: AgoraConfig) -> Self {
        Self { endpoint, config }
    }

    pub fn endpoint(&self) -> &P {
        &self.endpoint
    }

    pub fn config(&self) -> &AgoraConfig {
        &self.config
    }

    /// Token ids (fungible and not) with active offers.
    pub async fn all_offered_token_ids(&self) -> Result<Vec<String>> {
        self.all_ids_by_prefix(TOKEN_ID_PREFIX).await
    }

    /// Fungible token ids with active offers.
    pub async fn offered_fungible_token_ids(&self) -> Result<Vec<String>> {
        self.all_ids_by_prefix(FUNGIBLE_TOKEN_ID_PREFIX).await
    }

    /// Group token ids of non-fungible tokens with active offers.
    pub async fn offered_group_token_ids(&self) -> Result<Vec<String>> {
        self.all_ids_by_prefix(GROUP_TOKEN_ID_PREFIX).await
    }

    pub async fn active_offers_by_token_id(&self, token_id: &str) -> Result<Vec<AgoraOffer>> {
        self.active_offers_by_group(&format!("{TOKEN_ID_PREFIX}{token_id}"))
            .await
    }

    pub async fn active_offers_by_group_token_id(
        &self,
        group_token_id: &str,
    ) -> Result<Vec<AgoraOffer>> {
        self.active_offers_by_group(&format!("{GROUP_TOKEN_ID_PREFIX}{group_token_id}"))
            .await
    }

    /// Offers cancelable by `pubkey_hex`.
    pub async fn active_offers_by_pub_key(&self, pubkey_hex: &str) -> Result<Vec<AgoraOffer>> {
        self.active_offers_by_group(&format!("{PUBKEY_PREFIX}{pubkey_hex}"))
            .await
    }

    async fn all_ids_by_prefix(&self, prefix_hex: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut next_start: Option<String> = None;
        loop {
            log::trace!("fetching groups {prefix_hex} from {next_start:?}");
            let page = self
                .endpoint
                .groups(prefix_hex, next_start.as_deref(), self.config.page_size)
                .await?;
            ids.extend(page.groups.into_iter().map(|group| {
                group
                    .group
                    .strip_prefix(prefix_hex)
                    .map(str::to_string)
                    .unwrap_or(group.group)
            }));
            if page.next_start.is_empty() {
                break;
            }
            next_start = Some(page.next_start);
        }
        log::debug!("{} groups under prefix {prefix_hex}", ids.len());
        Ok(ids)
    }

    async fn active_offers_by_group(&self, group_hex: &str) -> Result<Vec<AgoraOffer>> {
        let utxos = self.endpoint.utxos(group_hex).await?;
        let mut offers = Vec::with_capacity(utxos.utxos.len());
        for utxo in &utxos.utxos {
            match parse_offer_utxo(utxo, &self.config) {
                Ok(Some(offer)) => offers.push(offer),
                Ok(None) => {
                    log::debug!(
                        "skipping {}:{}: not an agora offer",
                        utxo.outpoint.txid,
                        utxo.outpoint.out_idx
                    );
                }
                Err(e) => {
                    log::debug!(
                        "skipping {}:{}: {e}",
                        utxo.outpoint.txid,
                        utxo.outpoint.out_idx
                    );
                }
            }
        }
        log::debug!(
            "{} of {} utxos in group {group_hex} are offers",
            offers.len(),
            utxos.utxos.len()
        );
        Ok(offers)
    }
}
