use agora_sdk::bitcoin::TxOut;
use agora_sdk::config::AgoraConfig;
use agora_sdk::discovery::{PluginEntry, Utxo};
use agora_sdk::testing::{
    GroupsRequest, MockPluginEndpoint, oneshot_offer_utxo, partial_offer_utxo, test_p2pkh_script,
    test_partial, test_pubkey, test_token_id,
};
use agora_sdk::token::{TokenProtocol, slp_send};
use agora_sdk::{
    Agora, AgoraOfferVariant, AgoraOneshot, Error, FUNGIBLE_TOKEN_ID_PREFIX, PUBKEY_PREFIX,
    TOKEN_ID_PREFIX,
};

const MAKER_SK: [u8; 32] = [3; 32];

fn oneshot(token_id: &str) -> AgoraOneshot {
    AgoraOneshot::new(
        vec![
            TxOut {
                value: 0,
                script_pubkey: slp_send(token_id, 1, &[0, 10]).unwrap(),
            },
            TxOut {
                value: 5_000,
                script_pubkey: test_p2pkh_script(&MAKER_SK),
            },
        ],
        test_pubkey(&MAKER_SK),
    )
}

// ---------------------------------------------------------------------------
// Token id listings
// ---------------------------------------------------------------------------

#[tokio::test]
async fn token_ids_follow_pagination() {
    let a = test_token_id(0xaa);
    let b = test_token_id(0xbb);
    let c = test_token_id(0xcc);
    let endpoint = MockPluginEndpoint::new()
        .with_page(FUNGIBLE_TOKEN_ID_PREFIX, None, &[a.as_str(), b.as_str()], "cursor1")
        .with_page(FUNGIBLE_TOKEN_ID_PREFIX, Some("cursor1"), &[c.as_str()], "");
    let agora = Agora::new(endpoint);

    let ids = agora.offered_fungible_token_ids().await.unwrap();
    assert_eq!(ids, vec![a, b, c]);

    let requests = agora.endpoint().groups_requests();
    assert_eq!(
        requests,
        vec![
            GroupsRequest {
                prefix_hex: FUNGIBLE_TOKEN_ID_PREFIX.to_string(),
                start_hex: None,
                page_size: 50,
            },
            GroupsRequest {
                prefix_hex: FUNGIBLE_TOKEN_ID_PREFIX.to_string(),
                start_hex: Some("cursor1".to_string()),
                page_size: 50,
            },
        ]
    );
}

#[tokio::test]
async fn empty_listings_stop_after_first_page() {
    let agora = Agora::new(MockPluginEndpoint::new());
    assert!(agora.all_offered_token_ids().await.unwrap().is_empty());
    assert!(agora.offered_group_token_ids().await.unwrap().is_empty());
    let requests = agora.endpoint().groups_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].prefix_hex, "54");
    assert_eq!(requests[1].prefix_hex, "47");
}

#[tokio::test]
async fn page_size_comes_from_config() {
    let config: AgoraConfig = serde_json::from_str(r#"{ "page_size": 10 }"#).unwrap();
    assert_eq!(config.plugin_name, "agora");
    let agora = Agora::with_config(MockPluginEndpoint::new(), config);
    agora.all_offered_token_ids().await.unwrap();
    assert_eq!(agora.endpoint().groups_requests()[0].page_size, 10);
}

// ---------------------------------------------------------------------------
// Offer queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn offers_by_token_id_skip_unparseable() {
    let token_id = test_token_id(0x42);
    let partial = test_partial(&token_id, TokenProtocol::Slp, test_pubkey(&MAKER_SK)).unwrap();

    let mut unknown_tag = partial_offer_utxo(&partial, 0x02).unwrap();
    if let Some(plugins) = unknown_tag.plugins.as_mut() {
        plugins.insert(
            "agora".to_string(),
            PluginEntry {
                data: vec!["58595a".to_string()],
                groups: vec![],
            },
        );
    }
    let mut no_plugins = partial_offer_utxo(&partial, 0x03).unwrap();
    no_plugins.plugins = None;
    let mut unknown_protocol = partial_offer_utxo(&partial, 0x04).unwrap();
    unknown_protocol.token.as_mut().unwrap().token_type.protocol = "UNKNOWN".to_string();
    let mut truncated_data = partial_offer_utxo(&partial, 0x05).unwrap();
    if let Some(entry) = truncated_data.plugins.as_mut().and_then(|p| p.get_mut("agora")) {
        entry.data.truncate(3);
    }

    let group = format!("{TOKEN_ID_PREFIX}{token_id}");
    let endpoint = MockPluginEndpoint::new().with_utxos(
        &group,
        vec![
            partial_offer_utxo(&partial, 0x01).unwrap(),
            unknown_tag,
            no_plugins,
            unknown_protocol,
            truncated_data,
            oneshot_offer_utxo(&oneshot(&token_id), &token_id, 10, 0x06),
        ],
    );
    let agora = Agora::new(endpoint);

    let offers = agora.active_offers_by_token_id(&token_id).await.unwrap();
    assert_eq!(offers.len(), 2);
    assert!(matches!(offers[0].variant, AgoraOfferVariant::Partial(_)));
    assert!(matches!(offers[1].variant, AgoraOfferVariant::Oneshot(_)));
    assert_eq!(agora.endpoint().utxos_requests(), vec![group]);
}

#[tokio::test]
async fn offers_by_pub_key_query_pubkey_group() {
    let token_id = test_token_id(0x43);
    let pk_hex = hex::encode(test_pubkey(&MAKER_SK));
    let group = format!("{PUBKEY_PREFIX}{pk_hex}");
    let endpoint = MockPluginEndpoint::new().with_utxos(
        &group,
        vec![oneshot_offer_utxo(&oneshot(&token_id), &token_id, 10, 0x07)],
    );
    let agora = Agora::new(endpoint);

    let offers = agora.active_offers_by_pub_key(&pk_hex).await.unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].asked_sats(None).unwrap(), 5_000);
    assert!(
        agora
            .active_offers_by_group_token_id(&token_id)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(
        agora.endpoint().utxos_requests(),
        vec![group, format!("47{token_id}")]
    );
}

#[tokio::test]
async fn transport_errors_propagate() {
    let token_id = test_token_id(0x44);
    let endpoint =
        MockPluginEndpoint::new().with_failing_group(&format!("{TOKEN_ID_PREFIX}{token_id}"));
    let agora = Agora::new(endpoint);
    assert!(matches!(
        agora.active_offers_by_token_id(&token_id).await,
        Err(Error::Transport(_))
    ));
}

#[tokio::test]
async fn custom_plugin_name_is_used() {
    let token_id = test_token_id(0x45);
    let partial = test_partial(&token_id, TokenProtocol::Alp, test_pubkey(&MAKER_SK)).unwrap();
    let mut utxo = partial_offer_utxo(&partial, 0x08).unwrap();
    let entry = utxo
        .plugins
        .as_mut()
        .and_then(|plugins| plugins.remove("agora"))
        .unwrap();
    utxo.plugins.as_mut().unwrap().insert("agora-test".to_string(), entry);

    let group = format!("{TOKEN_ID_PREFIX}{token_id}");
    let default_agora =
        Agora::new(MockPluginEndpoint::new().with_utxos(&group, vec![utxo.clone()]));
    assert!(
        default_agora
            .active_offers_by_token_id(&token_id)
            .await
            .unwrap()
            .is_empty()
    );

    let config = AgoraConfig {
        plugin_name: "agora-test".to_string(),
        ..Default::default()
    };
    let agora = Agora::with_config(MockPluginEndpoint::new().with_utxos(&group, vec![utxo]), config);
    let offers = agora.active_offers_by_token_id(&token_id).await.unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].variant, AgoraOfferVariant::Partial(partial));
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[test]
fn utxo_json_from_indexer() {
    let json = r#"{
        "outpoint": {
            "txid": "1111111111111111111111111111111111111111111111111111111111111111",
            "outIdx": 1
        },
        "value": "546",
        "token": {
            "tokenId": "2222222222222222222222222222222222222222222222222222222222222222",
            "tokenType": { "protocol": "ALP", "number": 0 },
            "amount": "256000"
        },
        "plugins": {
            "agora": {
                "data": ["5041525449414c", "01"],
                "groups": ["50aa"]
            }
        }
    }"#;
    let utxo: Utxo = serde_json::from_str(json).unwrap();
    assert_eq!(utxo.outpoint.out_idx, 1);
    assert_eq!(utxo.value, 546);
    let token = utxo.token.as_ref().unwrap();
    assert_eq!(token.amount, 256_000);
    assert!(!token.is_mint_baton);
    let entry = &utxo.plugins.as_ref().unwrap()["agora"];
    assert_eq!(entry.data[0], agora_sdk::PARTIAL_HEX);
    // data[2..] is missing
    assert!(matches!(
        agora_sdk::parse_offer_utxo(&utxo, &AgoraConfig::default()),
        Err(Error::UnparseableOffer(_))
    ));
}
