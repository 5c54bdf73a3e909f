use agora_sdk::bitcoin::TxOut;
use agora_sdk::config::AgoraConfig;
use agora_sdk::testing::{
    fuel_input, oneshot_offer_utxo, test_p2pkh_script, test_pubkey, test_token_id,
};
use agora_sdk::token::{TokenProtocol, slp_send};
use agora_sdk::{
    AcceptTxParams, AgoraOffer, AgoraOfferVariant, AgoraOneshot, CancelTxParams, Ecc, Error,
    Secp256k1Ecc, parse_offer_utxo,
};

const CANCEL_SK: [u8; 32] = [5; 32];
const MAKER_SK: [u8; 32] = [6; 32];
const BUYER_SK: [u8; 32] = [7; 32];
const PRICE: u64 = 80_000;

fn nft_oneshot(token_id: &str) -> AgoraOneshot {
    AgoraOneshot::new(
        vec![
            TxOut {
                value: 0,
                script_pubkey: slp_send(token_id, 0x41, &[0, 1]).unwrap(),
            },
            TxOut {
                value: PRICE,
                script_pubkey: test_p2pkh_script(&MAKER_SK),
            },
        ],
        test_pubkey(&CANCEL_SK),
    )
}

fn parsed_offer() -> (AgoraOneshot, AgoraOffer) {
    let token_id = test_token_id(0x11);
    let oneshot = nft_oneshot(&token_id);
    let mut utxo = oneshot_offer_utxo(&oneshot, &token_id, 1, 0x21);
    utxo.token.as_mut().unwrap().token_type.number = 0x41;
    let offer = parse_offer_utxo(&utxo, &AgoraConfig::default())
        .unwrap()
        .expect("oneshot offer");
    (oneshot, offer)
}

#[test]
fn parsed_offer_matches_listing() {
    let (oneshot, offer) = parsed_offer();
    assert_eq!(offer.variant, AgoraOfferVariant::Oneshot(oneshot.clone()));
    assert_eq!(offer.token.amount, 1);
    assert_eq!(offer.outpoint.vout, 1);
    let sign_data = offer.tx_builder_input.sign_data.as_ref().unwrap();
    assert_eq!(sign_data.redeem_script.as_ref(), Some(&oneshot.script()));
    assert_eq!(offer.asked_sats(None).unwrap(), PRICE);
}

#[test]
fn accept_pays_enforced_outputs_first() {
    let ecc = Secp256k1Ecc::new();
    let (oneshot, offer) = parsed_offer();
    let recipient = test_p2pkh_script(&BUYER_SK);
    let covenant_sk = [8; 32];

    let tx = offer
        .accept_tx(
            &ecc,
            AcceptTxParams {
                covenant_sk,
                covenant_pk: ecc.derive_pubkey(&covenant_sk).unwrap(),
                fuel_inputs: vec![fuel_input(BUYER_SK, 100_000, 0x31)],
                recipient_script: recipient.clone(),
                accepted_tokens: None,
                dust_amount: None,
                fee_per_kb: None,
            },
        )
        .unwrap();

    assert_eq!(tx.version, 2);
    assert_eq!(tx.input.len(), 2);
    assert_eq!(tx.input[1].previous_output, offer.outpoint);
    assert_eq!(tx.output[..2], oneshot.enforced_outputs[..]);
    assert_eq!(tx.output[2].value, 546);
    assert_eq!(tx.output[2].script_pubkey, recipient);
    assert_eq!(tx.output.len(), 4);
    let leftover = tx.output[3].value;
    // the offer input's dust pays for the buyer's dust output
    assert!(leftover > 0 && leftover < 100_000 - PRICE);
}

#[test]
fn accept_fee_grows_with_inputs() {
    let (_, offer) = parsed_offer();
    let recipient = test_p2pkh_script(&BUYER_SK);
    let one = offer
        .accept_fee_sats(&recipient, &[fuel_input(BUYER_SK, 50_000, 1)], None, None)
        .unwrap();
    let two = offer
        .accept_fee_sats(
            &recipient,
            &[fuel_input(BUYER_SK, 50_000, 1), fuel_input(BUYER_SK, 50_000, 2)],
            None,
            None,
        )
        .unwrap();
    assert!(two > one);
    let doubled = offer
        .accept_fee_sats(&recipient, &[fuel_input(BUYER_SK, 50_000, 1)], Some(2000), None)
        .unwrap();
    assert!(doubled >= 2 * one - 1);
}

#[test]
fn accept_without_funds_fails() {
    let ecc = Secp256k1Ecc::new();
    let (_, offer) = parsed_offer();
    let err = offer
        .accept_tx(
            &ecc,
            AcceptTxParams {
                covenant_sk: [8; 32],
                covenant_pk: ecc.derive_pubkey(&[8; 32]).unwrap(),
                fuel_inputs: vec![fuel_input(BUYER_SK, 10_000, 0x31)],
                recipient_script: test_p2pkh_script(&BUYER_SK),
                accepted_tokens: None,
                dust_amount: None,
                fee_per_kb: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::InsufficientInputValue { .. }));
}

#[test]
fn accept_rejects_alp_token() {
    let ecc = Secp256k1Ecc::new();
    let (_, mut offer) = parsed_offer();
    offer.token.token_type.protocol = TokenProtocol::Alp;
    let err = offer
        .accept_tx(
            &ecc,
            AcceptTxParams {
                covenant_sk: [8; 32],
                covenant_pk: ecc.derive_pubkey(&[8; 32]).unwrap(),
                fuel_inputs: vec![fuel_input(BUYER_SK, 100_000, 0x31)],
                recipient_script: test_p2pkh_script(&BUYER_SK),
                accepted_tokens: None,
                dust_amount: None,
                fee_per_kb: None,
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedProtocol(_)));
}

#[test]
fn cancel_returns_all_tokens() {
    let ecc = Secp256k1Ecc::new();
    let (_, offer) = parsed_offer();
    let recipient = test_p2pkh_script(&MAKER_SK);
    let tx = offer
        .cancel_tx(
            &ecc,
            CancelTxParams {
                cancel_sk: CANCEL_SK,
                fuel_inputs: vec![fuel_input(MAKER_SK, 10_000, 0x32)],
                recipient_script: recipient.clone(),
                dust_amount: None,
                fee_per_kb: None,
            },
        )
        .unwrap();
    assert_eq!(tx.input.len(), 2);
    assert_eq!(tx.input[1].previous_output, offer.outpoint);
    assert_eq!(
        tx.output[0].script_pubkey,
        slp_send(&offer.token.token_id, 0x41, &[1]).unwrap()
    );
    assert_eq!(tx.output[1].value, 546);
    assert_eq!(tx.output[1].script_pubkey, recipient);
}

#[test]
fn cancel_with_wrong_key_still_builds() {
    let ecc = Secp256k1Ecc::new();
    let (_, offer) = parsed_offer();
    let tx = offer
        .cancel_tx(
            &ecc,
            CancelTxParams {
                cancel_sk: [9; 32],
                fuel_inputs: vec![fuel_input(MAKER_SK, 10_000, 0x32)],
                recipient_script: test_p2pkh_script(&MAKER_SK),
                dust_amount: None,
                fee_per_kb: None,
            },
        )
        .unwrap();
    assert_eq!(
        tx.output[0].script_pubkey,
        slp_send(&offer.token.token_id, 0x41, &[1]).unwrap()
    );
}

#[test]
fn cancel_fee_counts_extra_inputs() {
    let (_, offer) = parsed_offer();
    let recipient = test_p2pkh_script(&MAKER_SK);
    let bare = offer.cancel_fee_sats(&recipient, &[], None).unwrap();
    let with_fuel = offer
        .cancel_fee_sats(&recipient, &[fuel_input(MAKER_SK, 10_000, 3)], None)
        .unwrap();
    assert!(bare > 0);
    assert!(with_fuel > bare);
}
