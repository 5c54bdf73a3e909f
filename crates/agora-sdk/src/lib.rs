pub use bitcoin;

pub mod config;
pub mod discovery;
pub mod ecc;
pub mod error;
pub mod offer;
pub mod oneshot;
pub mod partial;
pub mod script;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod token;
pub mod tx;

// Core types
pub use config::{AgoraConfig, DEFAULT_DUST_LIMIT, DEFAULT_FEE_PER_KB};
pub use error::{Error, Result};
pub use offer::{AcceptTxParams, AgoraOffer, AgoraOfferVariant, CancelTxParams};

// Covenants
pub use oneshot::{
    AgoraOneshot, AgoraOneshotCancelSignatory, AgoraOneshotSignatory, OneshotAd, parse_ad_script,
};
pub use partial::{AgoraPartial, AgoraPartialCancelSignatory, AgoraPartialSignatory};

// Transaction building
pub use ecc::{Ecc, Secp256k1Ecc, random_covenant_keypair};
pub use tx::{
    P2pkhSignatory, SigHashType, SignData, Signatory, TxBuilder, TxBuilderInput, TxBuilderOutput,
    TxInput, UnsignedTxInput, fee_for_size,
};

// Tokens
pub use token::{Token, TokenProtocol, TokenType, alp_send, empp_script, slp_send};

// Discovery
pub use discovery::{
    Agora, FUNGIBLE_TOKEN_ID_PREFIX, GROUP_TOKEN_ID_PREFIX, ONESHOT_HEX, PARTIAL_HEX,
    PUBKEY_PREFIX, PluginEndpoint, PluginGroups, PluginUtxos, TOKEN_ID_PREFIX, Utxo,
    parse_offer_utxo,
};
