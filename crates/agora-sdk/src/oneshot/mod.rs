//! One-shot offers: all offered tokens for a fixed set of outputs.

pub mod contract;
pub mod params;
pub mod witness;

pub use contract::{AGORA_LOKAD_ID, OneshotAd, parse_ad_script};
pub use params::AgoraOneshot;
pub use witness::{AgoraOneshotCancelSignatory, AgoraOneshotSignatory};
