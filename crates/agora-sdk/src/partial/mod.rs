//! Partial offers: any amount above a minimum can be accepted, and the
//! rest is re-offered under the same terms.

pub mod contract;
pub mod params;
pub mod witness;

pub use params::{AgoraPartial, MAX_SCRIPT_INT};
pub use witness::{AgoraPartialCancelSignatory, AgoraPartialSignatory};
