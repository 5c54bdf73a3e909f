use bitcoin::secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};

use crate::error::Result;

/// Size of the placeholder ECDSA signature produced in measurement mode.
///
/// 72 bytes is the largest low-S DER signature, so measured sizes never
/// undercount.
pub const DUMMY_ECDSA_SIG_LEN: usize = 72;

/// Signing capability handed to signatories.
///
/// Keys are raw byte arrays so that measurement can run with all-zero
/// placeholder keys that are not valid secp256k1 scalars.
pub trait Ecc {
    /// DER-encoded ECDSA signature over a 32-byte message digest.
    fn ecdsa_sign(&self, sk: &[u8; 32], msg: &[u8; 32]) -> Result<Vec<u8>>;

    /// Compressed public key for `sk`.
    fn derive_pubkey(&self, sk: &[u8; 32]) -> Result<[u8; 33]>;
}

/// Real signer backed by libsecp256k1.
pub struct Secp256k1Ecc {
    secp: Secp256k1<All>,
}

impl Secp256k1Ecc {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }
}

impl Default for Secp256k1Ecc {
    fn default() -> Self {
        Self::new()
    }
}

impl Ecc for Secp256k1Ecc {
    fn ecdsa_sign(&self, sk: &[u8; 32], msg: &[u8; 32]) -> Result<Vec<u8>> {
        let sk = SecretKey::from_slice(sk)?;
        let msg = Message::from_slice(msg)?;
        let sig = self.secp.sign_ecdsa(&msg, &sk);
        Ok(sig.serialize_der().to_vec())
    }

    fn derive_pubkey(&self, sk: &[u8; 32]) -> Result<[u8; 33]> {
        let sk = SecretKey::from_slice(sk)?;
        Ok(PublicKey::from_secret_key(&self.secp, &sk).serialize())
    }
}

/// Placeholder signer used only to measure transaction sizes.
///
/// Produces correctly sized, invalid signatures. It is deliberately not
/// exported: the only way to sign with it is
/// [`TxBuilder::measure`](crate::tx::TxBuilder::measure), which returns a
/// byte count rather than a transaction.
pub(crate) struct EccDummy;

impl Ecc for EccDummy {
    fn ecdsa_sign(&self, _sk: &[u8; 32], _msg: &[u8; 32]) -> Result<Vec<u8>> {
        Ok(vec![0; DUMMY_ECDSA_SIG_LEN])
    }

    fn derive_pubkey(&self, _sk: &[u8; 32]) -> Result<[u8; 33]> {
        Ok([0; 33])
    }
}

/// Generate a fresh random keypair for the covenant signature of an accept
/// transaction. The key carries no funds; any valid key works.
pub fn random_covenant_keypair(ecc: &Secp256k1Ecc) -> Result<([u8; 32], [u8; 33])> {
    let sk = SecretKey::new(&mut rand::thread_rng()).secret_bytes();
    let pk = ecc.derive_pubkey(&sk)?;
    Ok((sk, pk))
}
