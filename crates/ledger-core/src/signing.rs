//! Signing service boundary.
//!
//! The ledger only ever sees keys and signatures as lowercase hex strings.
//! Everything cryptographic is delegated to Ed25519.

use crate::constants::{PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
use crate::error::LedgerError;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use std::fmt;
use std::str::FromStr;

/// Hex encoded Ed25519 verifying key.
pub type PublicKey = String;

/// An Ed25519 secret key.
#[derive(Clone)]
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        Self::from_bytes(&seed)
    }

    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            inner: SigningKey::from_bytes(bytes),
        }
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.inner.to_bytes())
    }
}

impl FromStr for PrivateKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| LedgerError::InvalidKey("private key must be 32 bytes".to_string()))?;
        Ok(Self::from_bytes(&seed))
    }
}

// Never print secret material.
impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public", &derive_public_key(self))
            .finish_non_exhaustive()
    }
}

pub fn derive_public_key(key: &PrivateKey) -> PublicKey {
    hex::encode(key.inner.verifying_key().as_bytes())
}

pub fn sign(key: &PrivateKey, message: &str) -> String {
    hex::encode(key.inner.sign(message.as_bytes()).to_bytes())
}

/// Returns false for anything that does not decode to a key and signature of
/// the right size, as well as for signatures that simply don't match.
pub fn verify(public_key: &str, message: &str, signature: &str) -> bool {
    let Some(key) = decode_array::<PUBLIC_KEY_SIZE>(public_key) else {
        return false;
    };
    let Some(sig) = decode_array::<SIGNATURE_SIZE>(signature) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key) else {
        return false;
    };
    key.verify(message.as_bytes(), &Signature::from_bytes(&sig))
        .is_ok()
}

fn decode_array<const N: usize>(s: &str) -> Option<[u8; N]> {
    hex::decode(s).ok()?.try_into().ok()
}
