//! WireGuard key handling
//!
//! Peers are identified on the wire by their Curve25519 public key, encoded as
//! standard base64 (44 characters).

use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};

/// WireGuard key pair
#[derive(Clone)]
pub struct WgKeyPair {
    secret: StaticSecret,
}

impl WgKeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self {
            secret: StaticSecret::random_from_rng(OsRng),
        }
    }

    /// Private key, base64
    pub fn private_key_base64(&self) -> String {
        STANDARD.encode(self.secret.to_bytes())
    }

    /// Public key, base64
    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(PublicKey::from(&self.secret).as_bytes())
    }
}

impl std::fmt::Debug for WgKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgKeyPair")
            .field("public_key", &self.public_key_base64())
            .finish()
    }
}

fn decode_key(key: &str) -> Result<[u8; 32]> {
    let bytes = STANDARD
        .decode(key.trim())
        .map_err(|e| Error::invalid_argument(format!("invalid WireGuard key: {}", e)))?;
    bytes
        .try_into()
        .map_err(|_| Error::invalid_argument("invalid WireGuard key: expected 32 bytes"))
}

/// Check that `key` is a base64 encoded 32 byte public key
pub fn validate_public_key(key: &str) -> Result<()> {
    decode_key(key).map(|_| ())
}
