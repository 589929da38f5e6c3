//! Detached Ed25519 signatures over arbitrary messages.
//!
//! Keys and signatures travel as hex. Secret keys are emitted in the 64-byte
//! keypair layout (seed followed by public key) and accepted either in that
//! layout or as a bare 32-byte seed.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SigningError {
    #[error("secret key is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("secret key must be 32 or 64 bytes, got {0}")]
    KeyLength(usize),

    #[error("secret key does not match its embedded public key")]
    InconsistentKeypair,
}

/// Hex-encoded keypair
#[derive(Clone, PartialEq, Eq)]
pub struct Keypair {
    pub public: String,
    pub secret: String,
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Keypair {
    pub fn generate() -> Self {
        let mut csprng = rand::thread_rng();
        Self::from_signing_key(&SigningKey::generate(&mut csprng))
    }

    fn from_signing_key(key: &SigningKey) -> Self {
        Self {
            public: hex::encode(key.verifying_key().as_bytes()),
            secret: hex::encode(key.to_keypair_bytes()),
        }
    }
}

fn signing_key(secret: &str) -> Result<SigningKey, SigningError> {
    let bytes = hex::decode(secret.trim())?;

    if let Ok(seed) = <[u8; 32]>::try_from(bytes.as_slice()) {
        return Ok(SigningKey::from_bytes(&seed));
    }

    let keypair =
        <[u8; 64]>::try_from(bytes.as_slice()).map_err(|_| SigningError::KeyLength(bytes.len()))?;

    SigningKey::from_keypair_bytes(&keypair).map_err(|_| SigningError::InconsistentKeypair)
}

/// Sign `message` with a hex secret key, returning the hex signature
pub fn sign(message: &[u8], secret: &str) -> Result<String, SigningError> {
    let key = signing_key(secret)?;

    Ok(hex::encode(key.sign(message).to_bytes()))
}

/// Check a hex signature against `message` and a hex public key.
///
/// Malformed hex, keys or signatures simply fail verification.
pub fn verify(signature: &str, message: &[u8], public: &str) -> bool {
    let Ok(signature) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(&signature) else {
        return false;
    };
    let Some(public) = hex::decode(public.trim())
        .ok()
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
    else {
        return false;
    };
    let Ok(public) = VerifyingKey::from_bytes(&public) else {
        return false;
    };

    public.verify(message, &signature).is_ok()
}
