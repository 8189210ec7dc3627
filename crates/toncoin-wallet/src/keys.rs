//! Key derivation and signing.
//!
//! Keys are derived with SLIP-0010 for ed25519, where every path segment is
//! hardened. Secret material is zeroized on drop and never persisted.

use crate::{WalletError, WalletResult};
use ed25519_dalek::{Signer, SigningKey};
use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroizing;

type HmacSha512 = Hmac<Sha512>;

/// Default derivation path.
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/607'/0'";

/// HMAC key for the SLIP-0010 ed25519 master node.
const MASTER_HMAC_KEY: &[u8] = b"ed25519 seed";

/// Hardened index offset.
const HARDENED: u32 = 0x8000_0000;

/// Accepted seed lengths in bytes.
const SEED_LEN_RANGE: std::ops::RangeInclusive<usize> = 16..=64;

/// A derived ed25519 keypair.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Build from a 32-byte secret.
    pub fn from_secret(secret: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Raw public key.
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Hex export of `secret || public`.
    pub fn private_key_hex(&self) -> Zeroizing<String> {
        let mut bytes = Zeroizing::new([0u8; 64]);
        bytes[..32].copy_from_slice(&self.signing_key.to_bytes());
        bytes[32..].copy_from_slice(&self.public_key());
        Zeroizing::new(hex::encode(&bytes[..]))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}

/// Source of key material.
pub trait KeyProvider: Send + Sync {
    /// Derive the keypair at `path` from `seed`.
    fn derive(&self, seed: &[u8], path: &str) -> WalletResult<KeyPair>;
}

/// SLIP-0010 ed25519 derivation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Slip10Ed25519;

impl KeyProvider for Slip10Ed25519 {
    fn derive(&self, seed: &[u8], path: &str) -> WalletResult<KeyPair> {
        if !SEED_LEN_RANGE.contains(&seed.len()) {
            return Err(WalletError::InvalidSeed(format!(
                "expected 16 to 64 bytes, got {}",
                seed.len()
            )));
        }
        let indices = parse_derivation_path(path)?;

        let (mut key, mut chain_code) = hmac_split(MASTER_HMAC_KEY, &[seed])?;
        for index in indices {
            let mut data = Zeroizing::new(Vec::with_capacity(37));
            data.push(0);
            data.extend_from_slice(&key[..]);
            data.extend_from_slice(&(index | HARDENED).to_be_bytes());
            (key, chain_code) = hmac_split(&chain_code[..], &[&data[..]])?;
        }

        Ok(KeyPair::from_secret(&key))
    }
}

type Half = Zeroizing<[u8; 32]>;

fn hmac_split(key: &[u8], parts: &[&[u8]]) -> WalletResult<(Half, Half)> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| WalletError::Internal(format!("hmac key: {}", e)))?;
    for part in parts {
        mac.update(part);
    }
    let out = mac.finalize().into_bytes();
    let mut left = Zeroizing::new([0u8; 32]);
    let mut right = Zeroizing::new([0u8; 32]);
    left.copy_from_slice(&out[..32]);
    right.copy_from_slice(&out[32..]);
    Ok((left, right))
}

/// Parse `m(/N')*` into segment indices.
pub fn parse_derivation_path(path: &str) -> WalletResult<Vec<u32>> {
    let invalid = || WalletError::InvalidDerivationPath(path.to_string());
    let mut segments = path.split('/');
    if segments.next() != Some("m") {
        return Err(invalid());
    }
    segments
        .map(|segment| {
            let digits = segment.strip_suffix('\'').ok_or_else(invalid)?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let index: u32 = digits.parse().map_err(|_| invalid())?;
            if index >= HARDENED {
                return Err(invalid());
            }
            Ok(index)
        })
        .collect()
}

/// True when `path` is a fully hardened derivation path.
pub fn validate_derivation_path(path: &str) -> bool {
    parse_derivation_path(path).is_ok()
}
