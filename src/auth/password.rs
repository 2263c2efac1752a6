//! Password hashing and verification using Argon2
//!
//! Digests are stored and sent to the backend as `hex(salt):hex(key)`. The
//! salt is fresh per digest; the key length and cost parameters below are
//! shared by the hash and verify paths and must never change independently.

use std::fmt;
use std::str::FromStr;

use argon2::{Algorithm, Argon2, Params, Version};
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

use crate::types::{Error, Result};

/// Argon2id memory cost in KiB (19 MiB)
pub const KDF_MEMORY_KIB: u32 = 19_456;

/// Argon2id iteration count
pub const KDF_ITERATIONS: u32 = 2;

/// Argon2id parallelism
pub const KDF_PARALLELISM: u32 = 1;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Derived key length in bytes
pub const KEY_LEN: usize = 32;

/// Shortest salt Argon2 accepts
const MIN_SALT_LEN: usize = 8;

/// Parsed credential digest
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialDigest {
    salt: Vec<u8>,
    key: [u8; KEY_LEN],
}

impl CredentialDigest {
    /// Derive a digest for `secret` under a freshly generated salt.
    pub fn derive(secret: &str) -> Result<Self> {
        let mut salt = vec![0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let key = derive_key(secret.as_bytes(), &salt)?;
        Ok(Self { salt, key })
    }

    /// Check `secret` against this digest in constant time.
    pub fn matches(&self, secret: &str) -> Result<bool> {
        let candidate = derive_key(secret.as_bytes(), &self.salt)?;
        Ok(candidate.as_slice().ct_eq(self.key.as_slice()).into())
    }
}

impl fmt::Display for CredentialDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(&self.salt), hex::encode(self.key))
    }
}

// Keep key material out of logs.
impl fmt::Debug for CredentialDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialDigest")
            .field("salt", &hex::encode(&self.salt))
            .finish_non_exhaustive()
    }
}

impl FromStr for CredentialDigest {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (salt_hex, key_hex) = s
            .split_once(':')
            .ok_or_else(|| Error::MalformedDigest("missing ':' separator".into()))?;

        let salt = hex::decode(salt_hex)
            .map_err(|e| Error::MalformedDigest(format!("invalid salt hex: {e}")))?;
        if salt.len() < MIN_SALT_LEN {
            return Err(Error::MalformedDigest(format!(
                "salt too short ({} bytes)",
                salt.len()
            )));
        }

        let key_bytes = hex::decode(key_hex)
            .map_err(|e| Error::MalformedDigest(format!("invalid key hex: {e}")))?;
        let key: [u8; KEY_LEN] = key_bytes.as_slice().try_into().map_err(|_| {
            Error::MalformedDigest(format!(
                "expected {KEY_LEN}-byte key, got {} bytes",
                key_bytes.len()
            ))
        })?;

        Ok(Self { salt, key })
    }
}

/// Hash a password into its textual digest
pub fn hash_password(password: &str) -> Result<String> {
    CredentialDigest::derive(password).map(|digest| digest.to_string())
}

/// Verify a password against a stored digest
///
/// A digest that cannot be parsed is an error, not a mismatch.
pub fn verify_password(password: &str, digest: &str) -> Result<bool> {
    digest.parse::<CredentialDigest>()?.matches(password)
}

/// [`hash_password`] on the blocking pool, off the async executor
pub async fn hash_password_async(password: String) -> Result<String> {
    run_blocking(move || hash_password(&password)).await
}

/// [`verify_password`] on the blocking pool, off the async executor
pub async fn verify_password_async(password: String, digest: String) -> Result<bool> {
    run_blocking(move || verify_password(&password, &digest)).await
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Crypto(format!("Key derivation task failed: {e}")))?
}

fn derive_key(secret: &[u8], salt: &[u8]) -> Result<[u8; KEY_LEN]> {
    let params = Params::new(KDF_MEMORY_KIB, KDF_ITERATIONS, KDF_PARALLELISM, Some(KEY_LEN))
        .map_err(|e| Error::Crypto(format!("Invalid Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(secret, salt, &mut key)
        .map_err(|e| Error::Crypto(format!("Key derivation failed: {e}")))?;

    Ok(key)
}
