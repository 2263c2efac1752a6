//! Credential handling
//!
//! Provides:
//! - Salted Argon2id credential digests in `hex(salt):hex(key)` form
//! - Constant-time verification against a stored digest

pub mod password;

pub use password::{
    hash_password, hash_password_async, verify_password, verify_password_async, CredentialDigest,
};
