/// Mnemo Crypto Library
///
/// Issued CLI tokens are stored encrypted (AES-256-GCM) rather than hashed so
/// verification can compare the presented token against the decrypted copy.

pub mod encrypt;
pub mod keys;

pub use encrypt::{decrypt_token, encrypt_token};
