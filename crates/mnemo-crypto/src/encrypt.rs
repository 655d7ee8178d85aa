use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use anyhow::{Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

const NONCE_SIZE: usize = 12;

/// Encrypt a token for storage with AES-256-GCM.
/// Returns base64(nonce || ciphertext).
pub fn encrypt_token(key: &[u8; 32], token: &str) -> Result<String> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, token.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    let mut stored = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    stored.extend_from_slice(&nonce_bytes);
    stored.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(stored))
}

/// Reverse of [`encrypt_token`].
pub fn decrypt_token(key: &[u8; 32], stored: &str) -> Result<String> {
    let bytes = BASE64.decode(stored)?;
    if bytes.len() <= NONCE_SIZE {
        return Err(anyhow!("Stored token too short"));
    }
    let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_SIZE);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| anyhow!("Decryption failed: {}", e))?;

    Ok(String::from_utf8(plaintext)?)
}
