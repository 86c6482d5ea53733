//! Chiffrement des mots de passe caméra stockés dans la configuration
//!
//! Les mots de passe sont chiffrés en AES-256-GCM avec une clé dérivée de
//! l'identifiant de la machine : un fichier de configuration copié sur un
//! autre hôte ne se déchiffre pas.
//!
//! Format stocké : `encrypted:` + base64(nonce (12 octets) ‖ ciphertext).

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use anyhow::{Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use sha2::{Digest, Sha256};

/// Préfixe des valeurs chiffrées
pub const ENCRYPTED_PREFIX: &str = "encrypted:";

const NONCE_LEN: usize = 12;
const KEY_SALT: &[u8] = b"camscan-password-v1";

/// Lit l'identifiant stable de la machine.
fn machine_id() -> Result<String> {
    #[cfg(target_os = "linux")]
    {
        for path in ["/etc/machine-id", "/var/lib/dbus/machine-id"] {
            if let Ok(id) = std::fs::read_to_string(path) {
                let id = id.trim();
                if !id.is_empty() {
                    return Ok(id.to_string());
                }
            }
        }
        Err(anyhow!("Failed to read machine-id"))
    }

    #[cfg(target_os = "macos")]
    {
        let output = std::process::Command::new("ioreg")
            .args(["-d2", "-c", "IOPlatformExpertDevice"])
            .output()?;
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .find(|l| l.contains("IOPlatformUUID"))
            .and_then(|l| l.split('"').nth(3))
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Failed to extract IOPlatformUUID from ioreg"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        Err(anyhow!("Unsupported platform for machine id extraction"))
    }
}

/// Derives an AES-256 key from arbitrary secret material.
pub fn derive_key(material: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(material);
    hasher.update(KEY_SALT);

    let mut key = [0u8; 32];
    key.copy_from_slice(&hasher.finalize());
    key
}

/// Key bound to this machine
pub fn machine_key() -> Result<[u8; 32]> {
    Ok(derive_key(machine_id()?.as_bytes()))
}

/// Encrypts with an explicit key, using a fresh random nonce.
pub fn encrypt_with_key(password: &str, key: &[u8; 32]) -> Result<String> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("Failed to create cipher: {}", e))?;

    let nonce_bytes: [u8; NONCE_LEN] = rand::random();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), password.as_bytes())
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(format!("{}{}", ENCRYPTED_PREFIX, BASE64.encode(&combined)))
}

/// Decrypts an `encrypted:` value with an explicit key.
pub fn decrypt_with_key(encrypted: &str, key: &[u8; 32]) -> Result<String> {
    let data = encrypted
        .strip_prefix(ENCRYPTED_PREFIX)
        .ok_or_else(|| anyhow!("Invalid encrypted password format (missing prefix)"))?;

    let combined = BASE64
        .decode(data.trim())
        .map_err(|e| anyhow!("Invalid base64: {}", e))?;
    if combined.len() <= NONCE_LEN {
        return Err(anyhow!("Invalid ciphertext (too short)"));
    }
    let (nonce, ciphertext) = combined.split_at(NONCE_LEN);

    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("Failed to create cipher: {}", e))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| anyhow!("Decryption failed (wrong machine or corrupted data)"))?;

    String::from_utf8(plaintext).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
}

/// Chiffre un mot de passe avec la clé de la machine.
pub fn encrypt_password(password: &str) -> Result<String> {
    encrypt_with_key(password, &machine_key()?)
}

/// Déchiffre un mot de passe avec la clé de la machine.
pub fn decrypt_password(encrypted: &str) -> Result<String> {
    decrypt_with_key(encrypted, &machine_key()?)
}

pub fn is_encrypted(value: &str) -> bool {
    value.starts_with(ENCRYPTED_PREFIX)
}

/// Returns the clear password, decrypting `encrypted:` values.
pub fn reveal_password(value: &str) -> Result<String> {
    if is_encrypted(value) {
        decrypt_password(value)
    } else {
        Ok(value.to_string())
    }
}
