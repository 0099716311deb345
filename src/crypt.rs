//! Encryption of setting values at rest
//!
//! Values are sealed with AES-256-CBC and authenticated with HMAC-SHA256 over
//! the base64 IV and ciphertext. The sealed form is
//! `base64({"iv": .., "value": .., "mac": .., "tag": ""})`, so secrets written
//! by the admin panel and by this service are interchangeable.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::types::GrcError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

#[derive(Serialize, Deserialize)]
struct Payload {
    iv: String,
    value: String,
    mac: String,
    #[serde(default)]
    tag: String,
}

/// Symmetric encrypter keyed by the application key
#[derive(Clone)]
pub struct Encrypter {
    key: [u8; KEY_LEN],
}

impl std::fmt::Debug for Encrypter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Encrypter([REDACTED])")
    }
}

impl Encrypter {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Build from an `APP_KEY` value: `base64:<32 bytes>` or a raw 32-byte string
    pub fn from_app_key(app_key: &str) -> Result<Self, GrcError> {
        let bytes = match app_key.strip_prefix("base64:") {
            Some(encoded) => STANDARD
                .decode(encoded.trim())
                .map_err(|e| GrcError::Crypto(format!("APP_KEY is not valid base64: {}", e)))?,
            None => app_key.as_bytes().to_vec(),
        };

        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            GrcError::Crypto(format!(
                "APP_KEY must be {} bytes for AES-256-CBC, got {}",
                KEY_LEN,
                b.len()
            ))
        })?;

        Ok(Self::new(key))
    }

    /// Fresh random key in `APP_KEY` form
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        format!("base64:{}", STANDARD.encode(key))
    }

    pub fn encrypt_string(&self, plaintext: &str) -> Result<String, GrcError> {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new_from_slices(&self.key, &iv)
            .map_err(|e| GrcError::Crypto(e.to_string()))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let iv = STANDARD.encode(iv);
        let value = STANDARD.encode(ciphertext);
        let mac = hex::encode(self.mac(&iv, &value)?.finalize().into_bytes());

        let payload = Payload {
            iv,
            value,
            mac,
            tag: String::new(),
        };
        let json = serde_json::to_vec(&payload)
            .map_err(|e| GrcError::Crypto(format!("Failed to encode payload: {}", e)))?;

        Ok(STANDARD.encode(json))
    }

    pub fn decrypt_string(&self, sealed: &str) -> Result<String, GrcError> {
        let json = STANDARD
            .decode(sealed.trim())
            .map_err(|_| GrcError::Crypto("The payload is invalid.".to_string()))?;
        let payload: Payload = serde_json::from_slice(&json)
            .map_err(|_| GrcError::Crypto("The payload is invalid.".to_string()))?;

        let expected = hex::decode(&payload.mac)
            .map_err(|_| GrcError::Crypto("The MAC is invalid.".to_string()))?;
        self.mac(&payload.iv, &payload.value)?
            .verify_slice(&expected)
            .map_err(|_| GrcError::Crypto("The MAC is invalid.".to_string()))?;

        let iv = STANDARD
            .decode(&payload.iv)
            .map_err(|_| GrcError::Crypto("The payload is invalid.".to_string()))?;
        if iv.len() != IV_LEN {
            return Err(GrcError::Crypto("The payload is invalid.".to_string()));
        }
        let ciphertext = STANDARD
            .decode(&payload.value)
            .map_err(|_| GrcError::Crypto("The payload is invalid.".to_string()))?;

        let plaintext = Aes256CbcDec::new_from_slices(&self.key, &iv)
            .map_err(|e| GrcError::Crypto(e.to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| GrcError::Crypto("Could not decrypt the data.".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| GrcError::Crypto("Decrypted value is not UTF-8.".to_string()))
    }

    fn mac(&self, iv: &str, value: &str) -> Result<HmacSha256, GrcError> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.key)
            .map_err(|e| GrcError::Crypto(e.to_string()))?;
        mac.update(iv.as_bytes());
        mac.update(value.as_bytes());
        Ok(mac)
    }
}
