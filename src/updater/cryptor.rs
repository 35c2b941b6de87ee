//! AES-CBC + MessagePack codec for the asset bundle manifest.

use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::errors::CryptorError;

const BLOCK_SIZE: usize = 16;

/// Decrypts and encrypts manifest payloads with a fixed key and IV.
#[derive(Clone)]
pub struct Cryptor {
    key: Vec<u8>,
    iv: Vec<u8>,
}

impl std::fmt::Debug for Cryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cryptor")
            .field("key_bits", &(self.key.len() * 8))
            .finish_non_exhaustive()
    }
}

impl Cryptor {
    /// Key must be 16, 24 or 32 bytes, which selects AES-128/192/256. IV must be 16 bytes.
    pub fn new(key: Vec<u8>, iv: Vec<u8>) -> Result<Self, CryptorError> {
        if !matches!(key.len(), 16 | 24 | 32) || iv.len() != BLOCK_SIZE {
            return Err(CryptorError::InvalidKey {
                key_len: key.len(),
                iv_len: iv.len(),
            });
        }
        Ok(Self { key, iv })
    }

    pub fn from_hex(key_hex: &str, iv_hex: &str) -> Result<Self, CryptorError> {
        Self::new(hex::decode(key_hex.trim())?, hex::decode(iv_hex.trim())?)
    }

    /// Decrypt `ciphertext` and deserialize the MessagePack payload it carries.
    pub fn unpack<T: DeserializeOwned>(&self, ciphertext: &[u8]) -> Result<T, CryptorError> {
        let plaintext = self.decrypt(ciphertext)?;
        Ok(rmp_serde::from_slice(&plaintext)?)
    }

    /// Serialize `value` as MessagePack with named fields and encrypt it.
    pub fn pack<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CryptorError> {
        let plaintext = rmp_serde::to_vec_named(value)?;
        self.encrypt(&plaintext)
    }

    /// Decrypt and strip the trailing pad. The pad length is the value of the last byte.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptorError> {
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CryptorError::Decrypt(format!(
                "ciphertext length {} is not a positive multiple of {}",
                ciphertext.len(),
                BLOCK_SIZE
            )));
        }

        let mut plaintext = match self.key.len() {
            16 => decrypt_raw::<cbc::Decryptor<aes::Aes128>>(&self.key, &self.iv, ciphertext)?,
            24 => decrypt_raw::<cbc::Decryptor<aes::Aes192>>(&self.key, &self.iv, ciphertext)?,
            _ => decrypt_raw::<cbc::Decryptor<aes::Aes256>>(&self.key, &self.iv, ciphertext)?,
        };

        let pad = plaintext.last().copied().unwrap_or(0) as usize;
        if pad == 0 || pad > BLOCK_SIZE {
            return Err(CryptorError::Decrypt(format!("invalid pad length {}", pad)));
        }
        plaintext.truncate(plaintext.len() - pad);
        Ok(plaintext)
    }

    /// PKCS#7 pad and encrypt. Aligned input gains a full pad block.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptorError> {
        match self.key.len() {
            16 => encrypt_raw::<cbc::Encryptor<aes::Aes128>>(&self.key, &self.iv, plaintext),
            24 => encrypt_raw::<cbc::Encryptor<aes::Aes192>>(&self.key, &self.iv, plaintext),
            _ => encrypt_raw::<cbc::Encryptor<aes::Aes256>>(&self.key, &self.iv, plaintext),
        }
    }
}

fn decrypt_raw<D>(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptorError>
where
    D: KeyIvInit + BlockDecryptMut,
{
    let decryptor = D::new_from_slices(key, iv).map_err(|_| CryptorError::InvalidKey {
        key_len: key.len(),
        iv_len: iv.len(),
    })?;
    decryptor
        .decrypt_padded_vec_mut::<NoPadding>(data)
        .map_err(|e| CryptorError::Decrypt(e.to_string()))
}

fn encrypt_raw<E>(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CryptorError>
where
    E: KeyIvInit + BlockEncryptMut,
{
    let encryptor = E::new_from_slices(key, iv).map_err(|_| CryptorError::InvalidKey {
        key_len: key.len(),
        iv_len: iv.len(),
    })?;
    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(data))
}
