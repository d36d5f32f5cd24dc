//! Per-object encryption and decryption with an authenticated file key.

use super::aes::{aes128_decrypt_prefixed, aes128_encrypt};
use super::algorithms::{self, KeyParams};
use super::rc4::rc4_crypt;
use super::{Algorithm, EncryptDict};
use crate::error::{Error, Result};
use crate::object::Object;

/// A file key plus the cipher it drives.
#[derive(Debug, Clone)]
pub struct SecurityHandler {
    algorithm: Algorithm,
    file_key: Vec<u8>,
}

impl SecurityHandler {
    /// Build a handler from an already derived file key.
    pub fn from_key(algorithm: Algorithm, file_key: Vec<u8>) -> Self {
        Self {
            algorithm,
            file_key,
        }
    }

    /// Authenticate `password` as the user password, then as the owner
    /// password.
    ///
    /// Fails with [`Error::Auth`] when neither matches.
    pub fn authenticate(dict: &EncryptDict, file_id: &[u8], password: &[u8]) -> Result<Self> {
        let algorithm = dict.algorithm()?;
        let params = KeyParams {
            owner_value: &dict.owner_value,
            permissions: dict.permissions,
            file_id,
            revision: dict.revision,
            key_length: dict.key_length_bytes(),
            encrypt_metadata: dict.encrypt_metadata,
        };

        if let Some(key) = algorithms::authenticate_user_password(password, &dict.user_value, &params) {
            log::debug!("authenticated with the user password");
            return Ok(Self::from_key(algorithm, key));
        }
        if let Some(key) = algorithms::authenticate_owner_password(password, &dict.user_value, &params) {
            log::debug!("authenticated with the owner password");
            return Ok(Self::from_key(algorithm, key));
        }

        Err(Error::Auth("password matches neither the user nor the owner password".to_string()))
    }

    /// Cipher in use.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The file key.
    pub fn file_key(&self) -> &[u8] {
        &self.file_key
    }

    fn object_key(&self, id: u32, gen: u16) -> Vec<u8> {
        algorithms::object_key(&self.file_key, id, gen, self.algorithm.is_aes())
    }

    /// Encrypt a string or stream payload belonging to object `id gen`.
    ///
    /// AES output starts with a fresh random IV.
    pub fn encrypt_bytes(&self, data: &[u8], id: u32, gen: u16) -> Result<Vec<u8>> {
        let key = self.object_key(id, gen);
        if !self.algorithm.is_aes() {
            return Ok(rc4_crypt(&key, data));
        }

        let mut iv = [0u8; 16];
        iv.copy_from_slice(&algorithms::random_bytes(16));
        let body = aes128_encrypt(&key, &iv, data).map_err(|e| Error::Encryption(e.to_string()))?;
        let mut out = iv.to_vec();
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decrypt a string or stream payload belonging to object `id gen`.
    pub fn decrypt_bytes(&self, data: &[u8], id: u32, gen: u16) -> Result<Vec<u8>> {
        let key = self.object_key(id, gen);
        if self.algorithm.is_aes() {
            aes128_decrypt_prefixed(&key, data)
                .map_err(|e| Error::Encryption(format!("object {} {}: {}", id, gen, e)))
        } else {
            Ok(rc4_crypt(&key, data))
        }
    }

    /// Encrypt every string and the stream payload inside `obj`.
    pub fn encrypt_object(&self, obj: &Object, id: u32, gen: u16) -> Result<Object> {
        Ok(match obj {
            Object::String(s) => Object::String(self.encrypt_bytes(s, id, gen)?),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|o| self.encrypt_object(o, id, gen))
                    .collect::<Result<_>>()?,
            ),
            Object::Dictionary(dict) => Object::Dictionary(
                dict.iter()
                    .map(|(k, v)| Ok((k.clone(), self.encrypt_object(v, id, gen)?)))
                    .collect::<Result<_>>()?,
            ),
            Object::Stream { dict, data } => {
                let dict = dict
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), self.encrypt_object(v, id, gen)?)))
                    .collect::<Result<_>>()?;
                Object::stream(dict, self.encrypt_bytes(data, id, gen)?)
            },
            other => other.clone(),
        })
    }

    /// Decrypt every string and the stream payload inside `obj` in place.
    ///
    /// A value that fails to decrypt is left as stored and logged.
    pub fn decrypt_object(&self, obj: &mut Object, id: u32, gen: u16) {
        match obj {
            Object::String(s) => match self.decrypt_bytes(s, id, gen) {
                Ok(plain) => *s = plain,
                Err(e) => log::warn!("leaving string undecrypted: {}", e),
            },
            Object::Array(items) => items.iter_mut().for_each(|o| self.decrypt_object(o, id, gen)),
            Object::Dictionary(dict) => dict.values_mut().for_each(|o| self.decrypt_object(o, id, gen)),
            Object::Stream { dict, data } => {
                dict.values_mut().for_each(|o| self.decrypt_object(o, id, gen));
                match self.decrypt_bytes(data, id, gen) {
                    Ok(plain) => *data = plain.into(),
                    Err(e) => log::warn!("leaving stream undecrypted: {}", e),
                }
            },
            _ => {},
        }
    }
}
