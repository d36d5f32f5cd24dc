//! AES-128 in CBC mode with PKCS#7 padding (security handler revision 4).
//!
//! Encrypted strings and streams carry their 16-byte IV as a prefix.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes128;
use cbc::{Decryptor, Encryptor};

type Aes128CbcEnc = Encryptor<Aes128>;
type Aes128CbcDec = Decryptor<Aes128>;

const BLOCK: usize = 16;

/// Encrypt `data`, padding to the block size.
pub fn aes128_encrypt(key: &[u8], iv: &[u8; 16], data: &[u8]) -> Result<Vec<u8>, &'static str> {
    if key.len() != 16 {
        return Err("AES-128 key must be 16 bytes");
    }

    let pad = BLOCK - data.len() % BLOCK;
    let mut buffer = data.to_vec();
    buffer.extend(std::iter::repeat(pad as u8).take(pad));

    let len = buffer.len();
    Aes128CbcEnc::new(key.into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
        .map_err(|_| "AES encryption failed")?;
    Ok(buffer)
}

/// Decrypt `data` and strip the padding.
pub fn aes128_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, &'static str> {
    if key.len() != 16 {
        return Err("AES-128 key must be 16 bytes");
    }
    if iv.len() != BLOCK {
        return Err("IV must be 16 bytes");
    }
    if data.is_empty() {
        return Ok(Vec::new());
    }
    if data.len() % BLOCK != 0 {
        return Err("ciphertext length is not a multiple of 16");
    }

    let mut buffer = data.to_vec();
    let plain = Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| "AES decryption failed")?;

    let pad = *plain.last().ok_or("empty plaintext")? as usize;
    if pad == 0 || pad > BLOCK || plain[plain.len() - pad..].iter().any(|&b| b as usize != pad) {
        return Err("invalid PKCS#7 padding");
    }
    Ok(plain[..plain.len() - pad].to_vec())
}

/// Split an `IV || ciphertext` payload and decrypt it.
pub fn aes128_decrypt_prefixed(key: &[u8], data: &[u8]) -> Result<Vec<u8>, &'static str> {
    if data.len() < BLOCK {
        return Err("payload shorter than the IV");
    }
    let (iv, body) = data.split_at(BLOCK);
    aes128_decrypt(key, iv, body)
}
