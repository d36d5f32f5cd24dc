//! Standard security handler algorithms for revisions 2 to 4.
//!
//! Numbering follows the algorithm numbers of the standard security
//! handler: 2 (file key), 3 (`/O`), 4 and 5 (`/U`), 6 (user password
//! check), 7 (owner password check).

use super::rc4::rc4_crypt;
use md5::{Digest, Md5};

/// Password padding string.
pub const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Inputs shared by the key and password algorithms.
#[derive(Debug, Clone)]
pub struct KeyParams<'a> {
    /// `/O` value
    pub owner_value: &'a [u8],
    /// `/P` value
    pub permissions: i32,
    /// First element of the trailer `/ID`
    pub file_id: &'a [u8],
    /// `/R` value
    pub revision: u32,
    /// File key length in bytes (5 to 16)
    pub key_length: usize,
    /// `/EncryptMetadata` value
    pub encrypt_metadata: bool,
}

/// Pad or truncate a password to 32 bytes.
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = PADDING;
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

/// Algorithm 2: derive the file key from a user password.
pub fn compute_encryption_key(password: &[u8], params: &KeyParams<'_>) -> Vec<u8> {
    let n = params.key_length.clamp(5, 16);

    let mut hasher = Md5::new();
    hasher.update(pad_password(password));
    hasher.update(params.owner_value);
    hasher.update(params.permissions.to_le_bytes());
    hasher.update(params.file_id);
    if params.revision >= 4 && !params.encrypt_metadata {
        hasher.update([0xFF; 4]);
    }
    let mut hash = hasher.finalize().to_vec();

    if params.revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..n]).to_vec();
        }
    }
    hash.truncate(n);
    hash
}

/// RC4 key derived from the owner password (Algorithm 3, steps a to d).
fn owner_rc4_key(owner_password: &[u8], revision: u32, key_length: usize) -> Vec<u8> {
    let n = key_length.clamp(5, 16);
    let mut hash = Md5::digest(pad_password(owner_password)).to_vec();
    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash).to_vec();
        }
    }
    hash.truncate(if revision >= 3 { n } else { 5 });
    hash
}

fn xor_key(key: &[u8], round: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ round).collect()
}

/// Algorithm 3: compute the `/O` value.
///
/// An empty owner password falls back to the user password.
pub fn compute_owner_value(
    owner_password: &[u8],
    user_password: &[u8],
    revision: u32,
    key_length: usize,
) -> Vec<u8> {
    let owner = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };
    let key = owner_rc4_key(owner, revision, key_length);

    let mut value = rc4_crypt(&key, &pad_password(user_password));
    if revision >= 3 {
        for round in 1..=19u8 {
            value = rc4_crypt(&xor_key(&key, round), &value);
        }
    }
    value
}

/// Algorithms 4 and 5: compute the `/U` value from the file key.
pub fn compute_user_value(file_key: &[u8], file_id: &[u8], revision: u32) -> Vec<u8> {
    if revision < 3 {
        return rc4_crypt(file_key, &PADDING);
    }

    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(file_id);
    let mut value = hasher.finalize().to_vec();
    for round in 0..=19u8 {
        value = rc4_crypt(&xor_key(file_key, round), &value);
    }
    // The last 16 bytes are arbitrary.
    value.extend_from_slice(&[0u8; 16]);
    value
}

/// Algorithm 6: check a user password against `/U`.
///
/// Returns the file key on success.
pub fn authenticate_user_password(
    password: &[u8],
    user_value: &[u8],
    params: &KeyParams<'_>,
) -> Option<Vec<u8>> {
    let key = compute_encryption_key(password, params);
    let expected = compute_user_value(&key, params.file_id, params.revision);
    // Revision 3+ only defines the first 16 bytes.
    let compared = if params.revision >= 3 { 16 } else { 32 };
    if user_value.len() < compared {
        return None;
    }
    constant_time_compare(&user_value[..compared], &expected[..compared]).then_some(key)
}

/// Algorithm 7: check an owner password against `/O`.
///
/// Recovers the padded user password from `/O` and authenticates it.
/// Returns the file key on success.
pub fn authenticate_owner_password(
    password: &[u8],
    user_value: &[u8],
    params: &KeyParams<'_>,
) -> Option<Vec<u8>> {
    let key = owner_rc4_key(password, params.revision, params.key_length);

    let user_password = if params.revision >= 3 {
        let mut value = params.owner_value.to_vec();
        for round in (0..=19u8).rev() {
            value = rc4_crypt(&xor_key(&key, round), &value);
        }
        value
    } else {
        rc4_crypt(&key, params.owner_value)
    };

    authenticate_user_password(&user_password, user_value, params)
}

/// Per-object key: MD5(file key, low 3 bytes of the id, low 2 bytes of
/// the generation, plus `sAlT` for AES), truncated to n + 5 bytes (max 16).
pub fn object_key(file_key: &[u8], id: u32, gen: u16, aes: bool) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(file_key);
    hasher.update(&id.to_le_bytes()[..3]);
    hasher.update(gen.to_le_bytes());
    if aes {
        hasher.update(b"sAlT");
    }
    let hash = hasher.finalize();
    hash[..(file_key.len() + 5).min(16)].to_vec()
}

/// Random bytes from UUID v4 values mixed through MD5 with a timestamp.
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let mut hasher = Md5::new();
        hasher.update(uuid::Uuid::new_v4().as_bytes());
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        hasher.update(now.as_nanos().to_le_bytes());
        let hash = hasher.finalize();
        let take = (len - out.len()).min(hash.len());
        out.extend_from_slice(&hash[..take]);
    }
    out
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
