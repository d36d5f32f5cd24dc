//! Standard security handler.
//!
//! Supports revisions 2 to 4 of the password-based handler:
//!
//! - RC4 with a 40-bit key (V=1, R=2)
//! - RC4 with a 128-bit key (V=2, R=3)
//! - AES-128 in CBC mode through the `/StdCF` crypt filter (V=4, R=4)
//!
//! Every string and stream payload is encrypted with a key derived from the
//! file key and the owning object's id and generation. The encryption
//! dictionary itself and the trailer `/ID` are stored in the clear.

use crate::audit;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{dict, Dictionary, Object};
use crate::writer::{self, EncryptionContext, WriterConfig};
use bitflags::bitflags;
use rayon::prelude::*;
use std::path::Path;

mod aes;
mod algorithms;
mod handler;
mod rc4;

pub use algorithms::random_bytes;
pub use handler::SecurityHandler;

/// Cipher selected by the encryption dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Algorithm {
    /// RC4 with a 40-bit key (V=1, R=2)
    Rc4_40,
    /// RC4 with a 128-bit key (V=2, R=3)
    Rc4_128,
    /// AES-128 CBC (V=4, R=4)
    #[default]
    Aes128,
}

impl Algorithm {
    /// File key length in bytes.
    pub fn key_length(&self) -> usize {
        match self {
            Algorithm::Rc4_40 => 5,
            Algorithm::Rc4_128 | Algorithm::Aes128 => 16,
        }
    }

    /// Check if this is an AES algorithm.
    pub fn is_aes(&self) -> bool {
        matches!(self, Algorithm::Aes128)
    }

    /// `(V, R)` pair written to the encryption dictionary.
    pub fn version_revision(&self) -> (u32, u32) {
        match self {
            Algorithm::Rc4_40 => (1, 2),
            Algorithm::Rc4_128 => (2, 3),
            Algorithm::Aes128 => (4, 4),
        }
    }
}

bitflags! {
    /// User access permissions (`/P`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u32 {
        /// Bit 3: print
        const PRINT = 1 << 2;
        /// Bit 4: modify contents
        const MODIFY = 1 << 3;
        /// Bit 5: copy or extract text and graphics
        const COPY = 1 << 4;
        /// Bit 6: add or modify annotations
        const ANNOTATE = 1 << 5;
        /// Bit 9: fill in form fields
        const FILL_FORMS = 1 << 8;
        /// Bit 10: extract for accessibility
        const ACCESSIBILITY = 1 << 9;
        /// Bit 11: insert, rotate or delete pages
        const ASSEMBLE = 1 << 10;
        /// Bit 12: faithful high quality printing
        const PRINT_HIGH_QUALITY = 1 << 11;
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::all()
    }
}

impl Permissions {
    /// Reserved bits 1-2 are 0, bits 7-8 and 13-32 are 1.
    const RESERVED_ONES: u32 = 0xFFFF_F0C0;

    /// The signed `/P` value.
    pub fn to_p_value(self) -> i32 {
        (self.bits() | Self::RESERVED_ONES) as i32
    }

    /// Read a `/P` value, ignoring reserved bits.
    pub fn from_p_value(p: i32) -> Self {
        Permissions::from_bits_truncate(p as u32)
    }
}

/// Parsed `/Encrypt` dictionary of the standard security handler.
#[derive(Debug, Clone)]
pub struct EncryptDict {
    /// Algorithm version (V)
    pub version: u32,
    /// Revision (R)
    pub revision: u32,
    /// Key length in bits (Length)
    pub length: Option<u32>,
    /// `/O` value
    pub owner_value: Vec<u8>,
    /// `/U` value
    pub user_value: Vec<u8>,
    /// `/P` value
    pub permissions: i32,
    /// `/EncryptMetadata`, true when absent
    pub encrypt_metadata: bool,
    /// `/CFM` of the `/StdCF` crypt filter (V=4)
    pub crypt_filter_method: Option<String>,
}

fn required_int(d: &Dictionary, key: &str) -> Result<i64> {
    d.get(key)
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::Encryption(format!("Encrypt dictionary missing /{}", key)))
}

fn required_bytes(d: &Dictionary, key: &str) -> Result<Vec<u8>> {
    d.get(key)
        .and_then(Object::as_string)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| Error::Encryption(format!("Encrypt dictionary missing /{}", key)))
}

impl EncryptDict {
    /// Parse an encryption dictionary.
    pub fn from_object(obj: &Object) -> Result<Self> {
        let d = obj
            .as_dict()
            .ok_or_else(|| Error::Encryption("Encrypt entry is not a dictionary".to_string()))?;

        match d.get("Filter").and_then(Object::as_name) {
            Some("Standard") => {},
            Some(other) => {
                return Err(Error::Encryption(format!("unsupported security handler /{}", other)))
            },
            None => return Err(Error::Encryption("Encrypt dictionary missing /Filter".to_string())),
        }

        let crypt_filter_method = d
            .get("CF")
            .and_then(Object::as_dict)
            .and_then(|cf| cf.get("StdCF"))
            .and_then(Object::as_dict)
            .and_then(|std| std.get("CFM"))
            .and_then(Object::as_name)
            .map(str::to_string);

        Ok(Self {
            version: required_int(d, "V")? as u32,
            revision: required_int(d, "R")? as u32,
            length: d.get("Length").and_then(Object::as_integer).map(|l| l as u32),
            owner_value: required_bytes(d, "O")?,
            user_value: required_bytes(d, "U")?,
            permissions: required_int(d, "P")? as i32,
            encrypt_metadata: d
                .get("EncryptMetadata")
                .and_then(Object::as_bool)
                .unwrap_or(true),
            crypt_filter_method,
        })
    }

    /// Build the dictionary for a freshly encrypted document.
    pub fn new(algorithm: Algorithm, owner_value: Vec<u8>, user_value: Vec<u8>, permissions: Permissions) -> Self {
        let (version, revision) = algorithm.version_revision();
        Self {
            version,
            revision,
            length: Some(algorithm.key_length() as u32 * 8),
            owner_value,
            user_value,
            permissions: permissions.to_p_value(),
            encrypt_metadata: true,
            crypt_filter_method: algorithm.is_aes().then(|| "AESV2".to_string()),
        }
    }

    /// Determine the cipher from V, R and the crypt filter.
    pub fn algorithm(&self) -> Result<Algorithm> {
        if !(2..=4).contains(&self.revision) {
            return Err(Error::Encryption(format!(
                "unsupported security handler revision R={}",
                self.revision
            )));
        }
        match self.version {
            1 => Ok(Algorithm::Rc4_40),
            2 => Ok(Algorithm::Rc4_128),
            4 => match self.crypt_filter_method.as_deref() {
                Some("AESV2") => Ok(Algorithm::Aes128),
                Some("V2") => Ok(Algorithm::Rc4_128),
                other => Err(Error::Encryption(format!(
                    "unsupported crypt filter method {:?}",
                    other
                ))),
            },
            v => Err(Error::Encryption(format!("unsupported encryption version V={}", v))),
        }
    }

    /// Effective file key length in bytes.
    pub fn key_length_bytes(&self) -> usize {
        match self.length {
            Some(bits) => (bits as usize / 8).clamp(5, 16),
            None if self.version == 1 => 5,
            None => 16,
        }
    }

    /// Serialize as an `/Encrypt` dictionary.
    pub fn to_object(&self) -> Object {
        let mut d = dict([
            ("Filter", Object::name("Standard")),
            ("V", Object::Integer(self.version as i64)),
            ("R", Object::Integer(self.revision as i64)),
            ("O", Object::String(self.owner_value.clone())),
            ("U", Object::String(self.user_value.clone())),
            ("P", Object::Integer(self.permissions as i64)),
        ]);
        if let Some(length) = self.length {
            d.insert("Length".to_string(), Object::Integer(length as i64));
        }
        if !self.encrypt_metadata {
            d.insert("EncryptMetadata".to_string(), Object::Boolean(false));
        }
        if let Some(cfm) = &self.crypt_filter_method {
            let std_cf = dict([
                ("Type", Object::name("CryptFilter")),
                ("CFM", Object::name(cfm.as_str())),
                ("AuthEvent", Object::name("DocOpen")),
                ("Length", Object::Integer(self.key_length_bytes() as i64)),
            ]);
            d.insert(
                "CF".to_string(),
                Object::Dictionary(dict([("StdCF", Object::Dictionary(std_cf))])),
            );
            d.insert("StmF".to_string(), Object::name("StdCF"));
            d.insert("StrF".to_string(), Object::name("StdCF"));
        }
        Object::Dictionary(d)
    }

    /// Granted permissions.
    pub fn permissions(&self) -> Permissions {
        Permissions::from_p_value(self.permissions)
    }
}

/// Passwords, cipher and permissions for [`encrypt`].
///
/// # Examples
///
/// ```
/// use pdf_forge::encryption::{Algorithm, EncryptionConfig, Permissions};
///
/// let config = EncryptionConfig::new("reader", "admin")
///     .with_algorithm(Algorithm::Rc4_128)
///     .with_permissions(Permissions::PRINT | Permissions::COPY);
/// assert_eq!(config.algorithm, Algorithm::Rc4_128);
/// ```
#[derive(Debug, Clone)]
pub struct EncryptionConfig {
    /// Password that opens the document
    pub user_password: String,
    /// Password that grants full access; empty means the user password
    pub owner_password: String,
    /// Cipher (default AES-128)
    pub algorithm: Algorithm,
    /// Permissions granted to user-password holders
    pub permissions: Permissions,
}

impl EncryptionConfig {
    /// Create a config with the default cipher and all permissions.
    pub fn new(user_password: impl Into<String>, owner_password: impl Into<String>) -> Self {
        Self {
            user_password: user_password.into(),
            owner_password: owner_password.into(),
            algorithm: Algorithm::default(),
            permissions: Permissions::default(),
        }
    }

    /// Select the cipher.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Restrict user permissions.
    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }
}

/// A document paired with the key material to write it encrypted.
///
/// Nothing is encrypted in memory; strings and streams are encrypted as
/// they are serialized.
#[derive(Debug, Clone)]
pub struct EncryptedDocument {
    document: Document,
    context: EncryptionContext,
}

impl EncryptedDocument {
    /// The plaintext document that will be written.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// The encryption dictionary that will be written.
    pub fn encrypt_dict(&self) -> EncryptDict {
        self.context.dict.clone()
    }

    /// Serialize with every string and stream encrypted.
    pub fn serialize(&self, config: &WriterConfig) -> Result<Vec<u8>> {
        writer::serialize_with(&self.document, config, Some(&self.context))
    }

    /// Serialize and atomically write to `path`.
    ///
    /// Failures are reported as [`Error::Input`] carrying `path`.
    pub fn save(&self, path: impl AsRef<Path>, config: &WriterConfig) -> Result<()> {
        let path = path.as_ref();
        let result = writer::write_document(&self.document, config, Some(&self.context))
            .and_then(|bytes| writer::atomic::save_atomic(path, &bytes))
            .map_err(|e| e.for_input(path));
        audit::record_file("save_encrypted", path, result, Some(self.document.page_count()))
    }
}

/// Prepare `doc` for encrypted output.
///
/// Derives the `/O` and `/U` values and the file key from the configured
/// passwords and the document's file identifier (generated when absent).
pub fn encrypt(doc: &Document, config: &EncryptionConfig) -> Result<EncryptedDocument> {
    let result = prepare(doc, config);
    audit::record("encrypt", result, Some(doc.page_count()))
}

fn prepare(doc: &Document, config: &EncryptionConfig) -> Result<EncryptedDocument> {
    doc.ensure_unlocked("encrypt")?;

    let mut document = doc.clone();
    let file_id = document.ensure_file_id();
    let algorithm = config.algorithm;
    let (_, revision) = algorithm.version_revision();
    let key_length = algorithm.key_length();

    let owner_value = algorithms::compute_owner_value(
        config.owner_password.as_bytes(),
        config.user_password.as_bytes(),
        revision,
        key_length,
    );
    let encrypt_dict = EncryptDict::new(algorithm, owner_value, Vec::new(), config.permissions);
    let params = algorithms::KeyParams {
        owner_value: &encrypt_dict.owner_value,
        permissions: encrypt_dict.permissions,
        file_id: &file_id,
        revision,
        key_length,
        encrypt_metadata: encrypt_dict.encrypt_metadata,
    };
    let file_key = algorithms::compute_encryption_key(config.user_password.as_bytes(), &params);
    let user_value = algorithms::compute_user_value(&file_key, &file_id, revision);

    let dict = EncryptDict {
        user_value,
        ..encrypt_dict
    };
    log::info!("encrypting with {:?} ({} pages)", algorithm, document.page_count());

    Ok(EncryptedDocument {
        document,
        context: EncryptionContext {
            handler: SecurityHandler::from_key(algorithm, file_key),
            dict,
        },
    })
}

/// Authenticate `password` and return a decrypted copy of `doc`.
///
/// Fails with [`Error::Auth`] when the password matches neither the user
/// nor the owner password. An unencrypted document is returned unchanged.
pub fn decrypt(doc: &Document, password: &str) -> Result<Document> {
    let mut document = doc.clone();
    let result = document.unlock(password.as_bytes()).map(|()| document);
    audit::record("decrypt", result, Some(doc.page_count()))
}

/// Encrypt each `(input, output)` pair.
///
/// Inputs are parsed in parallel; outputs are written one at a time and
/// each written file is reported with its own audit event. The first
/// failing file is reported through [`Error::Input`].
pub fn encrypt_files<P, Q>(pairs: &[(P, Q)], config: &EncryptionConfig, writer_config: &WriterConfig) -> Result<()>
where
    P: AsRef<Path> + Sync,
    Q: AsRef<Path> + Sync,
{
    let documents: Vec<Document> = pairs
        .par_iter()
        .map(|(input, _)| Document::load(input))
        .collect::<Result<_>>()?;

    for (doc, (input, output)) in documents.iter().zip(pairs) {
        let (input, output): (&Path, &Path) = (input.as_ref(), output.as_ref());
        let result = prepare(doc, config).map_err(|e| e.for_input(input)).and_then(|encrypted| {
            writer::write_document(&encrypted.document, writer_config, Some(&encrypted.context))
                .and_then(|bytes| writer::atomic::save_atomic(output, &bytes))
                .map_err(|e| e.for_input(output))
        });
        audit::record_file("encrypt_files", output, result, Some(doc.page_count()))?;
    }
    log::info!("encrypted {} files", pairs.len());
    Ok(())
}
