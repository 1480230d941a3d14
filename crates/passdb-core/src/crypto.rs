//! Password-based key derivation and the authenticated encryption envelope.
//!
//! Every store write is sealed into a self-describing envelope:
//!
//! ```text
//! [ header (18) | nonce (24) | ciphertext + tag | salt (32) ]
//! header = "PSDB" | format version u8 | kdf id u8 | m_cost u32le | t_cost u32le | p_cost u32le
//! ```
//!
//! The key is re-derived with Argon2id on every call and never cached. The
//! header is authenticated as associated data, so the cost parameters cannot
//! be swapped without breaking the tag.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::error::CryptoError;

pub const KDF_TIME_COST: u32 = 3;
pub const KDF_MEMORY_COST: u32 = 65536; // 64MB
pub const KDF_PARALLELISM: u32 = 4;
pub const DERIVED_KEY_LEN: usize = 32;

pub const MIN_PASSWORD_LEN: usize = 5;
pub const SALT_LEN: usize = 32;
pub const NONCE_LEN: usize = 24;
pub const TAG_LEN: usize = 16;

pub const ENVELOPE_MAGIC: &[u8; 4] = b"PSDB";
pub const ENVELOPE_VERSION: u8 = 1;
pub const HEADER_LEN: usize = 18;
const KDF_ID_ARGON2ID: u8 = 1;

// Ceilings applied to parameters read back from an envelope.
const MAX_MEMORY_COST: u32 = 2 * 1024 * 1024; // 2GB
const MAX_TIME_COST: u32 = 64;
const MAX_PARALLELISM: u32 = 64;

const MIN_ENVELOPE_LEN: usize = HEADER_LEN + NONCE_LEN + TAG_LEN + SALT_LEN;

pub type DerivedKey = Zeroizing<[u8; DERIVED_KEY_LEN]>;

/// Argon2id cost parameters. Memory is in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl KdfParams {
    pub const fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Self {
        Self {
            memory_cost,
            time_cost,
            parallelism,
        }
    }

    /// Component-wise maximum of two parameter sets.
    pub fn max(self, other: Self) -> Self {
        Self::new(
            self.memory_cost.max(other.memory_cost),
            self.time_cost.max(other.time_cost),
            self.parallelism.max(other.parallelism),
        )
    }

    fn argon2(&self) -> Result<Argon2<'static>, CryptoError> {
        let params = Params::new(
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Some(DERIVED_KEY_LEN),
        )
        .map_err(|e| CryptoError::KeyDerivation(format!("argon2 params: {e}")))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn within_limits(&self) -> bool {
        self.memory_cost <= MAX_MEMORY_COST
            && self.time_cost <= MAX_TIME_COST
            && self.parallelism <= MAX_PARALLELISM
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::new(KDF_MEMORY_COST, KDF_TIME_COST, KDF_PARALLELISM)
    }
}

/// Leading, authenticated part of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub version: u8,
    pub kdf: KdfParams,
}

impl EnvelopeHeader {
    fn new(kdf: KdfParams) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            kdf,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[..4].copy_from_slice(ENVELOPE_MAGIC);
        buf[4] = self.version;
        buf[5] = KDF_ID_ARGON2ID;
        buf[6..10].copy_from_slice(&self.kdf.memory_cost.to_le_bytes());
        buf[10..14].copy_from_slice(&self.kdf.time_cost.to_le_bytes());
        buf[14..18].copy_from_slice(&self.kdf.parallelism.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN || &buf[..4] != ENVELOPE_MAGIC {
            return None;
        }
        if buf[4] != ENVELOPE_VERSION || buf[5] != KDF_ID_ARGON2ID {
            return None;
        }
        let word = |at: usize| -> Option<u32> {
            Some(u32::from_le_bytes(buf[at..at + 4].try_into().ok()?))
        };
        Some(Self {
            version: buf[4],
            kdf: KdfParams::new(word(6)?, word(10)?, word(14)?),
        })
    }
}

/// Derive a 32-byte key from `passphrase`. A fresh random salt is generated
/// when none is supplied; the salt used is always returned with the key.
pub fn derive_key(
    passphrase: &[u8],
    salt: Option<&[u8; SALT_LEN]>,
    params: &KdfParams,
) -> Result<(DerivedKey, [u8; SALT_LEN]), CryptoError> {
    let salt = match salt {
        Some(salt) => *salt,
        None => generate_salt()?,
    };
    let mut key = Zeroizing::new([0u8; DERIVED_KEY_LEN]);
    params
        .argon2()?
        .hash_password_into(passphrase, &salt, &mut key[..])
        .map_err(|e| CryptoError::KeyDerivation(format!("argon2 derive: {e}")))?;
    Ok((key, salt))
}

/// Seal `plaintext` with the default cost parameters.
pub fn encrypt(plaintext: &[u8], passphrase: &[u8]) -> Result<Vec<u8>, CryptoError> {
    encrypt_with(plaintext, passphrase, &KdfParams::default())
}

pub fn encrypt_with(
    plaintext: &[u8],
    passphrase: &[u8],
    params: &KdfParams,
) -> Result<Vec<u8>, CryptoError> {
    validate_inputs(plaintext, passphrase)?;
    let (key, salt) = derive_key(passphrase, None, params)?;
    let header = EnvelopeHeader::new(*params).to_bytes();
    let nonce = generate_nonce()?;

    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
    let sealed = cipher
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &header,
            },
        )
        .map_err(|_| CryptoError::Encrypt)?;

    let mut out = Vec::with_capacity(HEADER_LEN + NONCE_LEN + sealed.len() + SALT_LEN);
    out.extend_from_slice(&header);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    out.extend_from_slice(&salt);
    Ok(out)
}

/// Open an envelope. Any failure past input validation is `CannotDecrypt`.
pub fn decrypt(envelope: &[u8], passphrase: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    validate_inputs(envelope, passphrase)?;
    if envelope.len() < MIN_ENVELOPE_LEN {
        return Err(CryptoError::CannotDecrypt);
    }
    let (body, salt) = envelope.split_at(envelope.len() - SALT_LEN);
    let (header_bytes, rest) = body.split_at(HEADER_LEN);
    let header = EnvelopeHeader::from_bytes(header_bytes).ok_or(CryptoError::CannotDecrypt)?;
    if !header.kdf.within_limits() {
        return Err(CryptoError::CannotDecrypt);
    }
    let salt: [u8; SALT_LEN] = salt.try_into().map_err(|_| CryptoError::CannotDecrypt)?;
    let (key, _) = derive_key(passphrase, Some(&salt), &header.kdf)
        .map_err(|_| CryptoError::CannotDecrypt)?;

    let (nonce, sealed) = rest.split_at(NONCE_LEN);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key[..]));
    cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: sealed,
                aad: header_bytes,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::CannotDecrypt)
}

/// Read the header of an envelope without a passphrase.
pub fn inspect(envelope: &[u8]) -> Result<EnvelopeHeader, CryptoError> {
    if envelope.len() < MIN_ENVELOPE_LEN {
        return Err(CryptoError::CannotDecrypt);
    }
    EnvelopeHeader::from_bytes(envelope).ok_or(CryptoError::CannotDecrypt)
}

fn validate_inputs(text: &[u8], passphrase: &[u8]) -> Result<(), CryptoError> {
    if passphrase.len() < MIN_PASSWORD_LEN {
        return Err(CryptoError::InvalidPassword);
    }
    if text.is_empty() {
        return Err(CryptoError::EmptyInputText);
    }
    Ok(())
}

pub fn generate_salt() -> Result<[u8; SALT_LEN], CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .map_err(|e| CryptoError::KeyDerivation(format!("secure random source: {e}")))?;
    Ok(salt)
}

fn generate_nonce() -> Result<[u8; NONCE_LEN], CryptoError> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce)
        .map_err(|_| CryptoError::Encrypt)?;
    Ok(nonce)
}
