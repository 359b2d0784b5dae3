// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Encryption Envelope
//!
//! The optional passphrase-derived envelope around the persisted staged
//! state. Applied iff a passphrase is supplied when writing; detection
//! works from the magic bytes alone, without a passphrase.
//!
//! ## Format
//!
//! ```text
//! offset  size  field
//! 0       5     magic "SUVE1"
//! 5       1     envelope version (1)
//! 6       4     Argon2 memory cost, KiB, little-endian
//! 10      4     Argon2 iterations, little-endian
//! 14      4     Argon2 lanes, little-endian
//! 18      1     salt length (16)
//! 19      16    salt
//! 35      1     nonce length (12)
//! 36      12    nonce
//! 48      1     AEAD tag length (16)
//! 49      …     AES-256-GCM ciphertext (tag appended)
//! ```
//!
//! The key is derived with Argon2id (19 MiB, 2 iterations, 1 lane; the
//! parameters are stored in the header, so files written with different
//! costs stay readable). The ciphertext is the JSON plaintext under
//! AES-256-GCM with the whole header as associated data: any header
//! tampering fails authentication.
//!
//! Decryption blocks on the KDF for tens of milliseconds; that cost is
//! what stands between a stolen file and offline guessing.

use aes_gcm::{AeadInPlace, Aes256Gcm, Key, KeyInit, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use ring::rand::{SecureRandom, SystemRandom};

use cloudstage_bootstrap::secure::{Passphrase, SecureBytes};
use cloudstage_domain::StageError;

/// Magic bytes identifying an encrypted stage file.
pub const MAGIC: &[u8; 5] = b"SUVE1";

/// Current envelope format version.
pub const ENVELOPE_VERSION: u8 = 1;

/// Argon2id memory cost in KiB (19 MiB).
pub const ARGON2_M_COST_KIB: u32 = 19 * 1024;

/// Argon2id iteration count.
pub const ARGON2_T_COST: u32 = 2;

/// Argon2id lane count.
pub const ARGON2_LANES: u32 = 1;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;
const HEADER_LEN: usize = 5 + 1 + 4 + 4 + 4 + 1 + SALT_LEN + 1 + NONCE_LEN + 1;

/// Whether these bytes carry the encryption envelope.
///
/// Requires no passphrase; callers use this to decide whether to prompt.
pub fn is_encrypted(bytes: &[u8]) -> bool {
    bytes.len() >= MAGIC.len() && &bytes[..MAGIC.len()] == MAGIC
}

/// Seals `plaintext` under a passphrase-derived key.
pub fn encrypt(plaintext: &[u8], passphrase: &Passphrase) -> Result<Vec<u8>, StageError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|e| StageError::io(format!("failed to generate salt: {:?}", e)))?;
    let mut nonce = [0u8; NONCE_LEN];
    rng.fill(&mut nonce)
        .map_err(|e| StageError::io(format!("failed to generate nonce: {:?}", e)))?;

    let header = build_header(ARGON2_M_COST_KIB, ARGON2_T_COST, ARGON2_LANES, &salt, &nonce);
    let key = derive_key(passphrase, &salt, ARGON2_M_COST_KIB, ARGON2_T_COST, ARGON2_LANES)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));
    let mut buffer = plaintext.to_vec();
    cipher
        .encrypt_in_place(Nonce::from_slice(&nonce), &header, &mut buffer)
        .map_err(|e| StageError::io(format!("AES-256-GCM encryption failed: {:?}", e)))?;

    let mut sealed = header;
    sealed.extend_from_slice(&buffer);
    Ok(sealed)
}

/// Opens an envelope produced by [`encrypt`].
///
/// # Errors
///
/// [`StageError::Decrypt`] on a wrong passphrase, a tampered header or
/// ciphertext, or a malformed envelope.
pub fn decrypt(sealed: &[u8], passphrase: &Passphrase) -> Result<Vec<u8>, StageError> {
    let header = parse_header(sealed)?;
    let key = derive_key(passphrase, &header.salt, header.m_cost_kib, header.t_cost, header.lanes)?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_slice()));
    let mut buffer = sealed[HEADER_LEN..].to_vec();
    cipher
        .decrypt_in_place(Nonce::from_slice(&header.nonce), &sealed[..HEADER_LEN], &mut buffer)
        .map_err(|_| StageError::decrypt("wrong passphrase or tampered data"))?;

    Ok(buffer)
}

struct Header {
    m_cost_kib: u32,
    t_cost: u32,
    lanes: u32,
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
}

fn build_header(m_cost_kib: u32, t_cost: u32, lanes: u32, salt: &[u8; SALT_LEN], nonce: &[u8; NONCE_LEN]) -> Vec<u8> {
    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(MAGIC);
    header.push(ENVELOPE_VERSION);
    header.extend_from_slice(&m_cost_kib.to_le_bytes());
    header.extend_from_slice(&t_cost.to_le_bytes());
    header.extend_from_slice(&lanes.to_le_bytes());
    header.push(SALT_LEN as u8);
    header.extend_from_slice(salt);
    header.push(NONCE_LEN as u8);
    header.extend_from_slice(nonce);
    header.push(TAG_LEN as u8);
    debug_assert_eq!(header.len(), HEADER_LEN);
    header
}

fn parse_header(sealed: &[u8]) -> Result<Header, StageError> {
    if !is_encrypted(sealed) {
        return Err(StageError::decrypt("missing envelope magic"));
    }
    if sealed.len() < HEADER_LEN {
        return Err(StageError::decrypt("truncated envelope header"));
    }
    let version = sealed[5];
    if version != ENVELOPE_VERSION {
        return Err(StageError::decrypt(format!("unknown envelope version {}", version)));
    }

    let m_cost_kib = read_u32_le(&sealed[6..10]);
    let t_cost = read_u32_le(&sealed[10..14]);
    let lanes = read_u32_le(&sealed[14..18]);

    if sealed[18] as usize != SALT_LEN {
        return Err(StageError::decrypt("unexpected salt length"));
    }
    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&sealed[19..19 + SALT_LEN]);

    if sealed[35] as usize != NONCE_LEN {
        return Err(StageError::decrypt("unexpected nonce length"));
    }
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&sealed[36..36 + NONCE_LEN]);

    if sealed[48] as usize != TAG_LEN {
        return Err(StageError::decrypt("unexpected tag length"));
    }

    Ok(Header {
        m_cost_kib,
        t_cost,
        lanes,
        salt,
        nonce,
    })
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Derives the AES key from the passphrase with Argon2id.
fn derive_key(
    passphrase: &Passphrase,
    salt: &[u8],
    m_cost_kib: u32,
    t_cost: u32,
    lanes: u32,
) -> Result<SecureBytes, StageError> {
    let params = Params::new(m_cost_kib, t_cost, lanes, Some(KEY_LEN))
        .map_err(|e| StageError::decrypt(format!("invalid KDF parameters: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = SecureBytes::zeroed(KEY_LEN);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, key.as_mut_slice())
        .map_err(|e| StageError::decrypt(format!("key derivation failed: {}", e)))?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passphrase(s: &str) -> Passphrase {
        Passphrase::new(s.as_bytes().to_vec())
    }

    #[test]
    fn test_round_trip() {
        let plain = br#"{"version":2,"entries":{},"tags":{}}"#;
        let sealed = encrypt(plain, &passphrase("opensesame")).unwrap();
        assert!(is_encrypted(&sealed));
        let opened = decrypt(&sealed, &passphrase("opensesame")).unwrap();
        assert_eq!(opened, plain);
    }

    #[test]
    fn test_wrong_passphrase_fails_with_decrypt_kind() {
        let sealed = encrypt(b"payload", &passphrase("right")).unwrap();
        let err = decrypt(&sealed, &passphrase("wrong")).unwrap_err();
        assert_eq!(err.kind(), "decrypt");
    }

    #[test]
    fn test_detection_without_passphrase() {
        let sealed = encrypt(b"payload", &passphrase("p")).unwrap();
        assert!(is_encrypted(&sealed));
        assert!(!is_encrypted(b"{\"version\":2}"));
        assert!(!is_encrypted(b"SUV"));
    }

    #[test]
    fn test_header_tampering_fails_authentication() {
        let mut sealed = encrypt(b"payload", &passphrase("p")).unwrap();
        // Flip one bit inside the KDF parameter block.
        sealed[7] ^= 0x01;
        let err = decrypt(&sealed, &passphrase("p")).unwrap_err();
        assert_eq!(err.kind(), "decrypt");
    }

    #[test]
    fn test_ciphertext_tampering_fails_authentication() {
        let mut sealed = encrypt(b"payload", &passphrase("p")).unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x80;
        assert!(decrypt(&sealed, &passphrase("p")).is_err());
    }

    #[test]
    fn test_truncated_and_unknown_version_rejected() {
        let sealed = encrypt(b"payload", &passphrase("p")).unwrap();
        assert!(decrypt(&sealed[..20], &passphrase("p")).is_err());

        let mut wrong_version = sealed.clone();
        wrong_version[5] = 9;
        let err = decrypt(&wrong_version, &passphrase("p")).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_distinct_salts_per_encryption() {
        let a = encrypt(b"same", &passphrase("p")).unwrap();
        let b = encrypt(b"same", &passphrase("p")).unwrap();
        assert_ne!(a, b);
    }
}
