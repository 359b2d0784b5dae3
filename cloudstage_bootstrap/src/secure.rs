// /////////////////////////////////////////////////////////////////////////////
// Cloudstage
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Secure Memory
//!
//! Containers for secret material that is wiped from memory when it goes
//! out of scope. Used for passphrases on their way to the key-derivation
//! function and for derived keys before they reach the cipher.
//!
//! Wiping uses the `zeroize` crate, which guarantees the compiler will not
//! elide the overwrite. Page-locking for the agent daemon's whole address
//! space lives in the platform layer ([`crate::platform`]); these types
//! cover the transient copies every process holds.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// A passphrase held only as long as needed.
///
/// The bytes are zeroed when the value is dropped. `Debug` and `Display`
/// are deliberately not implemented; a passphrase has no printable form.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Passphrase {
    bytes: Vec<u8>,
}

impl Passphrase {
    /// Wraps passphrase bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// Borrows the raw bytes for key derivation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the passphrase is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<String> for Passphrase {
    fn from(mut s: String) -> Self {
        let bytes = s.as_bytes().to_vec();
        s.zeroize();
        Self { bytes }
    }
}

/// Secret bytes (derived keys, decrypted payloads) zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecureBytes {
    bytes: Vec<u8>,
}

impl SecureBytes {
    /// Wraps secret bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self { bytes: bytes.into() }
    }

    /// A zeroed buffer of the given length, to be filled in place.
    pub fn zeroed(len: usize) -> Self {
        Self { bytes: vec![0u8; len] }
    }

    /// Borrows the bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutably borrows the bytes (for in-place derivation).
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passphrase_from_string_consumes_it() {
        let pass = Passphrase::from("correct horse".to_string());
        assert_eq!(pass.as_bytes(), b"correct horse");
        assert!(!pass.is_empty());
    }

    #[test]
    fn test_secure_bytes_in_place_fill() {
        let mut key = SecureBytes::zeroed(32);
        assert_eq!(key.len(), 32);
        key.as_mut_slice()[0] = 0xAB;
        assert_eq!(key.as_slice()[0], 0xAB);
    }

    #[test]
    fn test_clone_is_independent() {
        let original = SecureBytes::new(vec![1, 2, 3]);
        let copy = original.clone();
        drop(original);
        assert_eq!(copy.as_slice(), &[1, 2, 3]);
    }
}
