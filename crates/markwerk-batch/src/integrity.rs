// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Source fingerprinting, so a photo submitted twice can be recognised.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_empty_input() {
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn identical_photos_share_a_digest() {
        assert_eq!(hash_bytes(b"sheet-17.jpg"), hash_bytes(b"sheet-17.jpg"));
        assert_ne!(hash_bytes(b"sheet-17.jpg"), hash_bytes(b"sheet-18.jpg"));
    }
}
