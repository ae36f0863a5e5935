use std::fmt::Display;

use anyhow::{anyhow, Result};
use serde::{Serialize, Deserialize};
use sha1::Digest;

/// Represents a SHA-1 hash as an array of 20 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha1Hash(pub [u8; 20]);

/// Represents a SHA-256 hash as an array of 32 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sha256Hash(pub [u8; 32]);

impl Sha1Hash {
    pub fn new(hash: &[u8; 20]) -> Sha1Hash {
        Sha1Hash(*hash)
    }

    pub fn from_hex(hex: &str) -> Result<Sha1Hash> {
        let bytes: [u8; 20] = hex::decode(hex)?
            .try_into()
            .map_err(|_| anyhow!("invalid sha1 hash length"))?;

        Ok(Sha1Hash(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Sha256Hash {
    pub fn new(hash: &[u8; 32]) -> Sha256Hash {
        Sha256Hash(*hash)
    }

    pub fn from_hex(hex: &str) -> Result<Sha256Hash> {
        let bytes: [u8; 32] = hex::decode(hex)?
            .try_into()
            .map_err(|_| anyhow!("invalid sha256 hash length"))?;

        Ok(Sha256Hash(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Display for Sha1Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Display for Sha256Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

pub fn sha1_hash(value: &[u8]) -> Sha1Hash {
    let mut hasher = sha1::Sha1::new();
    hasher.update(value);

    Sha1Hash(hasher.finalize().into())
}

pub fn sha256_hash(value: &[u8]) -> Sha256Hash {
    let mut hasher = sha2::Sha256::new();
    hasher.update(value);

    Sha256Hash(hasher.finalize().into())
}

#[cfg(test)]
mod hashing_tests {
    use super::*;

    #[test]
    fn test_sha1hash_to_hex() {
        let sha1_hash = Sha1Hash::new(&[90; 20]);

        assert_eq!("5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a", sha1_hash.to_hex());
        assert_eq!(sha1_hash.to_hex(), sha1_hash.to_string());
    }

    #[test]
    fn test_sha1hash_from_hex() {
        let sha1_hash = Sha1Hash::from_hex("5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a5a").unwrap();
        assert_eq!(&[90u8; 20], sha1_hash.as_bytes());

        assert!(Sha1Hash::from_hex("5a5a").is_err());
        assert!(Sha1Hash::from_hex("not hex").is_err());
    }

    #[test]
    fn test_sha1_known_digest() {
        assert_eq!("a9993e364706816aba3e25717850c26c9cd0d89d", sha1_hash(b"abc").to_hex());
        assert_eq!("da39a3ee5e6b4b0d3255bfef95601890afd80709", sha1_hash(b"").to_hex());
    }

    #[test]
    fn test_sha256_known_digest() {
        assert_eq!(
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
            sha256_hash(b"abc").to_hex()
        );
    }

    #[test]
    fn test_sha256hash_from_hex() {
        let hash = sha256_hash(b"abc");

        assert_eq!(hash, Sha256Hash::from_hex(&hash.to_hex()).unwrap());
        assert!(Sha256Hash::from_hex("ab").is_err());
    }
}
