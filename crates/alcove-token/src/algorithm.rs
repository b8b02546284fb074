//! Registry of supported HMAC hash algorithms.

use std::fmt;
use std::str::FromStr;

use alcove_core::ConfigError;
use hmac::digest::{InvalidLength, KeyInit};
use hmac::{Hmac, Mac};
use sha2::{Sha224, Sha256, Sha384, Sha512};

/// Hash function used as the HMAC primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    Sha224,
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl Algorithm {
    /// Every algorithm accepted by [`Algorithm::from_str`].
    pub const SUPPORTED: [Algorithm; 4] = [
        Algorithm::Sha224,
        Algorithm::Sha256,
        Algorithm::Sha384,
        Algorithm::Sha512,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Sha224 => "sha224",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha384 => "sha384",
            Algorithm::Sha512 => "sha512",
        }
    }

    /// Compute the MAC of `message` under `key`.
    pub(crate) fn sign(&self, key: &[u8], message: &[u8]) -> Result<Vec<u8>, InvalidLength> {
        match self {
            Algorithm::Sha224 => mac_bytes::<Hmac<Sha224>>(key, message),
            Algorithm::Sha256 => mac_bytes::<Hmac<Sha256>>(key, message),
            Algorithm::Sha384 => mac_bytes::<Hmac<Sha384>>(key, message),
            Algorithm::Sha512 => mac_bytes::<Hmac<Sha512>>(key, message),
        }
    }

    /// Check `expected` against the MAC of `message` in constant time.
    pub(crate) fn verify(
        &self,
        key: &[u8],
        message: &[u8],
        expected: &[u8],
    ) -> Result<bool, InvalidLength> {
        match self {
            Algorithm::Sha224 => mac_verify::<Hmac<Sha224>>(key, message, expected),
            Algorithm::Sha256 => mac_verify::<Hmac<Sha256>>(key, message, expected),
            Algorithm::Sha384 => mac_verify::<Hmac<Sha384>>(key, message, expected),
            Algorithm::Sha512 => mac_verify::<Hmac<Sha512>>(key, message, expected),
        }
    }
}

fn mac_bytes<M: Mac + KeyInit>(key: &[u8], message: &[u8]) -> Result<Vec<u8>, InvalidLength> {
    let mut mac = <M as Mac>::new_from_slice(key)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn mac_verify<M: Mac + KeyInit>(
    key: &[u8],
    message: &[u8],
    expected: &[u8],
) -> Result<bool, InvalidLength> {
    let mut mac = <M as Mac>::new_from_slice(key)?;
    mac.update(message);
    // verify_slice compares in constant time
    Ok(mac.verify_slice(expected).is_ok())
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    /// Accepts the registry names case-insensitively, with or without a dash
    /// (`sha256`, `SHA-256`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "");
        Self::SUPPORTED
            .into_iter()
            .find(|alg| alg.as_str() == normalized)
            .ok_or_else(|| ConfigError::UnsupportedAlgorithm(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("sha256".parse::<Algorithm>().unwrap(), Algorithm::Sha256);
        assert_eq!("SHA-512".parse::<Algorithm>().unwrap(), Algorithm::Sha512);
        assert_eq!("sha224".parse::<Algorithm>().unwrap(), Algorithm::Sha224);
        assert!(matches!(
            "md5".parse::<Algorithm>(),
            Err(ConfigError::UnsupportedAlgorithm(name)) if name == "md5"
        ));
    }

    #[test]
    fn test_digest_lengths() {
        let key = b"key";
        assert_eq!(Algorithm::Sha224.sign(key, b"m").unwrap().len(), 28);
        assert_eq!(Algorithm::Sha256.sign(key, b"m").unwrap().len(), 32);
        assert_eq!(Algorithm::Sha384.sign(key, b"m").unwrap().len(), 48);
        assert_eq!(Algorithm::Sha512.sign(key, b"m").unwrap().len(), 64);
    }

    #[test]
    fn test_hmac_sha256_known_vector() {
        // RFC 4231 test case 2
        let mac = Algorithm::Sha256
            .sign(b"Jefe", b"what do ya want for nothing?")
            .unwrap();
        let hex: String = mac.iter().map(|b| format!("{:02x}", b)).collect();
        assert_eq!(
            hex,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify() {
        let mac = Algorithm::Sha384.sign(b"k", b"message").unwrap();
        assert!(Algorithm::Sha384.verify(b"k", b"message", &mac).unwrap());
        assert!(!Algorithm::Sha384.verify(b"k", b"messagf", &mac).unwrap());
        assert!(!Algorithm::Sha256.verify(b"k", b"message", &mac).unwrap());
        assert!(!Algorithm::Sha384.verify(b"k", b"message", &mac[..10]).unwrap());
    }
}
