//! Digest algorithms used in login responses.

use crate::error::{constants, MapiError, Result};
use md5::Md5;
use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

/// Hash algorithms a server may advertise in its challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha512,
    Sha384,
    Sha256,
    Sha224,
    Sha1,
    Md5,
    Ripemd160,
}

impl HashAlgorithm {
    /// Strongest first; the order used when no override is given
    pub const PREFERENCE: [HashAlgorithm; 7] = [
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha384,
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha224,
        HashAlgorithm::Sha1,
        HashAlgorithm::Md5,
        HashAlgorithm::Ripemd160,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "SHA512" => Some(HashAlgorithm::Sha512),
            "SHA384" => Some(HashAlgorithm::Sha384),
            "SHA256" => Some(HashAlgorithm::Sha256),
            "SHA224" => Some(HashAlgorithm::Sha224),
            "SHA1" => Some(HashAlgorithm::Sha1),
            "MD5" => Some(HashAlgorithm::Md5),
            "RIPEMD160" => Some(HashAlgorithm::Ripemd160),
            _ => None,
        }
    }

    /// Name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha512 => "SHA512",
            HashAlgorithm::Sha384 => "SHA384",
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha224 => "SHA224",
            HashAlgorithm::Sha1 => "SHA1",
            HashAlgorithm::Md5 => "MD5",
            HashAlgorithm::Ripemd160 => "RIPEMD160",
        }
    }

    /// Lowercase hex digest of the concatenation of `parts`
    pub fn hex_digest(&self, parts: &[&[u8]]) -> String {
        match self {
            HashAlgorithm::Sha512 => digest_hex::<Sha512>(parts),
            HashAlgorithm::Sha384 => digest_hex::<Sha384>(parts),
            HashAlgorithm::Sha256 => digest_hex::<Sha256>(parts),
            HashAlgorithm::Sha224 => digest_hex::<Sha224>(parts),
            HashAlgorithm::Sha1 => digest_hex::<Sha1>(parts),
            HashAlgorithm::Md5 => digest_hex::<Md5>(parts),
            HashAlgorithm::Ripemd160 => digest_hex::<Ripemd160>(parts),
        }
    }

    /// Pick the algorithm for a login digest.
    ///
    /// With an override, that algorithm must be known and advertised.
    /// Without one, the first entry of [`Self::PREFERENCE`] the server
    /// advertises wins.
    pub fn negotiate(advertised: &[&str], requested: Option<&str>) -> Result<Self> {
        let offered: Vec<HashAlgorithm> = advertised
            .iter()
            .filter_map(|name| HashAlgorithm::from_name(name))
            .collect();

        if let Some(name) = requested {
            let algo = HashAlgorithm::from_name(name)
                .ok_or_else(|| MapiError::UnsupportedHash(name.to_string()))?;
            if !offered.contains(&algo) {
                return Err(MapiError::UnsupportedHash(format!(
                    "{} not advertised by server (offered: {})",
                    algo.name(),
                    advertised.join(",")
                )));
            }
            return Ok(algo);
        }

        Self::PREFERENCE
            .into_iter()
            .find(|algo| offered.contains(algo))
            .ok_or_else(|| {
                MapiError::UnsupportedHash(format!(
                    "{} (offered: {})",
                    constants::ERR_NO_COMMON_HASH,
                    advertised.join(",")
                ))
            })
    }
}

fn digest_hex<D: Digest>(parts: &[&[u8]]) -> String {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    hex_encode(&hasher.finalize())
}

/// Encode bytes as lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
