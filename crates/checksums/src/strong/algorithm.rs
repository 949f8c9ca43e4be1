use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use super::{StrongDigest, StrongHasher};

/// Strong hash functions available for confirming block matches.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum StrongHashAlgorithm {
    /// SHA-256, 32-byte digests.
    #[default]
    Sha256,
    /// SHA-1, 20-byte digests.
    Sha1,
    /// MD5, 16-byte digests.
    Md5,
    /// XXH3 with 128-bit output. Not cryptographic, but fast.
    #[cfg_attr(feature = "serde", serde(rename = "xxh3-128"))]
    Xxh3_128,
}

impl StrongHashAlgorithm {
    /// Every supported algorithm, in wire-identifier order.
    pub const ALL: [Self; 4] = [Self::Sha256, Self::Sha1, Self::Md5, Self::Xxh3_128];

    /// Returns the digest width in bytes.
    #[inline]
    #[must_use]
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha1 => 20,
            Self::Md5 | Self::Xxh3_128 => 16,
        }
    }

    /// Stable one-byte identifier written into checksum stream headers.
    #[must_use]
    pub const fn wire_id(self) -> u8 {
        match self {
            Self::Sha256 => 1,
            Self::Sha1 => 2,
            Self::Md5 => 3,
            Self::Xxh3_128 => 4,
        }
    }

    /// Maps a wire identifier back to its algorithm.
    #[must_use]
    pub const fn from_wire_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Sha256),
            2 => Some(Self::Sha1),
            3 => Some(Self::Md5),
            4 => Some(Self::Xxh3_128),
            _ => None,
        }
    }

    /// Canonical lowercase name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha1 => "sha1",
            Self::Md5 => "md5",
            Self::Xxh3_128 => "xxh3-128",
        }
    }

    /// Creates a streaming hasher for this algorithm.
    #[must_use]
    pub fn hasher(self) -> StrongHasher {
        StrongHasher::new(self)
    }

    /// Hashes `data` in one call.
    #[must_use]
    pub fn digest(self, data: &[u8]) -> StrongDigest {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }
}

impl fmt::Display for StrongHashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown algorithm name.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
#[error("unknown strong hash algorithm '{0}' (expected sha256, sha1, md5 or xxh3-128)")]
pub struct ParseAlgorithmError(String);

impl FromStr for StrongHashAlgorithm {
    type Err = ParseAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(Self::Sha256),
            "sha1" | "sha-1" => Ok(Self::Sha1),
            "md5" => Ok(Self::Md5),
            "xxh3-128" | "xxh3_128" | "xxh128" => Ok(Self::Xxh3_128),
            _ => Err(ParseAlgorithmError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_sha256() {
        assert_eq!(StrongHashAlgorithm::default(), StrongHashAlgorithm::Sha256);
    }

    #[test]
    fn wire_ids_round_trip() {
        for algorithm in StrongHashAlgorithm::ALL {
            assert_eq!(
                StrongHashAlgorithm::from_wire_id(algorithm.wire_id()),
                Some(algorithm)
            );
        }
        assert_eq!(StrongHashAlgorithm::from_wire_id(0), None);
        assert_eq!(StrongHashAlgorithm::from_wire_id(5), None);
    }

    #[test]
    fn names_parse_back() {
        for algorithm in StrongHashAlgorithm::ALL {
            assert_eq!(algorithm.name().parse::<StrongHashAlgorithm>(), Ok(algorithm));
        }
        assert_eq!(
            "SHA-256".parse::<StrongHashAlgorithm>(),
            Ok(StrongHashAlgorithm::Sha256)
        );
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "md4".parse::<StrongHashAlgorithm>().unwrap_err();
        assert!(err.to_string().contains("md4"));
    }

    #[test]
    fn digest_lengths() {
        assert_eq!(StrongHashAlgorithm::Sha256.digest_len(), 32);
        assert_eq!(StrongHashAlgorithm::Sha1.digest_len(), 20);
        assert_eq!(StrongHashAlgorithm::Md5.digest_len(), 16);
        assert_eq!(StrongHashAlgorithm::Xxh3_128.digest_len(), 16);
    }
}
