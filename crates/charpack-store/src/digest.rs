use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Digest scheme used to address a package's content archive.
///
/// `Crc32` is the legacy 32-bit checksum dialect; `Blake3` is the
/// cryptographic option. Both digest the raw archive byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Crc32,
    Blake3,
}

impl DigestAlgorithm {
    pub fn digest(self, bytes: &[u8]) -> PackDigest {
        let hex = match self {
            Self::Crc32 => format!("{:08x}", crc32fast::hash(bytes)),
            Self::Blake3 => blake3::hash(bytes).to_hex().to_string(),
        };
        PackDigest {
            algorithm: self,
            hex,
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crc32 => f.write_str("crc32"),
            Self::Blake3 => f.write_str("blake3"),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crc32" => Ok(Self::Crc32),
            "blake3" => Ok(Self::Blake3),
            other => Err(format!("unknown digest algorithm '{other}' (expected crc32 or blake3)")),
        }
    }
}

/// A computed content address: algorithm plus lowercase hex digest.
///
/// Rendered `<algorithm>:<hex>` in manifests; the bare hex string is the
/// package's key in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackDigest {
    algorithm: DigestAlgorithm,
    hex: String,
}

impl PackDigest {
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Parse the `<algorithm>:<hex>` form a manifest records.
    pub fn parse(s: &str) -> Result<Self, String> {
        let (algo, hex) = s
            .split_once(':')
            .ok_or_else(|| format!("malformed digest '{s}' (expected <algorithm>:<hex>)"))?;
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(format!("malformed digest hex in '{s}'"));
        }
        Ok(Self {
            algorithm: algo.parse()?,
            hex: hex.to_lowercase(),
        })
    }
}

impl fmt::Display for PackDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}
