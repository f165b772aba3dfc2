use primitive_types::H160;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Account or component identifier.
pub type Address = H160;

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

/// Auction identifier, unique per Clipper and starting at 1.
pub type SaleId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("ilk id must be at most 32 bytes: {0:?}")]
pub struct InvalidIlkId(pub String);

/// Collateral type identifier with bytes32 semantics: a short text label,
/// zero padded.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IlkId([u8; 32]);

impl IlkId {
    pub fn new(name: &str) -> Result<Self, InvalidIlkId> {
        let bytes = name.as_bytes();
        if bytes.len() > 32 {
            return Err(InvalidIlkId(name.to_string()));
        }
        let mut raw = [0u8; 32];
        raw[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn name(&self) -> String {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(32);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl FromStr for IlkId {
    type Err = InvalidIlkId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for IlkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl fmt::Debug for IlkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IlkId({})", self.name())
    }
}

impl Serialize for IlkId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

impl<'de> Deserialize<'de> for IlkId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        IlkId::new(&name).map_err(de::Error::custom)
    }
}
