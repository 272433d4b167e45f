//! Prefix width and byte order

use std::fmt;

use super::Error;

/// Number of bytes used to encode a frame's payload length
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PrefixWidth {
    /// 1-byte prefix, payloads up to 255 bytes
    One = 1,
    /// 2-byte prefix, payloads up to 65535 bytes
    Two = 2,
    /// 4-byte prefix, payloads up to 4294967295 bytes
    #[default]
    Four = 4,
}

impl PrefixWidth {
    /// Convert from a byte count
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            4 => Some(Self::Four),
            _ => None,
        }
    }

    /// Prefix length in bytes
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Prefix length in bytes, as a `usize`
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self as usize
    }

    /// Largest payload the prefix can describe: `2^(8 * width) - 1`
    #[must_use]
    pub const fn max_frame_size(self) -> u64 {
        match self {
            Self::One => u8::MAX as u64,
            Self::Two => u16::MAX as u64,
            Self::Four => u32::MAX as u64,
        }
    }
}

impl TryFrom<u8> for PrefixWidth {
    type Error = Error;

    fn try_from(width: u8) -> Result<Self, Self::Error> {
        Self::from_u8(width).ok_or(Error::InvalidPrefixWidth { width })
    }
}

impl From<PrefixWidth> for u8 {
    fn from(width: PrefixWidth) -> Self {
        width.as_u8()
    }
}

impl fmt::Display for PrefixWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-byte", self.as_u8())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for PrefixWidth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for PrefixWidth {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let width = u8::deserialize(deserializer)?;
        Self::try_from(width).map_err(serde::de::Error::custom)
    }
}

/// Serialization order of the prefix integer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ByteOrder {
    /// Most significant byte first (network order)
    #[default]
    Big,
    /// Least significant byte first
    Little,
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Big => "big-endian",
            Self::Little => "little-endian",
        };
        write!(f, "{name}")
    }
}
