//! Raw tag descriptors as reported by a transport poll.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tag technology reported by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagType {
    /// ISO 14443 type A (NFC-A).
    #[serde(rename = "iso14443a", alias = "iso14443_a")]
    Iso14443A,
    /// ISO 14443 type B (NFC-B).
    #[serde(rename = "iso14443b", alias = "iso14443_b")]
    Iso14443B,
    /// ISO 14443-4 tag speaking ISO-DEP.
    IsoDep,
    /// ISO 15693 vicinity tag (NFC-V).
    Iso15693,
    /// JIS X 6319-4 (FeliCa, NFC-F).
    Felica,
    MifareClassic,
    MifareUltralight,
    /// The hardware could not classify the tag.
    Unknown,
}

impl TagType {
    /// Whether the hardware recognised the tag technology.
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl Default for TagType {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for TagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Iso14443A => "ISO 14443-A",
            Self::Iso14443B => "ISO 14443-B",
            Self::IsoDep => "ISO-DEP",
            Self::Iso15693 => "ISO 15693",
            Self::Felica => "FeliCa",
            Self::MifareClassic => "MIFARE Classic",
            Self::MifareUltralight => "MIFARE Ultralight",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

impl FromStr for TagType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "iso14443a" | "iso_14443_a" | "nfca" | "nfc_a" => Ok(Self::Iso14443A),
            "iso14443b" | "iso_14443_b" | "nfcb" | "nfc_b" => Ok(Self::Iso14443B),
            "isodep" | "iso_dep" => Ok(Self::IsoDep),
            "iso15693" | "iso_15693" | "nfcv" | "nfc_v" => Ok(Self::Iso15693),
            "felica" | "nfcf" | "nfc_f" => Ok(Self::Felica),
            "mifare_classic" | "mifareclassic" => Ok(Self::MifareClassic),
            "mifare_ultralight" | "mifareultralight" => Ok(Self::MifareUltralight),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("unknown tag type: {}", s)),
        }
    }
}

/// A tag as acquired by the hardware, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTag {
    /// Technology reported by the hardware.
    #[serde(rename = "type", default)]
    pub tag_type: TagType,
    /// Identifier as a hex string.
    pub id: String,
    /// Colon-delimited historical bytes (ISO 14443-A tags).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub historical_bytes: Option<String>,
    /// Colon-delimited higher-layer response (ISO 14443-B tags).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hi_layer_response: Option<String>,
}

impl RawTag {
    /// Create a raw tag with no answer-to-select data.
    pub fn new(tag_type: TagType, id: impl Into<String>) -> Self {
        Self {
            tag_type,
            id: id.into(),
            historical_bytes: None,
            hi_layer_response: None,
        }
    }

    /// Set the historical bytes.
    pub fn with_historical_bytes(mut self, bytes: impl Into<String>) -> Self {
        self.historical_bytes = Some(bytes.into());
        self
    }

    /// Set the higher-layer response.
    pub fn with_hi_layer_response(mut self, bytes: impl Into<String>) -> Self {
        self.hi_layer_response = Some(bytes.into());
        self
    }
}
