//! Raw tag normalization.
//!
//! Turns what the transport reported into the [`NormalizedTag`] that
//! detectors consume: a fresh handle, decoded identifier bytes, lazily
//! decoded answer-to-select bytes, and a way to keep talking to the tag.

use crate::error::TransportResult;
use crate::transport::TagTransport;
use crate::types::hex::{decode_colon_hex, decode_hex_id};
use crate::types::{RawTag, TagHandle, TagType};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A tag in the shape detectors expect.
pub struct NormalizedTag {
    handle: TagHandle,
    tag_type: TagType,
    identifier: Option<Vec<u8>>,
    historical_bytes: Option<String>,
    hi_layer_response: Option<String>,
    at_bytes: OnceLock<Option<Vec<u8>>>,
    transport: Arc<dyn TagTransport>,
}

/// Normalize a freshly acquired tag.
///
/// The identifier is decoded only for tags whose type the hardware
/// recognised. Answer-to-select bytes are decoded on first access.
pub fn normalize(raw: RawTag, handle: TagHandle, transport: Arc<dyn TagTransport>) -> NormalizedTag {
    let identifier = if raw.tag_type.is_known() {
        decode_hex_id(&raw.id)
    } else {
        None
    };

    NormalizedTag {
        handle,
        tag_type: raw.tag_type,
        identifier,
        historical_bytes: raw.historical_bytes,
        hi_layer_response: raw.hi_layer_response,
        at_bytes: OnceLock::new(),
        transport,
    }
}

impl NormalizedTag {
    /// Handle minted for this acquisition.
    pub fn handle(&self) -> &TagHandle {
        &self.handle
    }

    /// Technology reported by the hardware.
    pub fn tag_type(&self) -> TagType {
        self.tag_type
    }

    /// Identifier bytes, absent for unknown tag types.
    pub fn identifier(&self) -> Option<&[u8]> {
        self.identifier.as_deref()
    }

    /// Answer-to-select bytes.
    ///
    /// Historical bytes win over the higher-layer response whenever both are
    /// reported. Returns `None` if neither is present or the chosen field
    /// contains a token that is not valid hex.
    pub fn at_bytes(&self) -> Option<&[u8]> {
        self.at_bytes
            .get_or_init(|| {
                self.historical_bytes
                    .as_deref()
                    .or(self.hi_layer_response.as_deref())
                    .and_then(decode_colon_hex)
            })
            .as_deref()
    }

    /// Send raw bytes to the tag over the still-open session.
    pub async fn transceive(&self, command: &[u8]) -> TransportResult<Vec<u8>> {
        self.transport.transceive(command).await
    }
}

impl fmt::Debug for NormalizedTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedTag")
            .field("handle", &self.handle)
            .field("tag_type", &self.tag_type)
            .field("identifier", &self.identifier)
            .field("historical_bytes", &self.historical_bytes)
            .field("hi_layer_response", &self.hi_layer_response)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{PollStep, ScriptedTransport};
    use std::time::Duration;

    fn transport() -> Arc<dyn TagTransport> {
        Arc::new(ScriptedTransport::new(Vec::new()))
    }

    fn normalize_raw(raw: RawTag) -> NormalizedTag {
        normalize(raw, TagHandle::new("handle-1"), transport())
    }

    #[test]
    fn test_unknown_type_has_no_identifier() {
        let tag = normalize_raw(RawTag::new(TagType::Unknown, "04A1B2C3"));
        assert!(tag.identifier().is_none());

        let tag = normalize_raw(RawTag::new(TagType::Iso14443A, "04A1B2C3"));
        assert_eq!(tag.identifier(), Some(&[0x04, 0xA1, 0xB2, 0xC3][..]));
    }

    #[test]
    fn test_malformed_identifier_is_none() {
        let tag = normalize_raw(RawTag::new(TagType::IsoDep, "04A1Q"));
        assert!(tag.identifier().is_none());
    }

    #[test]
    fn test_at_bytes_decoded() {
        let tag = normalize_raw(RawTag::new(TagType::IsoDep, "01").with_historical_bytes("04:1A:2B"));
        assert_eq!(tag.at_bytes(), Some(&[0x04, 0x1A, 0x2B][..]));
    }

    #[test]
    fn test_at_bytes_fail_closed() {
        let tag = normalize_raw(RawTag::new(TagType::IsoDep, "01").with_historical_bytes("04:GG:1A"));
        assert!(tag.at_bytes().is_none());

        let tag = normalize_raw(RawTag::new(TagType::Iso14443B, "01").with_hi_layer_response("zz"));
        assert!(tag.at_bytes().is_none());
    }

    #[test]
    fn test_historical_bytes_preferred() {
        let tag = normalize_raw(
            RawTag::new(TagType::IsoDep, "01")
                .with_historical_bytes("80:73")
                .with_hi_layer_response("00:11"),
        );
        assert_eq!(tag.at_bytes(), Some(&[0x80, 0x73][..]));

        // Preference holds even when the preferred field is malformed.
        let tag = normalize_raw(
            RawTag::new(TagType::IsoDep, "01")
                .with_historical_bytes("80:XY")
                .with_hi_layer_response("00:11"),
        );
        assert!(tag.at_bytes().is_none());

        let tag = normalize_raw(
            RawTag::new(TagType::IsoDep, "01")
                .with_historical_bytes("")
                .with_hi_layer_response("00:11"),
        );
        assert!(tag.at_bytes().is_none());
    }

    #[test]
    fn test_hi_layer_response_fallback() {
        let tag = normalize_raw(RawTag::new(TagType::Iso14443B, "01").with_hi_layer_response("00:11"));
        assert_eq!(tag.at_bytes(), Some(&[0x00, 0x11][..]));

        let tag = normalize_raw(RawTag::new(TagType::Iso14443B, "01"));
        assert!(tag.at_bytes().is_none());
    }

    #[test]
    fn test_handle_and_type_carried() {
        let tag = normalize_raw(RawTag::new(TagType::Felica, "0102"));
        assert_eq!(tag.handle().as_str(), "handle-1");
        assert_eq!(tag.tag_type(), TagType::Felica);
    }

    #[tokio::test]
    async fn test_transceive_delegates_to_transport() {
        let scripted = Arc::new(ScriptedTransport::new([PollStep::Tag(RawTag::new(
            TagType::IsoDep,
            "01",
        ))]));
        scripted.push_response(vec![0x90, 0x00]);
        let raw = scripted.poll(Duration::from_millis(5)).await.unwrap();

        let transport: Arc<dyn TagTransport> = scripted.clone();
        let tag = normalize(raw, TagHandle::new("h"), transport);
        assert_eq!(tag.transceive(&[0x00, 0xB0]).await.unwrap(), vec![0x90, 0x00]);
        assert_eq!(scripted.exchanges(), vec![vec![0x00, 0xB0]]);
    }
}
