//! Stand-in collaborators for the CLI.
//!
//! `UidDetector` reports the tag identifier as the identity and
//! `EnvelopeEncrypter` wraps identities in a timestamped envelope without
//! transforming them. Real deployments plug in their own implementations.

use super::{Detector, Encrypter};
use crate::adapter::NormalizedTag;
use crate::error::{PipelineError, PipelineResult};
use crate::types::hex::encode_hex;
use crate::types::{TagHandle, TagType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity reported by [`UidDetector`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedTag {
    pub handle: TagHandle,
    pub tag_type: TagType,
    /// Identifier as upper-case hex.
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_bytes: Option<String>,
}

/// Detects tags that report an identifier, optionally limited to a set of
/// technologies.
#[derive(Debug, Clone, Default)]
pub struct UidDetector {
    /// Accepted technologies. Empty accepts all.
    types: Vec<TagType>,
}

impl UidDetector {
    /// Only recognise tags of the given technologies.
    pub fn only(types: impl IntoIterator<Item = TagType>) -> Self {
        Self {
            types: types.into_iter().collect(),
        }
    }

    fn accepts(&self, tag_type: TagType) -> bool {
        self.types.is_empty() || self.types.contains(&tag_type)
    }
}

#[async_trait]
impl Detector for UidDetector {
    type Identity = DetectedTag;

    async fn detect(&self, tag: &NormalizedTag) -> PipelineResult<Option<DetectedTag>> {
        if !self.accepts(tag.tag_type()) {
            return Ok(None);
        }
        Ok(tag.identifier().map(|uid| DetectedTag {
            handle: tag.handle().clone(),
            tag_type: tag.tag_type(),
            uid: encode_hex(uid),
            at_bytes: tag.at_bytes().map(encode_hex),
        }))
    }
}

/// An identity wrapped for transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityEnvelope {
    /// Name of the scheme applied to `payload`.
    pub scheme: String,
    pub issued_at: DateTime<Utc>,
    /// JSON-encoded identity.
    pub payload: String,
}

/// Wraps serializable identities in an [`IdentityEnvelope`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeEncrypter;

impl EnvelopeEncrypter {
    pub const SCHEME: &'static str = "plain";
}

#[async_trait]
impl<I> Encrypter<I> for EnvelopeEncrypter
where
    I: Serialize + Send + Sync + 'static,
{
    type Output = IdentityEnvelope;

    async fn encrypt(&self, identity: I) -> PipelineResult<IdentityEnvelope> {
        let payload = serde_json::to_string(&identity)
            .map_err(|e| PipelineError::Encryption(e.to_string()))?;
        Ok(IdentityEnvelope {
            scheme: Self::SCHEME.to_string(),
            issued_at: Utc::now(),
            payload,
        })
    }
}
