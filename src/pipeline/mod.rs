//! Detection pipeline.
//!
//! Detection and encryption are external collaborators reached through the
//! [`Detector`] and [`Encrypter`] traits. The identities they produce are
//! opaque here: the scan loop passes them along without looking inside.

mod builtin;

pub use builtin::{DetectedTag, EnvelopeEncrypter, IdentityEnvelope, UidDetector};

use crate::adapter::NormalizedTag;
use crate::error::PipelineResult;
use async_trait::async_trait;

/// Recognises an identity on a normalized tag.
#[async_trait]
pub trait Detector: Send + Sync + 'static {
    /// Identity produced on a successful detection.
    type Identity: Send + 'static;

    /// Inspect the tag. `Ok(None)` means the tag is present but not one this
    /// detector recognises.
    async fn detect(&self, tag: &NormalizedTag) -> PipelineResult<Option<Self::Identity>>;
}

/// Transforms a detected identity into its transmittable form.
#[async_trait]
pub trait Encrypter<I: Send + 'static>: Send + Sync + 'static {
    /// Encrypted identity published to subscribers.
    type Output: Clone + Send + Sync + 'static;

    async fn encrypt(&self, identity: I) -> PipelineResult<Self::Output>;
}

/// Output type of a pipeline's encrypter.
pub type Encrypted<D, E> = <E as Encrypter<<D as Detector>::Identity>>::Output;

/// A detector paired with the encrypter for its identities.
#[derive(Debug, Clone)]
pub struct DetectionPipeline<D, E> {
    detector: D,
    encrypter: E,
}

impl<D, E> DetectionPipeline<D, E>
where
    D: Detector,
    E: Encrypter<D::Identity>,
{
    /// Create a new pipeline.
    pub fn new(detector: D, encrypter: E) -> Self {
        Self {
            detector,
            encrypter,
        }
    }

    /// Run the detector alone.
    pub async fn detect(&self, tag: &NormalizedTag) -> PipelineResult<Option<D::Identity>> {
        self.detector.detect(tag).await
    }

    /// Run the encrypter alone.
    pub async fn encrypt(&self, identity: D::Identity) -> PipelineResult<Encrypted<D, E>> {
        self.encrypter.encrypt(identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::normalize;
    use crate::error::PipelineError;
    use crate::transport::ScriptedTransport;
    use crate::types::{RawTag, TagHandle, TagType};
    use std::sync::Arc;

    struct Reverse;

    #[async_trait]
    impl Encrypter<DetectedTag> for Reverse {
        type Output = String;

        async fn encrypt(&self, identity: DetectedTag) -> PipelineResult<String> {
            Ok(identity.uid.chars().rev().collect())
        }
    }

    struct Refuse;

    #[async_trait]
    impl Encrypter<DetectedTag> for Refuse {
        type Output = String;

        async fn encrypt(&self, _identity: DetectedTag) -> PipelineResult<String> {
            Err(PipelineError::Encryption("no key".into()))
        }
    }

    fn tag(tag_type: TagType, id: &str) -> NormalizedTag {
        normalize(
            RawTag::new(tag_type, id),
            TagHandle::new("h"),
            Arc::new(ScriptedTransport::new(Vec::new())),
        )
    }

    #[tokio::test]
    async fn test_detect_then_encrypt() {
        let pipeline = DetectionPipeline::new(UidDetector::default(), Reverse);
        let identity = pipeline
            .detect(&tag(TagType::IsoDep, "0A0B"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pipeline.encrypt(identity).await.unwrap(), "B0A0");
    }

    #[tokio::test]
    async fn test_unknown_tag_detects_nothing() {
        let pipeline = DetectionPipeline::new(UidDetector::default(), Refuse);
        assert!(pipeline
            .detect(&tag(TagType::Unknown, "0A0B"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_encrypter_failure_propagates() {
        let pipeline = DetectionPipeline::new(UidDetector::default(), Refuse);
        let identity = pipeline
            .detect(&tag(TagType::IsoDep, "0A0B"))
            .await
            .unwrap()
            .unwrap();
        let err = pipeline.encrypt(identity).await.unwrap_err();
        assert!(matches!(err, PipelineError::Encryption(_)));
    }
}
