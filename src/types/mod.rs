//! Core type definitions using newtype patterns for type safety.
//!
//! Raw tag descriptors as reported by the hardware, opaque per-tag handles,
//! and the hex decoding used to turn transport strings into bytes.

mod handle;
pub mod hex;
mod raw_tag;

pub use handle::{HandleFactory, TagHandle, UuidHandleFactory};
pub use raw_tag::{RawTag, TagType};
