//! Avail/Substrate chain primitives
//!
//! This module contains the loosely-typed structures the indexer receives and
//! the decoders that turn them into typed values:
//! - Raw block, extrinsic and event shapes from the data source
//! - Digest log SCALE decoding and author hints
//! - Versioned data-availability header extension
//! - Call/event metadata shapes

pub mod digest;
mod error;
pub mod extension;
pub mod metadata;
pub mod scale;
pub mod types;

pub use digest::{engine_to_string, resolve_author, DigestItem};
pub use error::DecodeError;
pub use extension::HeaderExtension;
pub use metadata::MethodMetadata;
pub use types::{arg_to_string, Phase, RawBlock, RawEvent, RawExtrinsic};
