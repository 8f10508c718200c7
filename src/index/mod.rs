//! Index definitions, fingerprints, documents, and versioned instances.

pub mod definition;
pub mod document;
pub mod fingerprint_store;
pub mod registry;
pub mod versioned;

pub use definition::{canonical_json, IndexDefinition};
pub use document::{build_document, clamp_date};
pub use fingerprint_store::{FileFingerprintStore, FingerprintStore, MemoryFingerprintStore};
pub use registry::IndexRegistry;
pub use versioned::{parse_versioned_name, versioned_name, VersionedIndex};
