//! Provenance-keyed result cache.
//!
//! A cached payload is served only when the fingerprint recorded next to it
//! matches the fingerprint of the current call. Fingerprints cover the call
//! parameters and the modification times of upstream files, not their
//! content: touching an input invalidates the entry, while rewriting an input
//! in place with its old timestamp does not.

mod fingerprint;
mod store;

pub use fingerprint::{file_mtime, Fingerprint, FingerprintBuilder};
pub use store::CacheStore;
