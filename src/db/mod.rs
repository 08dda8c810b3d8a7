//! Database module for CarbonTrail.
//!
//! Provides a SQLite-backed key-value store and the records kept in it.

pub mod keys;
mod models;
mod store;

pub use models::*;
pub use store::*;

#[cfg(test)]
pub(crate) fn temp_store() -> (tempfile::NamedTempFile, Store) {
    let tmp = tempfile::NamedTempFile::new().expect("temp file");
    let store = Store::new(tmp.path()).expect("open store");
    (tmp, store)
}
