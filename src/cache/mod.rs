//! Catalog persistence
//!
//! The catalog written at the end of one run is the cache read at the start
//! of the next. Reads degrade to an empty cache; writes replace the whole file.

mod store;

pub use store::{CatalogStore, StoreError};
