//! rollcall-store — JSON document store with whole-collection replace
//! semantics: `load` reads everything, `save` atomically replaces
//! everything. No partial updates, no migrations.

mod store;

pub use store::{Collection, DocumentStore, StoreError};
