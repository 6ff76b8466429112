#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from folio_admin for tests
pub use folio_admin::core::{
    auth::{AuthError, AuthProvider, MemoryAuth, UserIdentity},
    db::{
        Direction, Document, DocumentStore, DocumentWrite, Gateway, MemoryStore, Query,
        SqliteStore, StoreError, StoreResult, Subscription, Timestamp,
    },
};
