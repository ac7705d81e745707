//! Tenant-isolated retrieval over the vector index.
//!
//! - `IsolationScope`: resolves user / session / document precedence into a filter
//! - `RetrievalService`: store, search, and delete-by-scope

mod scope;
mod service;
mod types;

pub use scope::{vector_id, IsolationScope, ScopeNarrowing, UNKNOWN_DOCUMENT_TYPE};
pub use service::RetrievalService;
pub use types::{ChunkRecord, ChunkSearchResult, DeleteResult, SearchRequest, StoreResult};
