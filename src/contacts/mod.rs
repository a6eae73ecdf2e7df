//! Contacts Module
//!
//! The contact domain: the record shape returned to clients, input
//! validation for new contacts, and the repository that runs contact
//! statements on pooled store connections.
//!
//! ```text
//! QuerySpec ──> QueryBuilder::select ──┐
//!                                      ├──> ContactRepository ──> ConnectionPool ──> Session
//! NewContact ─> QueryBuilder::insert ──┘            │
//!                                                   └──> ContactRecord::from_row
//! ```

pub mod record;
pub mod repository;

// Re-export commonly used types
pub use record::{ContactId, ContactRecord, CreateContactBody, NewContact};
pub use repository::ContactRepository;
