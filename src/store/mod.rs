//! Persistence layer: backend-agnostic `MessageStore` trait plus the
//! libSQL implementation and its migrations.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use traits::{
    ActionItemFilter, ActionItemPatch, MessageFilter, MessageSort, MessageStatus, MessageStore,
    SortOrder, StoredActionItem, StoredMessage,
};
