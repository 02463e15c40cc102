//! In-process context cache.
//!
//! Named tables of JSON entries, each fully reloaded on its own timer from a
//! [`TableLoader`]. Readers always see one complete snapshot; a failed load
//! keeps the previous one.

pub mod filter;
pub mod loader;
pub mod registry;
pub mod schema;
pub mod table;

pub use filter::EntryFilter;
pub use loader::{loader_fn, FnLoader, TableData, TableLoader};
pub use registry::{ContextRegistry, SharedRegistry};
pub use schema::{FieldType, TableSchema};
pub use table::{ContextTable, RefreshOutcome, TableInfo, TableSnapshot, TableSpec};
