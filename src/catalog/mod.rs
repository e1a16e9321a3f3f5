//! OpenMetadata catalog access
//!
//! A thin REST client plus the table lookup fallbacks and description
//! cleanup used by the catalog MCP adapter.

pub mod client;
pub mod lookup;
pub mod models;
pub mod text;

pub use client::{CatalogApi, CatalogError, OpenMetadataClient};
pub use lookup::{resolve_table, LookupAttempt, TableLookup, TableLookupError};
