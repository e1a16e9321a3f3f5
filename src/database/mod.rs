//! PostgreSQL access for the database MCP adapter.

pub mod postgres;
pub mod sql;
pub mod table;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use postgres::PostgresDatabase;
pub use sql::{ReadOnlyQuery, TableName};
pub use table::QueryRows;

pub const DEFAULT_QUERY_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database is not configured, missing: {}", .0.join(", "))]
    NotConfigured(Vec<&'static str>),

    #[error("Invalid connection string: {0}")]
    InvalidUrl(String),

    #[error("Could not connect to PostgreSQL: {0}")]
    Connection(String),

    /// Server-side failure, message as PostgreSQL reported it
    #[error("{0}")]
    Query(String),

    #[error("Invalid table name {0:?}: use letters, digits, `_` and an optional `schema.` prefix")]
    InvalidTableName(String),

    #[error("Only a single SELECT statement is allowed ({0})")]
    NotReadOnly(String),

    #[error("Table {0} not found")]
    TableNotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    /// `PRIMARY KEY`, `FOREIGN KEY`, `UNIQUE`
    pub key_constraints: Vec<String>,
}

/// Operations the database adapter exposes. Every statement that touches
/// user data runs in a read-only transaction.
#[async_trait]
pub trait Database: Send + Sync {
    /// Drop any open connection, connect again and return `SELECT version()`.
    async fn connect(&self) -> Result<String, DatabaseError>;

    async fn list_tables(&self) -> Result<Vec<TableRef>, DatabaseError>;

    async fn query_table(
        &self,
        table: &TableName,
        limit: u32,
        offset: u32,
    ) -> Result<QueryRows, DatabaseError>;

    async fn execute_query(&self, query: &ReadOnlyQuery) -> Result<QueryRows, DatabaseError>;

    async fn table_schema(&self, table: &TableName) -> Result<Vec<ColumnInfo>, DatabaseError>;
}
