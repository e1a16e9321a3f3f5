//! tokio-postgres implementation of [`Database`].
//!
//! One connection, opened on first use and reopened after it closes. The
//! connection driver runs on its own task.

use async_trait::async_trait;
use tokio::sync::{Mutex, MutexGuard};
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, info, warn};

use super::{
    ColumnInfo, Database, DatabaseError, QueryRows, ReadOnlyQuery, TableName, TableRef,
};
use crate::config::PostgresSettings;

const LIST_TABLES_SQL: &str = "\
    SELECT schemaname::text, tablename::text \
    FROM pg_tables \
    WHERE schemaname NOT IN ('pg_catalog', 'information_schema') \
    ORDER BY schemaname, tablename";

const TABLE_SCHEMA_SQL: &str = "\
    SELECT c.column_name::text, \
           c.data_type::text, \
           c.is_nullable::text, \
           c.column_default::text, \
           COALESCE(string_agg(DISTINCT tc.constraint_type::text, ','), '') \
    FROM information_schema.columns c \
    LEFT JOIN information_schema.key_column_usage k \
           ON k.table_schema = c.table_schema \
          AND k.table_name = c.table_name \
          AND k.column_name = c.column_name \
    LEFT JOIN information_schema.table_constraints tc \
           ON tc.constraint_schema = k.constraint_schema \
          AND tc.constraint_name = k.constraint_name \
    WHERE c.table_schema::text = $1::text \
      AND c.table_name::text = $2::text \
    GROUP BY c.column_name, c.data_type, c.is_nullable, c.column_default, c.ordinal_position \
    ORDER BY c.ordinal_position";

pub struct PostgresDatabase {
    settings: PostgresSettings,
    client: Mutex<Option<Client>>,
}

impl PostgresDatabase {
    pub fn new(settings: PostgresSettings) -> Self {
        Self {
            settings,
            client: Mutex::new(None),
        }
    }

    async fn open(&self) -> Result<Client, DatabaseError> {
        let url = self
            .settings
            .url
            .as_deref()
            .ok_or_else(|| DatabaseError::NotConfigured(self.settings.missing_vars()))?;

        let mut config: tokio_postgres::Config = url
            .parse()
            .map_err(|e: tokio_postgres::Error| DatabaseError::InvalidUrl(e.to_string()))?;
        config.connect_timeout(self.settings.connect_timeout);
        if config.get_application_name().is_none() {
            config.application_name("postgres-mcp");
        }

        let (client, connection) = config
            .connect(NoTls)
            .await
            .map_err(|e| DatabaseError::Connection(describe_error(&e)))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("PostgreSQL connection closed with error: {}", e);
            }
        });

        info!(
            "Connected to PostgreSQL at {}",
            self.settings.host_part().unwrap_or_default()
        );
        Ok(client)
    }

    /// Locked connection slot, connected.
    async fn connection(&self) -> Result<MutexGuard<'_, Option<Client>>, DatabaseError> {
        let mut slot = self.client.lock().await;
        if slot.as_ref().map_or(true, Client::is_closed) {
            if slot.is_some() {
                debug!("PostgreSQL connection was closed, reconnecting");
            }
            *slot = Some(self.open().await?);
        }
        Ok(slot)
    }

    async fn read_only(&self, sql: &str) -> Result<QueryRows, DatabaseError> {
        let mut slot = self.connection().await?;
        let client = connected(&mut slot)?;

        debug!("Executing read-only: {}", sql);
        let tx = client
            .build_transaction()
            .read_only(true)
            .start()
            .await
            .map_err(query_error)?;
        // Parsing as a prepared statement makes the server refuse more than
        // one command before anything runs
        tx.prepare(sql).await.map_err(query_error)?;
        let messages = tx.simple_query(sql).await.map_err(query_error)?;
        tx.rollback().await.map_err(query_error)?;

        Ok(collect_rows(messages))
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn connect(&self) -> Result<String, DatabaseError> {
        let mut slot = self.client.lock().await;
        *slot = Some(self.open().await?);
        let client = connected(&mut slot)?;

        let row = client
            .query_one("SELECT version()", &[])
            .await
            .map_err(query_error)?;
        row.try_get::<_, String>(0).map_err(query_error)
    }

    async fn list_tables(&self) -> Result<Vec<TableRef>, DatabaseError> {
        let mut slot = self.connection().await?;
        let client = connected(&mut slot)?;

        let rows = client
            .query(LIST_TABLES_SQL, &[])
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| {
                Ok(TableRef {
                    schema: row.try_get(0).map_err(query_error)?,
                    name: row.try_get(1).map_err(query_error)?,
                })
            })
            .collect()
    }

    async fn query_table(
        &self,
        table: &TableName,
        limit: u32,
        offset: u32,
    ) -> Result<QueryRows, DatabaseError> {
        // Safe to interpolate, TableName only admits identifier characters
        let sql = format!("SELECT * FROM {} LIMIT {} OFFSET {}", table, limit, offset);
        self.read_only(&sql).await
    }

    async fn execute_query(&self, query: &ReadOnlyQuery) -> Result<QueryRows, DatabaseError> {
        self.read_only(query.as_str()).await
    }

    async fn table_schema(&self, table: &TableName) -> Result<Vec<ColumnInfo>, DatabaseError> {
        let mut slot = self.connection().await?;
        let client = connected(&mut slot)?;

        let rows = client
            .query(TABLE_SCHEMA_SQL, &[&table.schema(), &table.table()])
            .await
            .map_err(query_error)?;

        if rows.is_empty() {
            return Err(DatabaseError::TableNotFound(format!(
                "{}.{}",
                table.schema(),
                table.table()
            )));
        }

        rows.iter()
            .map(|row| {
                let nullable: String = row.try_get(2).map_err(query_error)?;
                let constraints: String = row.try_get(4).map_err(query_error)?;
                let mut key_constraints: Vec<String> = constraints
                    .split(',')
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect();
                key_constraints.sort();
                Ok(ColumnInfo {
                    name: row.try_get(0).map_err(query_error)?,
                    data_type: row.try_get(1).map_err(query_error)?,
                    nullable: nullable.eq_ignore_ascii_case("YES"),
                    default: row.try_get(3).map_err(query_error)?,
                    key_constraints,
                })
            })
            .collect()
    }
}

fn connected<'a>(slot: &'a mut MutexGuard<'_, Option<Client>>) -> Result<&'a mut Client, DatabaseError> {
    slot.as_mut()
        .ok_or_else(|| DatabaseError::Connection("connection unavailable".to_string()))
}

fn collect_rows(messages: Vec<SimpleQueryMessage>) -> QueryRows {
    let mut result = QueryRows::default();
    for message in messages {
        if let SimpleQueryMessage::Row(row) = message {
            if result.columns.is_empty() {
                result.columns = row.columns().iter().map(|c| c.name().to_string()).collect();
            }
            result
                .rows
                .push((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect());
        }
    }
    result
}

fn query_error(e: tokio_postgres::Error) -> DatabaseError {
    DatabaseError::Query(describe_error(&e))
}

/// Server message with detail and hint when the error came from PostgreSQL.
fn describe_error(e: &tokio_postgres::Error) -> String {
    match e.as_db_error() {
        Some(db) => {
            let mut message = format!("{}: {}", db.severity(), db.message());
            if let Some(detail) = db.detail() {
                message.push_str(&format!("\nDETAIL: {}", detail));
            }
            if let Some(hint) = db.hint() {
                message.push_str(&format!("\nHINT: {}", hint));
            }
            message
        }
        None => e.to_string(),
    }
}
