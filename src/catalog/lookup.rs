//! Table resolution with fallbacks.
//!
//! A user rarely types a full `service.database.schema.table` name, so the
//! identifier is tried as an exact FQN, then under each configured prefix
//! (bare names only), and finally as an entity id.

use super::client::{CatalogApi, CatalogError};
use super::models::Table;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupMethod {
    Name,
    Id,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupAttempt {
    pub method: LookupMethod,
    pub identifier: String,
    /// `None` when the attempt succeeded
    pub error: Option<String>,
}

impl std::fmt::Display for LookupAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let method = match self.method {
            LookupMethod::Name => "name",
            LookupMethod::Id => "id",
        };
        match &self.error {
            None => write!(f, "by {} `{}`: found", method, self.identifier),
            Some(error) => write!(f, "by {} `{}`: {}", method, self.identifier, error),
        }
    }
}

#[derive(Debug)]
pub struct TableLookup {
    pub table: Table,
    pub attempts: Vec<LookupAttempt>,
}

#[derive(Debug)]
pub struct TableLookupError {
    /// Error of the last attempt, as the catalog reported it
    pub last_error: CatalogError,
    pub attempts: Vec<LookupAttempt>,
}

/// Candidate identifiers in the order they are tried.
pub fn candidates(identifier: &str, prefixes: &[String]) -> Vec<(LookupMethod, String)> {
    let mut out = vec![(LookupMethod::Name, identifier.to_string())];
    if !identifier.contains('.') {
        out.extend(
            prefixes
                .iter()
                .map(|prefix| (LookupMethod::Name, format!("{}.{}", prefix, identifier))),
        );
    }
    out.push((LookupMethod::Id, identifier.to_string()));
    out
}

pub async fn resolve_table(
    api: &dyn CatalogApi,
    identifier: &str,
    prefixes: &[String],
) -> Result<TableLookup, TableLookupError> {
    let mut attempts = Vec::new();
    let mut last_error = None;

    for (method, candidate) in candidates(identifier, prefixes) {
        let result = match method {
            LookupMethod::Name => api.get_table_by_name(&candidate).await,
            LookupMethod::Id => api.get_table_by_id(&candidate).await,
        };

        match result {
            Ok(table) => {
                attempts.push(LookupAttempt {
                    method,
                    identifier: candidate,
                    error: None,
                });
                return Ok(TableLookup { table, attempts });
            }
            Err(e) => {
                attempts.push(LookupAttempt {
                    method,
                    identifier: candidate,
                    error: Some(e.service_message()),
                });
                // Transport and configuration problems will not improve
                // with another candidate
                let retryable = matches!(e, CatalogError::Api { .. });
                last_error = Some(e);
                if !retryable {
                    break;
                }
            }
        }
    }

    Err(TableLookupError {
        last_error: last_error.unwrap_or_else(|| CatalogError::Api {
            status: 404,
            message: format!("Table {} not found", identifier),
        }),
        attempts,
    })
}
