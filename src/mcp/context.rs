//! Tool Context
//!
//! Per-adapter state handed to every tool and resource handler. Cloned per
//! call, so everything lives behind an `Arc`.

use std::sync::Arc;

use crate::catalog::CatalogApi;
use crate::config::{CatalogSettings, EnvSnapshot, PostgresSettings};
use crate::database::Database;

#[derive(Clone)]
pub struct CatalogContext {
    pub env: Arc<EnvSnapshot>,
    pub settings: Arc<CatalogSettings>,
    pub catalog: Arc<dyn CatalogApi>,
}

#[derive(Clone)]
pub struct PostgresContext {
    pub env: Arc<EnvSnapshot>,
    pub settings: Arc<PostgresSettings>,
    pub database: Arc<dyn Database>,
}
