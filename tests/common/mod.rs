//! Shared test infrastructure
//!
//! Fake OpenMetadata and Azure OpenAI HTTP servers bound to random local
//! ports, plus helpers to launch the real adapter binaries through the MCP
//! client. Tests should only import from this module.
//!
//! ```no_run
//! mod common;
//! use common::{FakeOpenMetadata, FakeCatalogAuth};
//!
//! #[tokio::test]
//! async fn test_list() {
//!     let catalog = FakeOpenMetadata::spawn(FakeCatalogAuth::Jwt).await;
//!     let client = common::start_catalog_adapter(&catalog).await;
//! }
//! ```

#![allow(dead_code)]

mod adapters;
mod constants;
mod fake_azure;
mod fake_openmetadata;

pub use adapters::{start_adapter, start_catalog_adapter, start_postgres_adapter, tool_text};
pub use constants::*;
pub use fake_azure::FakeAzure;
pub use fake_openmetadata::{FakeCatalogAuth, FakeOpenMetadata};
