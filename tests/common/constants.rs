//! Constants shared by the fake servers and the tests.

// ============================================================================
// OpenMetadata
// ============================================================================

pub const OM_VERSION: &str = "1.4.1";

/// Token accepted by the fake when JWT auth is used
pub const OM_JWT_TOKEN: &str = "test-jwt-token";

pub const OM_USERNAME: &str = "admin@open-metadata.org";
pub const OM_PASSWORD: &str = "admin-password";

/// Token handed out by the fake login endpoint
pub const OM_SESSION_TOKEN: &str = "session-token-1";

pub const ORDERS_ID: &str = "8f2c0b5e-5d3a-4c59-9a0e-1f4b3c2d1a00";
pub const ORDERS_FQN: &str = "sample_data.ecommerce_db.shopify.orders";
pub const CUSTOMERS_ID: &str = "0b7e4f7a-2c1d-4e8b-8f3a-9d6c5b4a3e21";
pub const CUSTOMERS_FQN: &str = "sample_data.ecommerce_db.shopify.customers";

/// Prefix under which bare table names resolve in the fake catalog
pub const OM_FQN_PREFIX: &str = "sample_data.ecommerce_db.shopify";

// ============================================================================
// Azure OpenAI
// ============================================================================

pub const AZURE_API_KEY: &str = "test-azure-key";
pub const AZURE_DEPLOYMENT: &str = "gpt-4o-test";
pub const AZURE_API_VERSION: &str = "2024-02-01";
