// Merchant Portal - Core Library
// Registration status workflow plus the store, auth, and transport around it.
// Exposes all modules for use in the admin CLI, the API server, and tests.

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod store;
pub mod telemetry;
pub mod validation;
pub mod workflow;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use auth::{bearer_token, hash_token, register_portal_user, ActorResolver, SqliteActorResolver, StaticActorResolver};
pub use crate::config::PortalConfig;
pub use db::{count_merchants, open_database, setup_database, Event, SharedConnection, SqliteMerchantStore};
pub use entities::{
    Actor, ActorId, Merchant, MerchantId, MerchantType, MerchantView, NewMerchant, NumberOfEmployees,
    RegistrationStatus,
};
pub use store::{InMemoryMerchantStore, MerchantStore, StoreError};
pub use validation::{MerchantDraftRequest, SetStatusRequest, StatusChange, ValidationError};
pub use workflow::{AuthorizationFailure, RegistrationStatusWorkflow, WorkflowError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
