//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod data_provider;
mod user_store;

pub use data_provider::FinancialDataProvider;
pub use user_store::UserStore;
