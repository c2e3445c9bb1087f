//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the UserStore port
//! - Plaid HTTP client for FinancialDataProvider
//! - Demo data provider for demo mode and testing

pub mod demo;
pub mod duckdb;
pub mod plaid;

#[cfg(test)]
pub mod plaid_mock;
