//! Core domain entities
//!
//! Pure data structures with validation logic - no I/O or external dependencies.

mod financial_inst;
pub mod result;
mod user;

pub use financial_inst::{
    AccountBalances, FiAccount, FiTransaction, FinancialInst, Institution, RemovedTransaction,
    TransactionSync,
};
pub use user::{FiKey, User};
