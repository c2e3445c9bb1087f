//! Data aggregation provider port
//!
//! Defines the interface for fetching the current state of a user's linked
//! institutions from an external aggregation service (Plaid, demo data).

use crate::domain::result::Result;
use crate::domain::{FinancialInst, User};

/// Financial data provider trait
///
/// Implementations are constructed with their configuration up front and
/// hold no per-user state. The FinanceInfoService uses this trait without
/// knowing which service sits behind it.
pub trait FinancialDataProvider: Send + Sync {
    /// Provider name (e.g., "plaid", "demo")
    fn name(&self) -> &str;

    /// Retrieve accounts and the transaction delta for every FI the user has linked
    ///
    /// Returns one `FinancialInst` per FI key. The whole call fails with
    /// `Error::Provider` if any institution cannot be retrieved. The user is
    /// read only; cursors are written back by the caller.
    fn retrieve_user_fis(&self, user: &User) -> Result<Vec<FinancialInst>>;
}
