//! Per-institution results returned by the aggregation provider

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Current state of one linked institution, as returned by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialInst {
    pub item_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution: Option<Institution>,
    #[serde(default)]
    pub accounts: Vec<FiAccount>,
    pub transaction_sync: TransactionSync,
}

/// Display details of a financial institution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Institution {
    pub institution_id: String,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Base64 encoded PNG
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub primary_color: Option<String>,
}

/// An account held at a linked institution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiAccount {
    pub account_id: String,
    pub name: String,
    #[serde(default)]
    pub official_name: Option<String>,
    #[serde(default)]
    pub mask: Option<String>,
    /// Plaid nomenclature: "depository", "credit", "loan", "investment", "other"
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub balances: AccountBalances,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountBalances {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub available: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub current: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub limit: Option<Decimal>,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
}

/// Delta of transactions since the cursor that was sent, plus the next cursor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionSync {
    #[serde(default)]
    pub added: Vec<FiTransaction>,
    #[serde(default)]
    pub modified: Vec<FiTransaction>,
    #[serde(default)]
    pub removed: Vec<RemovedTransaction>,
    /// Opaque position to resume from on the next sync
    pub next_cursor: String,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiTransaction {
    pub transaction_id: String,
    pub account_id: String,
    /// Positive values are money leaving the account
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub pending: bool,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedTransaction {
    pub transaction_id: String,
    #[serde(default)]
    pub account_id: Option<String>,
}

impl FinancialInst {
    /// Result with no accounts and no transaction changes
    pub fn new(item_id: impl Into<String>, next_cursor: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            institution: None,
            accounts: Vec::new(),
            transaction_sync: TransactionSync {
                next_cursor: next_cursor.into(),
                ..Default::default()
            },
        }
    }

    pub fn next_cursor(&self) -> &str {
        &self.transaction_sync.next_cursor
    }
}

impl TransactionSync {
    /// Fold the next page of a paginated sync into this one
    pub fn absorb_page(&mut self, page: TransactionSync) {
        self.added.extend(page.added);
        self.modified.extend(page.modified);
        self.removed.extend(page.removed);
        self.next_cursor = page.next_cursor;
        self.has_more = page.has_more;
    }

    /// Number of transaction changes carried by this sync
    pub fn change_count(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }
}
