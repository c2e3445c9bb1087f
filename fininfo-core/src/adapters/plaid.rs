//! Plaid API client
//!
//! Handles communication with the Plaid API for account and transaction sync.
//! For each linked item the client resolves the institution, lists accounts
//! and pages through `/transactions/sync` from the item's stored cursor.
//!
//! API Documentation: https://plaid.com/docs/api/

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::blocking::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::PlaidSettings;
use crate::domain::result::{Error as DomainError, Result as DomainResult};
use crate::domain::{
    FiAccount, FiKey, FiTransaction, FinancialInst, Institution, RemovedTransaction,
    TransactionSync, User,
};
use crate::ports::FinancialDataProvider;

/// Request timeout for every Plaid call
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Upper bound Plaid accepts for `count` on /transactions/sync
const MAX_SYNC_PAGE_SIZE: u32 = 500;

/// Error codes that mean the credentials were rejected
const AUTH_ERROR_CODES: &[&str] = &[
    "INVALID_API_KEYS",
    "INVALID_ACCESS_TOKEN",
    "ITEM_LOGIN_REQUIRED",
    "INVALID_CREDENTIALS",
    "UNAUTHORIZED_ENVIRONMENT",
];

// =============================================================================
// API Request/Response Models (matching the Plaid API)
// =============================================================================

#[derive(Debug, Serialize)]
struct AccessTokenRequest<'a> {
    access_token: &'a str,
}

#[derive(Debug, Serialize)]
struct InstitutionRequest<'a> {
    institution_id: &'a str,
    country_codes: &'a [String],
    options: InstitutionOptions,
}

#[derive(Debug, Serialize)]
struct InstitutionOptions {
    include_optional_metadata: bool,
}

#[derive(Debug, Serialize)]
struct SyncRequest<'a> {
    access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cursor: Option<&'a str>,
    count: u32,
}

#[derive(Debug, Deserialize)]
struct ItemResponse {
    item: PlaidItem,
}

/// Plaid item (one login at one institution)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaidItem {
    pub item_id: String,
    #[serde(default)]
    pub institution_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstitutionResponse {
    institution: Institution,
}

#[derive(Debug, Deserialize)]
struct AccountsResponse {
    accounts: Vec<FiAccount>,
}

#[derive(Debug, Deserialize)]
struct SyncResponse {
    #[serde(default)]
    added: Vec<PlaidTransaction>,
    #[serde(default)]
    modified: Vec<PlaidTransaction>,
    #[serde(default)]
    removed: Vec<RemovedTransaction>,
    next_cursor: String,
    #[serde(default)]
    has_more: bool,
}

/// Plaid transaction from API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaidTransaction {
    pub transaction_id: String,
    pub account_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
    #[serde(default)]
    pub unofficial_currency_code: Option<String>,
    pub date: NaiveDate,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub pending: bool,
    /// Legacy category hierarchy, most general first
    #[serde(default)]
    pub category: Option<Vec<String>>,
    #[serde(default)]
    pub personal_finance_category: Option<PersonalFinanceCategory>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PersonalFinanceCategory {
    pub primary: String,
    #[serde(default)]
    pub detailed: Option<String>,
}

/// Error body returned with non-200 responses
#[derive(Debug, Deserialize)]
struct PlaidErrorBody {
    #[serde(default)]
    error_type: String,
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    error_message: String,
}

// =============================================================================
// Plaid HTTP Client
// =============================================================================

/// Plaid API client
#[derive(Debug)]
pub struct PlaidClient {
    client: Client,
    base_url: String,
    client_id: String,
    secret: String,
    country_codes: Vec<String>,
    sync_page_size: u32,
}

impl PlaidClient {
    /// Create a client from loaded settings
    pub fn from_settings(settings: &PlaidSettings) -> Result<Self> {
        let client_id = settings
            .client_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .context("Plaid clientId is not configured (set PLAID_CLIENT_ID or plaid.clientId)")?;
        let secret = settings
            .secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .context("Plaid secret is not configured (set PLAID_SECRET or plaid.secret)")?;

        let mut client = Self::new_with_base_url(client_id, secret, &settings.base_url())?;
        client.country_codes = settings.country_codes.clone();
        client.sync_page_size = settings.sync_page_size.clamp(1, MAX_SYNC_PAGE_SIZE);
        Ok(client)
    }

    /// Create a client against an explicit base URL
    ///
    /// Plain HTTP is only accepted for loopback hosts (mock servers).
    pub fn new_with_base_url(client_id: &str, secret: &str, base_url: &str) -> Result<Self> {
        if client_id.is_empty() || secret.is_empty() {
            anyhow::bail!("Plaid client id and secret cannot be empty");
        }

        let parsed = Url::parse(base_url).context("Invalid Plaid base URL")?;
        let host = parsed.host_str().unwrap_or("");
        let loopback = host == "localhost" || host == "127.0.0.1";
        if parsed.scheme() != "https" && !(parsed.scheme() == "http" && loopback) {
            anyhow::bail!("Plaid base URL must use HTTPS");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            secret: secret.to_string(),
            country_codes: vec!["US".to_string()],
            sync_page_size: 100,
        })
    }

    /// POST a JSON body and decode the JSON response
    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .header("PLAID-CLIENT-ID", &self.client_id)
            .header("PLAID-SECRET", &self.secret)
            .json(body)
            .send()
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().unwrap_or_default();
            return Err(error_from_response(status, &body));
        }

        response
            .json()
            .with_context(|| format!("Failed to parse Plaid {} response", path))
    }

    /// Look up the item behind an access token
    pub fn get_item(&self, access_token: &str) -> Result<PlaidItem> {
        let response: ItemResponse =
            self.post("/item/get", &AccessTokenRequest { access_token })?;
        Ok(response.item)
    }

    /// Institution display details
    pub fn get_institution(&self, institution_id: &str) -> Result<Institution> {
        let response: InstitutionResponse = self.post(
            "/institutions/get_by_id",
            &InstitutionRequest {
                institution_id,
                country_codes: &self.country_codes,
                options: InstitutionOptions {
                    include_optional_metadata: true,
                },
            },
        )?;
        Ok(response.institution)
    }

    /// Accounts and balances for an item
    pub fn get_accounts(&self, access_token: &str) -> Result<Vec<FiAccount>> {
        let response: AccountsResponse =
            self.post("/accounts/get", &AccessTokenRequest { access_token })?;
        Ok(response.accounts)
    }

    /// Page through /transactions/sync starting at `cursor`
    ///
    /// All pages are folded into one `TransactionSync`; its `next_cursor` is
    /// the cursor of the last page.
    pub fn sync_transactions(
        &self,
        access_token: &str,
        cursor: Option<&str>,
    ) -> Result<TransactionSync> {
        let mut sync = TransactionSync {
            next_cursor: cursor.unwrap_or_default().to_string(),
            has_more: true,
            ..Default::default()
        };

        while sync.has_more {
            let request_cursor = Some(sync.next_cursor.as_str()).filter(|c| !c.is_empty());
            let page: SyncResponse = self.post(
                "/transactions/sync",
                &SyncRequest {
                    access_token,
                    cursor: request_cursor,
                    count: self.sync_page_size,
                },
            )?;

            if page.has_more && page.next_cursor == sync.next_cursor {
                anyhow::bail!(
                    "Plaid transactions sync stopped advancing at cursor '{}'",
                    sync.next_cursor
                );
            }

            sync.absorb_page(TransactionSync {
                added: page.added.iter().map(map_transaction).collect(),
                modified: page.modified.iter().map(map_transaction).collect(),
                removed: page.removed,
                next_cursor: page.next_cursor,
                has_more: page.has_more,
            });
        }

        Ok(sync)
    }

    /// Current state of one linked FI
    pub fn retrieve_fi(&self, key: &FiKey) -> Result<FinancialInst> {
        let item = self.get_item(&key.access_token)?;

        let institution_id = item.institution_id.or_else(|| key.institution_id.clone());
        let institution = match institution_id {
            Some(id) => Some(self.get_institution(&id)?),
            None => None,
        };

        let accounts = self.get_accounts(&key.access_token)?;
        let transaction_sync = self.sync_transactions(&key.access_token, key.sync_cursor())?;

        Ok(FinancialInst {
            item_id: key.item_id.clone(),
            institution,
            accounts,
            transaction_sync,
        })
    }

    /// Map request errors to user-friendly messages
    fn map_request_error(&self, error: reqwest::Error) -> anyhow::Error {
        if error.is_timeout() {
            anyhow::anyhow!("Connection timed out after {} seconds", REQUEST_TIMEOUT_SECS)
        } else if error.is_connect() {
            anyhow::anyhow!("Unable to connect to Plaid servers")
        } else {
            anyhow::anyhow!("Plaid request failed: {}", error)
        }
    }
}

/// Map a Plaid transaction to the domain shape
fn map_transaction(tx: &PlaidTransaction) -> FiTransaction {
    // Prefer the personal finance category, fall back to the most specific legacy one
    let category = tx
        .personal_finance_category
        .as_ref()
        .map(|c| c.primary.clone())
        .or_else(|| tx.category.as_ref().and_then(|c| c.last().cloned()));

    FiTransaction {
        transaction_id: tx.transaction_id.clone(),
        account_id: tx.account_id.clone(),
        amount: tx.amount,
        iso_currency_code: tx
            .iso_currency_code
            .clone()
            .or_else(|| tx.unofficial_currency_code.clone()),
        date: tx.date,
        name: tx.name.clone(),
        merchant_name: tx.merchant_name.clone(),
        pending: tx.pending,
        category,
    }
}

/// Turn a non-200 response into a readable error
fn error_from_response(status: u16, body: &str) -> anyhow::Error {
    let parsed: Option<PlaidErrorBody> = serde_json::from_str(body).ok();

    match parsed {
        Some(err) if status == 429 || err.error_type == "RATE_LIMIT_EXCEEDED" => anyhow::anyhow!(
            "Plaid rate limit exceeded ({}). Please wait a moment and try again.",
            err.error_code
        ),
        Some(err) if AUTH_ERROR_CODES.contains(&err.error_code.as_str()) => anyhow::anyhow!(
            "Plaid authentication failed ({}): {}",
            err.error_code,
            err.error_message
        ),
        Some(err) => anyhow::anyhow!(
            "Plaid API error: HTTP {} {}/{}: {}",
            status,
            err.error_type,
            err.error_code,
            err.error_message
        ),
        None if status == 429 => {
            anyhow::anyhow!("Plaid rate limit exceeded. Please wait a moment and try again.")
        }
        None if status == 401 => anyhow::anyhow!("Plaid authentication failed."),
        None => anyhow::anyhow!("Plaid API error: HTTP {}", status),
    }
}

// =============================================================================
// PlaidProvider - implements FinancialDataProvider trait
// =============================================================================

/// Plaid data provider
pub struct PlaidProvider {
    client: PlaidClient,
}

impl PlaidProvider {
    pub fn new(client: PlaidClient) -> Self {
        Self { client }
    }

    /// Build the provider from loaded settings
    pub fn from_settings(settings: &PlaidSettings) -> DomainResult<Self> {
        let client =
            PlaidClient::from_settings(settings).map_err(|e| DomainError::Config(e.to_string()))?;
        Ok(Self::new(client))
    }
}

impl FinancialDataProvider for PlaidProvider {
    fn name(&self) -> &str {
        "plaid"
    }

    fn retrieve_user_fis(&self, user: &User) -> DomainResult<Vec<FinancialInst>> {
        user.fi_keys
            .iter()
            .map(|key| {
                self.client.retrieve_fi(key).map_err(|e| {
                    DomainError::Provider(format!("{} (item {})", e, key.item_id))
                })
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
