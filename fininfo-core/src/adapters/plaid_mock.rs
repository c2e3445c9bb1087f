//! Mock Plaid API server for testing
//!
//! This module provides a mock HTTP server that simulates the Plaid API,
//! allowing for comprehensive testing without Plaid credentials.
//!
//! The mock server implements the same response structure as the real API:
//! - POST /item/get returns { item: { item_id, institution_id } }
//! - POST /institutions/get_by_id returns { institution: { ... } }
//! - POST /accounts/get returns { accounts: [...] }
//! - POST /transactions/sync returns { added, modified, removed, next_cursor, has_more }
//!
//! Access tokens look like `access-sandbox-{item_id}`; sync cursors look like
//! `cursor-{item_id}-{page}`.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};

/// Prefix of every access token the mock accepts
pub const ACCESS_TOKEN_PREFIX: &str = "access-sandbox-";

/// Mock Plaid server for testing
pub struct MockPlaidServer {
    port: u16,
    running: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

/// Configuration for mock data generation
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Number of accounts per item
    pub accounts_per_item: usize,
    /// Number of /transactions/sync pages available from an empty cursor
    pub pages_per_item: usize,
    /// Number of added transactions per page
    pub transactions_per_page: usize,
    /// Whether to simulate INVALID_API_KEYS
    pub fail_auth: bool,
    /// Whether to simulate rate limiting
    pub rate_limit: bool,
    /// Items that answer with ITEM_LOGIN_REQUIRED
    pub login_required_items: Vec<String>,
    /// Items whose sync keeps reporting more pages without moving the cursor
    pub stalled_items: Vec<String>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            accounts_per_item: 2,
            pages_per_item: 2,
            transactions_per_page: 5,
            fail_auth: false,
            rate_limit: false,
            login_required_items: Vec::new(),
            stalled_items: Vec::new(),
        }
    }
}

/// Access token the mock maps back to `item_id`
pub fn access_token_for(item_id: &str) -> String {
    format!("{}{}", ACCESS_TOKEN_PREFIX, item_id)
}

/// Cursor the mock hands out after `page` pages of `item_id`
pub fn cursor_for(item_id: &str, page: usize) -> String {
    format!("cursor-{}-{}", item_id, page)
}

impl MockPlaidServer {
    /// Start a new mock server on a random available port
    pub fn start(config: MockConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let requests = Arc::new(AtomicUsize::new(0));
        let running_clone = running.clone();
        let requests_clone = requests.clone();

        // Set listener to non-blocking for graceful shutdown
        listener.set_nonblocking(true)?;

        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let cfg = config.clone();
                        let counter = requests_clone.clone();
                        thread::spawn(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                            handle_connection(stream, &cfg);
                        });
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(std::time::Duration::from_millis(10));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            requests,
            thread_handle: Some(thread_handle),
        })
    }

    /// Get the base URL for this mock server
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockPlaidServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read one HTTP request, honouring Content-Length for the body
fn read_request(stream: &mut TcpStream) -> Option<(String, String)> {
    let _ = stream.set_nonblocking(false);
    let mut data = Vec::new();
    let mut buffer = [0; 4096];

    loop {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buffer[..n]);

        let text = String::from_utf8_lossy(&data).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let head = text[..header_end].to_string();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);

            let body_start = header_end + 4;
            if data.len() >= body_start + content_length {
                let body =
                    String::from_utf8_lossy(&data[body_start..body_start + content_length]);
                return Some((head, body.to_string()));
            }
        }
    }
}

fn handle_connection(mut stream: TcpStream, config: &MockConfig) {
    let Some((head, body)) = read_request(&mut stream) else {
        return;
    };

    let first_line = head.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        send_error(&mut stream, 400, "INVALID_REQUEST", "MISSING_FIELDS", "Invalid request");
        return;
    }
    let (method, path) = (parts[0], parts[1]);

    let head_lower = head.to_lowercase();
    let has_valid_auth =
        head_lower.contains("plaid-client-id: test_") && head_lower.contains("plaid-secret: test_");

    if config.fail_auth || !has_valid_auth {
        send_error(
            &mut stream,
            400,
            "INVALID_INPUT",
            "INVALID_API_KEYS",
            "invalid client_id or secret provided",
        );
        return;
    }

    if config.rate_limit {
        send_error(
            &mut stream,
            429,
            "RATE_LIMIT_EXCEEDED",
            "TRANSACTIONS_SYNC_LIMIT",
            "rate limit exceeded for attempts to access this item",
        );
        return;
    }

    if method != "POST" {
        send_error(&mut stream, 405, "INVALID_REQUEST", "METHOD_NOT_ALLOWED", "Method not allowed");
        return;
    }

    let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

    if path == "/institutions/get_by_id" {
        let institution_id = request["institution_id"].as_str().unwrap_or("ins_unknown");
        let response = json!({
            "institution": {
                "institution_id": institution_id,
                "name": format!("Mock Bank {}", institution_id),
                "url": "https://bank.example.com",
                "logo": null,
                "primary_color": "#004b87",
                "country_codes": ["US"],
                "products": ["transactions"]
            },
            "request_id": "mock-request"
        });
        send_response(&mut stream, 200, "OK", &response.to_string());
        return;
    }

    let item_id = match request["access_token"]
        .as_str()
        .and_then(|t| t.strip_prefix(ACCESS_TOKEN_PREFIX))
    {
        Some(item_id) => item_id.to_string(),
        None => {
            send_error(
                &mut stream,
                400,
                "INVALID_INPUT",
                "INVALID_ACCESS_TOKEN",
                "provided access token is in an invalid format",
            );
            return;
        }
    };

    if config.login_required_items.contains(&item_id) {
        send_error(
            &mut stream,
            400,
            "ITEM_ERROR",
            "ITEM_LOGIN_REQUIRED",
            "the login details of this item have changed",
        );
        return;
    }

    let response = match path {
        "/item/get" => json!({
            "item": {
                "item_id": item_id,
                "institution_id": format!("ins_{}", item_id),
                "available_products": [],
                "billed_products": ["transactions"]
            },
            "request_id": "mock-request"
        }),
        "/accounts/get" => json!({
            "accounts": generate_mock_accounts(&item_id, config.accounts_per_item),
            "request_id": "mock-request"
        }),
        "/transactions/sync" => {
            let cursor = request["cursor"].as_str().unwrap_or("");
            generate_sync_page(&item_id, cursor, config)
        }
        _ => {
            send_error(&mut stream, 404, "INVALID_REQUEST", "NOT_FOUND", "Endpoint not found");
            return;
        }
    };

    send_response(&mut stream, 200, "OK", &response.to_string());
}

fn send_error(stream: &mut TcpStream, status: u16, error_type: &str, code: &str, message: &str) {
    let body = json!({
        "error_type": error_type,
        "error_code": code,
        "error_message": message,
        "display_message": null,
        "request_id": "mock-request"
    });
    let status_text = match status {
        429 => "Too Many Requests",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Bad Request",
    };
    send_response(stream, status, status_text, &body.to_string());
}

fn send_response(stream: &mut TcpStream, status: u16, status_text: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn generate_mock_accounts(item_id: &str, count: usize) -> Vec<Value> {
    let kinds = [
        ("Plaid Checking", "depository", "checking"),
        ("Plaid Saving", "depository", "savings"),
        ("Plaid Credit Card", "credit", "credit card"),
    ];

    (0..count)
        .map(|i| {
            let (name, account_type, subtype) = kinds[i % kinds.len()];
            json!({
                "account_id": format!("{}-acc-{}", item_id, i + 1),
                "name": name,
                "official_name": format!("{} {}", name, i + 1),
                "mask": format!("{:04}", 1000 + i),
                "type": account_type,
                "subtype": subtype,
                "balances": {
                    "available": 100.0 + (i as f64 * 50.0),
                    "current": 110.0 + (i as f64 * 50.0),
                    "limit": null,
                    "iso_currency_code": "USD",
                    "unofficial_currency_code": null
                }
            })
        })
        .collect()
}

/// Page number encoded in a cursor for this item; empty means page 0
fn page_from_cursor(item_id: &str, cursor: &str) -> usize {
    cursor
        .strip_prefix(&format!("cursor-{}-", item_id))
        .and_then(|page| page.parse().ok())
        .unwrap_or(0)
}

fn generate_sync_page(item_id: &str, cursor: &str, config: &MockConfig) -> Value {
    if config.stalled_items.iter().any(|id| id == item_id) {
        return json!({
            "added": [],
            "modified": [],
            "removed": [],
            "next_cursor": cursor,
            "has_more": true,
            "request_id": "mock-request"
        });
    }

    let page = page_from_cursor(item_id, cursor);

    if page >= config.pages_per_item {
        // Caught up: nothing new, cursor stays where it is
        return json!({
            "added": [],
            "modified": [],
            "removed": [],
            "next_cursor": cursor_for(item_id, page),
            "has_more": false,
            "request_id": "mock-request"
        });
    }

    let merchants = [
        ("Starbucks", 4.33),
        ("Uber", 6.33),
        ("United Airlines", 500.0),
        ("McDonald's", 12.0),
        ("Payroll", -2500.0),
    ];
    let base_date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap_or_default();

    let added: Vec<Value> = (0..config.transactions_per_page)
        .map(|i| {
            let (merchant, amount) = merchants[i % merchants.len()];
            let date = base_date + Duration::days((page * config.transactions_per_page + i) as i64);
            json!({
                "transaction_id": format!("tx_{}_{}_{}", item_id, page, i),
                "account_id": format!("{}-acc-1", item_id),
                "amount": amount,
                "iso_currency_code": "USD",
                "unofficial_currency_code": null,
                "date": date.format("%Y-%m-%d").to_string(),
                "name": merchant,
                "merchant_name": merchant,
                "pending": false,
                "category": ["Shops"],
                "personal_finance_category": {"primary": "GENERAL_MERCHANDISE", "detailed": "GENERAL_MERCHANDISE_OTHER"}
            })
        })
        .collect();

    // Later pages retract the first transaction of the previous page
    let removed: Vec<Value> = if page > 0 {
        vec![json!({
            "transaction_id": format!("tx_{}_{}_0", item_id, page - 1),
            "account_id": format!("{}-acc-1", item_id)
        })]
    } else {
        Vec::new()
    };

    json!({
        "added": added,
        "modified": [],
        "removed": removed,
        "next_cursor": cursor_for(item_id, page + 1),
        "has_more": page + 1 < config.pages_per_item,
        "request_id": "mock-request"
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::plaid::{PlaidClient, PlaidProvider};
    use crate::domain::result::Error;
    use crate::domain::{FiKey, User};
    use crate::ports::FinancialDataProvider;

    fn client(server: &MockPlaidServer) -> PlaidClient {
        PlaidClient::new_with_base_url("test_client", "test_secret", &server.base_url()).unwrap()
    }

    fn user_with(items: &[(&str, Option<&str>)]) -> User {
        let mut user = User::new("u1");
        for (item_id, cursor) in items {
            let mut key = FiKey::new(*item_id, access_token_for(item_id));
            key.cursor = cursor.map(str::to_string);
            user.fi_keys.push(key);
        }
        user
    }

    #[test]
    fn test_item_and_institution() {
        let server = MockPlaidServer::start(MockConfig::default()).unwrap();
        let client = client(&server);

        let item = client.get_item(&access_token_for("fi1")).unwrap();
        assert_eq!(item.item_id, "fi1");
        assert_eq!(item.institution_id.as_deref(), Some("ins_fi1"));

        let institution = client.get_institution("ins_fi1").unwrap();
        assert_eq!(institution.name, "Mock Bank ins_fi1");
    }

    #[test]
    fn test_accounts() {
        let server = MockPlaidServer::start(MockConfig {
            accounts_per_item: 3,
            ..Default::default()
        })
        .unwrap();

        let accounts = client(&server).get_accounts(&access_token_for("fi1")).unwrap();

        assert_eq!(accounts.len(), 3);
        assert_eq!(accounts[2].account_type, "credit");
        assert!(accounts[0].balances.current.is_some());
    }

    #[test]
    fn test_sync_follows_pages() {
        let server = MockPlaidServer::start(MockConfig {
            pages_per_item: 3,
            transactions_per_page: 4,
            ..Default::default()
        })
        .unwrap();

        let sync = client(&server)
            .sync_transactions(&access_token_for("fi1"), None)
            .unwrap();

        assert_eq!(sync.added.len(), 12);
        assert_eq!(sync.removed.len(), 2);
        assert_eq!(sync.next_cursor, cursor_for("fi1", 3));
        assert!(!sync.has_more);
        assert_eq!(server.request_count(), 3);
    }

    #[test]
    fn test_sync_from_stored_cursor() {
        let server = MockPlaidServer::start(MockConfig {
            pages_per_item: 3,
            transactions_per_page: 2,
            ..Default::default()
        })
        .unwrap();

        let sync = client(&server)
            .sync_transactions(&access_token_for("fi1"), Some(&cursor_for("fi1", 2)))
            .unwrap();

        assert_eq!(sync.added.len(), 2);
        assert_eq!(sync.next_cursor, cursor_for("fi1", 3));
    }

    #[test]
    fn test_sync_when_caught_up_keeps_cursor() {
        let server = MockPlaidServer::start(MockConfig::default()).unwrap();
        let cursor = cursor_for("fi1", 2);

        let sync = client(&server)
            .sync_transactions(&access_token_for("fi1"), Some(&cursor))
            .unwrap();

        assert_eq!(sync.change_count(), 0);
        assert_eq!(sync.next_cursor, cursor);
    }

    #[test]
    fn test_sync_fails_when_cursor_stops_advancing() {
        let server = MockPlaidServer::start(MockConfig {
            stalled_items: vec!["fi1".to_string()],
            ..Default::default()
        })
        .unwrap();
        let cursor = cursor_for("fi1", 1);

        let err = client(&server)
            .sync_transactions(&access_token_for("fi1"), Some(&cursor))
            .unwrap_err();

        assert!(err.to_string().contains("stopped advancing"));
        assert!(err.to_string().contains(&cursor));
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn test_stalled_sync_fails_from_empty_cursor() {
        let server = MockPlaidServer::start(MockConfig {
            stalled_items: vec!["fi1".to_string()],
            ..Default::default()
        })
        .unwrap();

        let result = client(&server).sync_transactions(&access_token_for("fi1"), None);
        assert!(result.is_err());
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn test_auth_failure() {
        let server = MockPlaidServer::start(MockConfig {
            fail_auth: true,
            ..Default::default()
        })
        .unwrap();

        let err = client(&server).get_item(&access_token_for("fi1")).unwrap_err();
        assert!(err.to_string().contains("authentication failed"));
    }

    #[test]
    fn test_wrong_credentials_rejected() {
        let server = MockPlaidServer::start(MockConfig::default()).unwrap();
        let client =
            PlaidClient::new_with_base_url("prod_client", "prod_secret", &server.base_url())
                .unwrap();

        let err = client.get_item(&access_token_for("fi1")).unwrap_err();
        assert!(err.to_string().contains("INVALID_API_KEYS"));
    }

    #[test]
    fn test_rate_limit() {
        let server = MockPlaidServer::start(MockConfig {
            rate_limit: true,
            ..Default::default()
        })
        .unwrap();

        let err = client(&server).get_item(&access_token_for("fi1")).unwrap_err();
        let msg = err.to_string().to_lowercase();
        assert!(msg.contains("rate limit"), "Expected 'rate limit' in error, got: {}", msg);
    }

    #[test]
    fn test_provider_returns_results_in_key_order() {
        let server = MockPlaidServer::start(MockConfig {
            pages_per_item: 1,
            ..Default::default()
        })
        .unwrap();
        let provider = PlaidProvider::new(client(&server));
        let user = user_with(&[("fi2", None), ("fi1", Some(""))]);

        let results = provider.retrieve_user_fis(&user).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].item_id, "fi2");
        assert_eq!(results[0].next_cursor(), cursor_for("fi2", 1));
        assert_eq!(results[1].item_id, "fi1");
        assert_eq!(
            results[1].institution.as_ref().map(|i| i.institution_id.as_str()),
            Some("ins_fi1")
        );
    }

    #[test]
    fn test_provider_fails_whole_call_on_one_bad_item() {
        let server = MockPlaidServer::start(MockConfig {
            login_required_items: vec!["fi2".to_string()],
            ..Default::default()
        })
        .unwrap();
        let provider = PlaidProvider::new(client(&server));
        let user = user_with(&[("fi1", None), ("fi2", None)]);

        match provider.retrieve_user_fis(&user) {
            Err(Error::Provider(msg)) => {
                assert!(msg.contains("ITEM_LOGIN_REQUIRED"));
                assert!(msg.contains("fi2"));
            }
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[test]
    fn test_unreachable_server_is_provider_error() {
        let base_url = {
            let server = MockPlaidServer::start(MockConfig::default()).unwrap();
            server.base_url()
        };
        let client = PlaidClient::new_with_base_url("test_client", "test_secret", &base_url).unwrap();
        let provider = PlaidProvider::new(client);

        let result = provider.retrieve_user_fis(&user_with(&[("fi1", None)]));
        assert!(matches!(result, Err(Error::Provider(_))));
    }
}
