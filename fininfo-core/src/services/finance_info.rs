//! Finance info service - the "get my FI info" request
//!
//! Fetches the current state of every institution a user has linked, writes
//! the provider's new sync cursors back into the user's FI keys and stages
//! the updated user document. Either the whole fetch + reconcile succeeds and
//! the document is staged, or nothing is staged and a 500 goes back.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{FinancialInst, User};
use crate::ports::{FinancialDataProvider, UserStore};
use crate::services::reconcile::reconcile_cursors;
use crate::services::{LogEvent, LoggingService};

/// Inbound trigger; `id` and `user_id` carry the same value in practice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinanceInfoRequest {
    pub id: String,
    pub user_id: String,
}

impl FinanceInfoRequest {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            user_id: id.clone(),
            id,
        }
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }
}

/// Response body shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    FinanceInfo {
        #[serde(rename = "userFIs")]
        user_fis: Vec<FinancialInst>,
    },
    Error(String),
    Empty {},
}

/// HTTP-style response handed back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub body: ResponseBody,
}

impl HttpResponse {
    pub fn ok(user_fis: Vec<FinancialInst>) -> Self {
        Self {
            status: 200,
            body: ResponseBody::FinanceInfo { user_fis },
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            body: ResponseBody::Empty {},
        }
    }

    pub fn server_error(error: &Error) -> Self {
        Self {
            status: 500,
            body: ResponseBody::Error(format!("Unable to retrieve FI info: {}", error)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Body as sent over the wire: JSON for objects, plain text for errors
    pub fn body_text(&self) -> serde_json::Result<String> {
        match &self.body {
            ResponseBody::Error(message) => Ok(message.clone()),
            body => serde_json::to_string(body),
        }
    }
}

/// Result of handling one request: the response plus the staged user document
#[derive(Debug, Clone)]
pub struct FinanceInfoOutcome {
    pub response: HttpResponse,
    /// Serialized updated user; `Some` only on success
    pub user_document: Option<String>,
}

/// Service answering finance info requests
pub struct FinanceInfoService {
    provider: Arc<dyn FinancialDataProvider>,
    logger: Option<Arc<LoggingService>>,
}

impl FinanceInfoService {
    pub fn new(provider: Arc<dyn FinancialDataProvider>) -> Self {
        Self {
            provider,
            logger: None,
        }
    }

    /// Record failures and completions in the event log
    pub fn with_logger(mut self, logger: Arc<LoggingService>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Handle a request for an already resolved user
    ///
    /// Exactly one response is produced. The user document is staged only
    /// when the provider call and the cursor reconciliation both succeed.
    pub fn handle(&self, request: &FinanceInfoRequest, user: Option<User>) -> FinanceInfoOutcome {
        let request_id = Uuid::new_v4().to_string();
        self.handle_with_request_id(request, user, &request_id)
    }

    /// Resolve the user from `store`, handle the request and write the staged document
    pub fn invoke(&self, request: &FinanceInfoRequest, store: &dyn UserStore) -> HttpResponse {
        let request_id = Uuid::new_v4().to_string();

        let user = match store.find_user(&request.id, &request.user_id) {
            Ok(user) => user,
            Err(e) => {
                self.log_failure(&request_id, &e);
                return HttpResponse::server_error(&e);
            }
        };

        let outcome = self.handle_with_request_id(request, user, &request_id);

        if let Some(document) = &outcome.user_document {
            if let Err(e) = store.write_user_document(document) {
                self.log_failure(&request_id, &e);
                return HttpResponse::server_error(&e);
            }
        }

        outcome.response
    }

    fn handle_with_request_id(
        &self,
        request: &FinanceInfoRequest,
        user: Option<User>,
        request_id: &str,
    ) -> FinanceInfoOutcome {
        // A resolved document that belongs to someone else counts as missing
        let Some(user) = user.filter(|u| u.id == request.id) else {
            self.log(
                LogEvent::new("finance_info_user_not_found").with_request_id(request_id),
            );
            return FinanceInfoOutcome {
                response: HttpResponse::not_found(),
                user_document: None,
            };
        };

        match self.refresh_user(user) {
            Ok((user_fis, document)) => {
                self.log(
                    LogEvent::new("finance_info_completed")
                        .with_provider(self.provider.name())
                        .with_request_id(request_id),
                );
                FinanceInfoOutcome {
                    response: HttpResponse::ok(user_fis),
                    user_document: Some(document),
                }
            }
            Err(e) => {
                self.log_failure(request_id, &e);
                FinanceInfoOutcome {
                    response: HttpResponse::server_error(&e),
                    user_document: None,
                }
            }
        }
    }

    /// Provider fetch, cursor reconciliation and serialization of the updated user
    fn refresh_user(&self, mut user: User) -> Result<(Vec<FinancialInst>, String)> {
        let user_fis = self.provider.retrieve_user_fis(&user)?;
        let fi_keys = reconcile_cursors(&user.fi_keys, &user_fis)?;
        user.replace_fi_keys(fi_keys);
        let document = user.to_document()?;
        Ok((user_fis, document))
    }

    fn log_failure(&self, request_id: &str, error: &Error) {
        let event = match error {
            Error::Provider(_) => "finance_info_provider_failed",
            Error::CursorMismatch { .. } => "finance_info_cursor_mismatch",
            _ => "finance_info_failed",
        };
        self.log(
            LogEvent::new(event)
                .with_provider(self.provider.name())
                .with_request_id(request_id)
                .with_error(error.kind(), error.to_string()),
        );
    }

    /// Logging is best effort; a broken log database never fails a request
    fn log(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            let _ = logger.log(event);
        }
    }
}
