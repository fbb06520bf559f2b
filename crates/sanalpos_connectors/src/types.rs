//! Data carried through an adapter call.

use std::collections::HashMap;

use common_enums::TransactionLogType;
use sanalpos_domain_models::{PaymentCard, Terminal, TerminalAuth, Transaction};

use crate::http::HttpClient;

/// Per-process context shared by every adapter call.
#[derive(Clone, Debug)]
pub struct SessionContext {
    /// Outbound HTTP client pair (verified / relaxed TLS)
    pub http: HttpClient,
    /// Base URL the issuer posts callbacks to
    pub callback_base_url: String,
}

impl SessionContext {
    /// The callback URL for a transaction:
    /// `<base>/payment/<transaction-id>/callback`.
    pub fn callback_url(&self, transaction_id: &str) -> String {
        format!(
            "{}/payment/{transaction_id}/callback",
            self.callback_base_url.trim_end_matches('/')
        )
    }
}

/// Everything an adapter needs for one flow step: the transaction to
/// mutate, its terminal and the per-call decrypted credential view.
///
/// Adapters mutate the transaction in memory - the secure bundle, the
/// exchange log, the result - and the orchestrator persists afterwards.
pub struct PaymentFlowData<'a> {
    /// The transaction being driven
    pub transaction: &'a mut Transaction,
    /// The terminal it runs on
    pub terminal: &'a Terminal,
    /// Decrypted credentials, derived per call, never written back
    pub auth: &'a TerminalAuth,
    /// Decrypted card, present while the flow still needs it
    pub card: Option<&'a PaymentCard>,
    /// Callback URL for this transaction
    pub callback_url: String,
}

impl std::fmt::Debug for PaymentFlowData<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentFlowData")
            .field("transaction", &self.transaction.id)
            .field("terminal", &self.terminal.id)
            .finish()
    }
}

impl PaymentFlowData<'_> {
    /// Append an exchange log entry on the in-memory transaction.
    pub fn log(
        &mut self,
        log_type: TransactionLogType,
        request: serde_json::Value,
        response: serde_json::Value,
    ) {
        self.transaction.append_log(log_type, request, response);
    }

    /// The card, or a missing-field error for flows that require it.
    pub fn card_required(&self) -> Result<&PaymentCard, crate::api::ConnectorError> {
        self.card
            .ok_or(crate::api::ConnectorError::MissingRequiredField { field_name: "card" })
    }
}

/// What an adapter operation concluded.
#[derive(Clone, Debug, PartialEq)]
pub enum AttemptOutcome {
    /// 3-D flow prepared; the cardholder must be redirected next
    Pending,
    /// The acquirer authorized the money movement
    Approved {
        /// Authorization code, where the protocol returns one
        auth_code: Option<String>,
        /// Retrieval reference number
        ref_number: Option<String>,
    },
    /// The acquirer refused; carries the native code and message
    Declined {
        /// Acquirer's native result code
        code: String,
        /// Acquirer's message
        message: String,
    },
}

impl AttemptOutcome {
    /// Shorthand for a declined outcome.
    pub fn declined(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Declined {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A raw connector response: status code plus body bytes.
#[derive(Clone, Debug)]
pub struct Response {
    /// HTTP status
    pub status_code: u16,
    /// Body bytes, still in the connector's own charset
    pub body: bytes::Bytes,
}

/// Bank POST callbacks arrive as a flat form map.
pub type CallbackFields = HashMap<String, String>;
