//! The adapter contract and the provider registry.

use common_enums::ProviderKind;
use common_utils::errors::CustomResult;
use sanalpos_domain_models::{Terminal, TerminalAuth, Transaction};

use crate::types::{AttemptOutcome, CallbackFields, PaymentFlowData, SessionContext};

/// Errors raised inside adapters. Polite acquirer refusals are not
/// errors - they come back as [`AttemptOutcome::Declined`]; this enum
/// covers transport, coding and contract failures.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ConnectorError {
    /// The terminal's credentials don't fit what this adapter needs
    #[error("Failed to obtain authentication type")]
    FailedToObtainAuthType,
    /// Building the wire payload failed
    #[error("Failed to encode connector request")]
    RequestEncodingFailed,
    /// The connector response did not parse
    #[error("Failed to deserialize connector response")]
    ResponseDeserializationFailed,
    /// A required input was absent
    #[error("Missing required field: {field_name}")]
    MissingRequiredField {
        /// Which field
        field_name: &'static str,
    },
    /// The operation is not supported by this provider
    #[error("{0} is not implemented")]
    NotImplemented(String),
    /// The issuer callback failed validation (bad hash, missing fields)
    #[error("Callback payload failed validation")]
    InvalidCallbackPayload,
    /// The encrypted callback packet could not be decoded
    #[error("Failed to decrypt callback packet")]
    PacketDecryptionFailed,
    /// Transport-level failure or timeout talking to the acquirer
    #[error("Request to the acquirer failed")]
    RequestFailed,
    /// The transaction is missing state this step needs (no form data,
    /// no verified 3-D bundle)
    #[error("Transaction has no {0} state")]
    MissingFlowState(&'static str),
}

/// Which operations a concrete adapter implements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct Capabilities {
    /// 3-D Secure flow (initialize/form/callback/provision)
    pub three_ds: bool,
    /// Non-3-D direct authorization
    pub direct: bool,
    /// Refund of a captured transaction
    pub refund: bool,
    /// Same-day void
    pub cancel: bool,
    /// Order status query
    pub status: bool,
    /// Order history query
    pub history: bool,
    /// Two-phase capture: authorization hold
    pub pre_auth: bool,
    /// Two-phase capture: capture of a held authorization
    pub post_auth: bool,
}

/// The contract every acquirer adapter satisfies. Operations default to
/// [`ConnectorError::NotImplemented`]; adapters implement what their
/// protocol supports and advertise it via [`Self::capabilities`].
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider tag, matches [`ProviderKind`] serialization.
    fn id(&self) -> &'static str;

    /// Which operations this adapter implements.
    fn capabilities(&self) -> Capabilities;

    /// Prepare the 3-D flow: talk to the acquirer where the protocol
    /// demands it and persist an adapter-opaque form bundle into
    /// `transaction.secure`.
    async fn initialize(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError>;

    /// The auto-submitting HTML document that sends the cardholder's
    /// browser to the issuer ACS. Fails when `initialize` has not run.
    fn get_form_html(&self, flow: &PaymentFlowData<'_>)
        -> CustomResult<String, ConnectorError>;

    /// Validate the issuer callback per this acquirer's accepted-status
    /// set; on pass, drive [`Self::process_provision`].
    async fn process_callback(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        fields: &CallbackFields,
    ) -> CustomResult<AttemptOutcome, ConnectorError>;

    /// Send the financial authorization built from the verified 3-D
    /// bundle.
    async fn process_provision(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError>;

    /// Single-shot non-3-D authorization.
    async fn direct_payment(
        &self,
        _ctx: &SessionContext,
        _flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        Err(ConnectorError::NotImplemented(format!("direct_payment for {}", self.id())).into())
    }

    /// Return funds of a captured original.
    async fn refund(
        &self,
        _ctx: &SessionContext,
        _flow: &mut PaymentFlowData<'_>,
        _original: &Transaction,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        Err(ConnectorError::NotImplemented(format!("refund for {}", self.id())).into())
    }

    /// Void the original before settlement.
    async fn cancel(
        &self,
        _ctx: &SessionContext,
        _flow: &mut PaymentFlowData<'_>,
        _original: &Transaction,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        Err(ConnectorError::NotImplemented(format!("cancel for {}", self.id())).into())
    }

    /// Read-only order status at the acquirer.
    async fn status(
        &self,
        _ctx: &SessionContext,
        _terminal: &Terminal,
        _auth: &TerminalAuth,
        _order_id: &str,
    ) -> CustomResult<serde_json::Value, ConnectorError> {
        Err(ConnectorError::NotImplemented(format!("status for {}", self.id())).into())
    }

    /// Read-only order history at the acquirer.
    async fn history(
        &self,
        _ctx: &SessionContext,
        _terminal: &Terminal,
        _auth: &TerminalAuth,
        _order_id: &str,
    ) -> CustomResult<serde_json::Value, ConnectorError> {
        Err(ConnectorError::NotImplemented(format!("history for {}", self.id())).into())
    }

    /// Authorization hold for two-phase capture.
    async fn pre_auth(
        &self,
        _ctx: &SessionContext,
        _flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        Err(ConnectorError::NotImplemented(format!("pre_auth for {}", self.id())).into())
    }

    /// Capture of a previous authorization hold.
    async fn post_auth(
        &self,
        _ctx: &SessionContext,
        _flow: &mut PaymentFlowData<'_>,
        _original: &Transaction,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        Err(ConnectorError::NotImplemented(format!("post_auth for {}", self.id())).into())
    }
}

static GARANTI: crate::connectors::Garanti = crate::connectors::Garanti::new();
static PAYTEN: crate::connectors::Payten = crate::connectors::Payten::new();
static YKB: crate::connectors::Ykb = crate::connectors::Ykb::new();
static VAKIFBANK: crate::connectors::Vakifbank = crate::connectors::Vakifbank::new();
static QNB: crate::connectors::Qnb = crate::connectors::Qnb::new();
static IYZICO: crate::connectors::Iyzico = crate::connectors::Iyzico::new();

/// Resolve the adapter for a provider tag. Tags without an
/// implementation fail early, before any transaction state is touched.
pub fn get_connector(
    provider: ProviderKind,
) -> CustomResult<&'static dyn ProviderAdapter, ConnectorError> {
    match provider {
        ProviderKind::Garanti => Ok(&GARANTI),
        ProviderKind::Payten => Ok(&PAYTEN),
        ProviderKind::Ykb => Ok(&YKB),
        ProviderKind::Vakifbank => Ok(&VAKIFBANK),
        ProviderKind::Qnb => Ok(&QNB),
        ProviderKind::Iyzico => Ok(&IYZICO),
        ProviderKind::Akbank
        | ProviderKind::Denizbank
        | ProviderKind::Kuveytturk
        | ProviderKind::Paytr
        | ProviderKind::Sigmapay => {
            Err(ConnectorError::NotImplemented(provider.to_string()).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_implemented_providers() {
        for provider in [
            ProviderKind::Garanti,
            ProviderKind::Payten,
            ProviderKind::Ykb,
            ProviderKind::Vakifbank,
            ProviderKind::Qnb,
            ProviderKind::Iyzico,
        ] {
            assert!(get_connector(provider).is_ok(), "{provider} should resolve");
        }
    }

    #[test]
    fn registry_rejects_unimplemented_providers() {
        for provider in [
            ProviderKind::Akbank,
            ProviderKind::Paytr,
            ProviderKind::Sigmapay,
        ] {
            assert!(get_connector(provider).is_err(), "{provider} should fail");
        }
    }

    #[test]
    fn adapter_ids_match_provider_tags() {
        for provider in [
            ProviderKind::Garanti,
            ProviderKind::Payten,
            ProviderKind::Ykb,
            ProviderKind::Vakifbank,
            ProviderKind::Qnb,
            ProviderKind::Iyzico,
        ] {
            #[allow(clippy::expect_used)]
            let adapter = get_connector(provider).expect("adapter");
            assert_eq!(adapter.id(), provider.to_string());
        }
    }
}
