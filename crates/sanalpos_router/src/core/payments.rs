//! The payment orchestrator: validates intents, selects terminals,
//! drives the adapters and owns every transaction state transition.

use std::sync::Arc;

use common_enums::{CardType, Currency, TransactionKind, TransactionLogType, TransactionStatus};
use common_utils::{
    card as card_utils, date_time, encryption::FieldCipher, types::MinorUnit,
};
use error_stack::{report, ResultExt};
use masking::Secret;
use sanalpos_connectors::{
    api::get_connector, AttemptOutcome, ConnectorError, PaymentFlowData, ProviderAdapter,
    SessionContext,
};
use sanalpos_domain_models::{
    BinInfo, BinResolver, Customer, NewTransaction, PaymentCard, Terminal,
    TerminalStorageInterface, Transaction, TransactionLog, TransactionStorageInterface,
};

use super::{
    api_models::{
        BinQueryRequest, BinQueryResponse, CallbackOutcome, InstallmentOption,
        PaymentCreatedResponse, PaymentRequest, PosSummary, TransactionStatusResponse,
        DEFAULT_COMPANY,
    },
    errors::{ApiErrorResponse, RouterResult, StorageErrorExt},
    selection,
};

/// Everything the orchestrator needs, shared across request tasks.
#[derive(Clone)]
pub struct PaymentsCore {
    pub terminals: Arc<dyn TerminalStorageInterface>,
    pub transactions: Arc<dyn TransactionStorageInterface>,
    pub bin_resolver: Arc<dyn BinResolver>,
    pub cipher: FieldCipher,
    pub session: SessionContext,
}

impl std::fmt::Debug for PaymentsCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PaymentsCore")
    }
}

/// Map an adapter failure to the persisted `{code, message}` pair and
/// the API error it surfaces as.
fn connector_failure(
    report: &error_stack::Report<ConnectorError>,
) -> (String, String, ApiErrorResponse) {
    match report.current_context() {
        ConnectorError::RequestFailed => (
            "NETWORK_ERROR".to_string(),
            "Acquirer connection failed".to_string(),
            ApiErrorResponse::Network,
        ),
        ConnectorError::PacketDecryptionFailed => (
            "CRYPTO_ERROR".to_string(),
            "Callback packet could not be decrypted".to_string(),
            ApiErrorResponse::Crypto,
        ),
        ConnectorError::InvalidCallbackPayload => (
            "INVALID_CALLBACK".to_string(),
            "Callback payload failed validation".to_string(),
            ApiErrorResponse::validation("callback payload failed validation"),
        ),
        ConnectorError::NotImplemented(operation) => (
            "NOT_IMPLEMENTED".to_string(),
            operation.clone(),
            ApiErrorResponse::validation(format!("{operation} is not available")),
        ),
        other => (
            "PROVIDER_ERROR".to_string(),
            other.to_string(),
            ApiErrorResponse::Internal,
        ),
    }
}

/// Installment options for a card on a terminal. Single shot is always
/// offered; TRY credit cards additionally get every count up to the
/// policy maximum once the basket clears the policy minimum. Amounts
/// report the total - per-count commission application is a planned
/// extension.
pub fn installment_options(
    amount: MinorUnit,
    currency: Currency,
    card_type: Option<CardType>,
    terminal: &Terminal,
) -> Vec<InstallmentOption> {
    let mut options = vec![InstallmentOption {
        count: 1,
        amount: amount.to_major_unit_f64(),
    }];

    let eligible = currency == Currency::Try
        && card_type == Some(CardType::Credit)
        && terminal.installment.enabled
        && amount >= terminal.installment.min_amount;
    if eligible {
        for count in 2..=terminal.installment.max_count {
            options.push(InstallmentOption {
                count,
                amount: amount.to_major_unit_f64(),
            });
        }
    }
    options
}

impl PaymentsCore {
    fn form_url(&self, transaction_id: &str) -> String {
        format!(
            "{}/payment/{transaction_id}/form",
            self.session.callback_base_url.trim_end_matches('/')
        )
    }

    async fn resolve_bin_snapshot(&self, bin: &str) -> Option<BinInfo> {
        match self.bin_resolver.resolve(bin).await {
            Ok(info) => Some(info),
            Err(error) => {
                tracing::warn!(?error, %bin, "bin lookup failed, continuing without snapshot");
                None
            }
        }
    }

    /// `POST /api/payment/bin`
    pub async fn query_bin(&self, request: BinQueryRequest) -> RouterResult<BinQueryResponse> {
        let amount = MinorUnit::from_major_f64(request.amount)
            .change_context(ApiErrorResponse::validation("invalid amount"))?;
        let company = request
            .company
            .unwrap_or_else(|| DEFAULT_COMPANY.to_string());

        let bin_info = self
            .bin_resolver
            .resolve(&request.bin)
            .await
            .map_err(|error| {
                error.change_context(ApiErrorResponse::validation("BIN could not be resolved"))
            })?;

        let candidates = self
            .terminals
            .find_terminals_for_selection(&company, request.currency)
            .await
            .to_internal_response()?;
        let terminal = selection::select_terminal(&candidates, request.currency, Some(&bin_info))
            .ok_or_else(|| {
                report!(ApiErrorResponse::validation(
                    "no suitable terminal for this card"
                ))
            })?;

        let installments =
            installment_options(amount, request.currency, bin_info.card_type, terminal);

        Ok(BinQueryResponse {
            success: true,
            bank: bin_info.bank,
            bank_code: bin_info.bank_code,
            card_type: bin_info.card_type,
            card_family: bin_info.family,
            brand: bin_info.brand,
            country: bin_info.country,
            pos: PosSummary {
                id: terminal.id.clone(),
                name: terminal.name.clone(),
                bank_code: terminal.bank_code,
                provider: terminal.provider,
            },
            installments,
        })
    }

    fn validate_card(card: &super::api_models::CardRequest) -> RouterResult<PaymentCard> {
        if card.holder.trim().is_empty() {
            return Err(report!(ApiErrorResponse::validation(
                "card.holder is required"
            )));
        }
        let pan = card_utils::validate_pan(&card.number)
            .change_context(ApiErrorResponse::validation("card.number is invalid"))?;
        let (month, year) = PaymentCard::parse_expiry(&card.expiry)
            .change_context(ApiErrorResponse::validation("card.expiry is invalid"))?;
        let cvv = card.cvv.trim();
        if cvv.len() < 3 || cvv.len() > 4 || !cvv.chars().all(|c| c.is_ascii_digit()) {
            return Err(report!(ApiErrorResponse::validation("card.cvv is invalid")));
        }

        Ok(PaymentCard {
            holder: Secret::new(card.holder.trim().to_string()),
            number: Secret::new(pan),
            exp_month: Secret::new(month),
            exp_year: Secret::new(year),
            cvv: Secret::new(cvv.to_string()),
        })
    }

    async fn resolve_terminal(
        &self,
        request: &PaymentRequest,
        company: &str,
        bin_info: Option<&BinInfo>,
    ) -> RouterResult<Terminal> {
        if let Some(pos_id) = &request.pos_id {
            let terminal = self
                .terminals
                .find_terminal_by_id(pos_id)
                .await
                .to_not_found_response("terminal")?;
            if terminal.company_id != company {
                return Err(report!(ApiErrorResponse::NotFound { entity: "terminal" }));
            }
            if !terminal.status {
                return Err(report!(ApiErrorResponse::validation("terminal is inactive")));
            }
            if !terminal.supports_currency(request.currency) {
                return Err(report!(ApiErrorResponse::validation(
                    "terminal does not support this currency"
                )));
            }
            return Ok(terminal);
        }

        let candidates = self
            .terminals
            .find_terminals_for_selection(company, request.currency)
            .await
            .to_internal_response()?;
        selection::select_terminal(&candidates, request.currency, bin_info)
            .cloned()
            .ok_or_else(|| {
                report!(ApiErrorResponse::validation(
                    "no suitable terminal for this card"
                ))
            })
    }

    /// `POST /api/payment/pay` - create the attempt and run the
    /// adapter's 3-D initialize. On success the transaction moves
    /// `pending -> processing` and the caller receives the form URL.
    pub async fn create_payment(
        &self,
        request: PaymentRequest,
        gateway_user: Option<String>,
    ) -> RouterResult<PaymentCreatedResponse> {
        let amount = MinorUnit::from_major_f64(request.amount)
            .change_context(ApiErrorResponse::validation("invalid amount"))?;
        if amount.get_amount_as_i64() == 0 {
            return Err(report!(ApiErrorResponse::validation("amount must be positive")));
        }
        let card = Self::validate_card(&request.card)?;
        let installment = request.installment.unwrap_or(1).max(1);
        let company = request
            .company
            .clone()
            .unwrap_or_else(|| DEFAULT_COMPANY.to_string());

        let bin = {
            use masking::PeekInterface;
            card.number.peek().chars().take(8).collect::<String>()
        };
        let bin_info = self.resolve_bin_snapshot(&bin).await;

        // Domestic cards cannot pay in a foreign currency.
        if request.currency != Currency::Try
            && bin_info
                .as_ref()
                .and_then(|info| info.country.as_deref())
                == Some("tr")
        {
            return Err(report!(ApiErrorResponse::validation(
                "foreign currency payments are not available for domestic cards"
            )));
        }

        let terminal = self
            .resolve_terminal(&request, &company, bin_info.as_ref())
            .await?;
        if !terminal.three_ds.enabled {
            return Err(report!(ApiErrorResponse::validation(
                "3-D Secure is not enabled for this terminal"
            )));
        }
        if let Some(min) = terminal.limits.min_amount {
            if amount < min {
                return Err(report!(ApiErrorResponse::validation(
                    "amount is below the terminal minimum"
                )));
            }
        }
        if let Some(max) = terminal.limits.max_amount {
            if amount > max {
                return Err(report!(ApiErrorResponse::validation(
                    "amount is above the terminal maximum"
                )));
            }
        }

        let customer = request.customer.as_ref().map(|customer| Customer {
            name: customer.name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
            ip: customer.ip.clone(),
        });

        let transaction = Transaction::from_new(
            NewTransaction {
                company_id: company,
                terminal_id: terminal.id.clone(),
                kind: TransactionKind::Sale,
                parent_id: None,
                amount,
                currency: request.currency,
                installment,
                card: card.clone(),
                bin_info,
                customer,
                external_id: request.external_id.clone(),
                gateway_user,
            },
            &self.cipher,
        )
        .change_context(ApiErrorResponse::Crypto)?;

        let mut transaction = self
            .transactions
            .insert_transaction(transaction)
            .await
            .to_internal_response()?;

        let adapter = get_connector(terminal.provider).map_err(|error| {
            error.change_context(ApiErrorResponse::validation(format!(
                "provider {} is not implemented",
                terminal.provider
            )))
        })?;
        let auth = terminal
            .decrypt_credentials(&self.cipher)
            .change_context(ApiErrorResponse::Crypto)?;

        let callback_url = self.session.callback_url(&transaction.id);
        let transaction_id = transaction.id.clone();
        let mut flow = PaymentFlowData {
            transaction: &mut transaction,
            terminal: &terminal,
            auth: &auth,
            card: Some(&card),
            callback_url,
        };

        match adapter.initialize(&self.session, &mut flow).await {
            Ok(AttemptOutcome::Pending) => {
                self.transactions
                    .save_secure(&transaction)
                    .await
                    .to_internal_response()?;
                self.transactions
                    .update_transaction_status(
                        &transaction_id,
                        &[TransactionStatus::Pending],
                        TransactionStatus::Processing,
                    )
                    .await
                    .to_internal_response()?;
                Ok(PaymentCreatedResponse {
                    success: true,
                    transaction_id: transaction_id.clone(),
                    form_url: self.form_url(&transaction_id),
                })
            }
            Ok(AttemptOutcome::Declined { code, message }) => {
                transaction.set_failure(code.clone(), message.clone());
                transaction.status = TransactionStatus::Failed;
                transaction.completed_at = Some(date_time::now());
                self.persist_final_state(&transaction, &[TransactionStatus::Pending])
                    .await?;
                Err(report!(ApiErrorResponse::Provider { code, message }))
            }
            Ok(AttemptOutcome::Approved { .. }) => {
                Err(report!(ApiErrorResponse::Internal))
                    .attach_printable("initialize cannot approve a payment")
            }
            Err(error) => {
                let (code, message, api_error) = connector_failure(&error);
                transaction.set_failure(code, message);
                transaction.status = TransactionStatus::Failed;
                transaction.completed_at = Some(date_time::now());
                self.persist_final_state(&transaction, &[TransactionStatus::Pending])
                    .await?;
                Err(error.change_context(api_error))
            }
        }
    }

    /// Persist the mutable subtree and finalize under a status CAS.
    /// Returns whether this caller won the transition.
    async fn persist_final_state(
        &self,
        transaction: &Transaction,
        expected: &[TransactionStatus],
    ) -> RouterResult<bool> {
        self.transactions
            .save_secure(transaction)
            .await
            .to_internal_response()?;
        self.transactions
            .finalize_transaction(transaction, expected)
            .await
            .to_internal_response()
    }

    /// `GET /payment/{id}/form`
    pub async fn get_payment_form(&self, transaction_id: &str) -> RouterResult<String> {
        let mut transaction = self
            .transactions
            .find_transaction_by_id(transaction_id)
            .await
            .to_not_found_response("transaction")?;
        if transaction.status != TransactionStatus::Processing {
            return Err(report!(ApiErrorResponse::state(
                "payment is not awaiting 3-D authentication"
            )));
        }

        let terminal = self
            .terminals
            .find_terminal_by_id(&transaction.terminal_id)
            .await
            .to_not_found_response("terminal")?;
        let adapter = get_connector(terminal.provider)
            .map_err(|error| error.change_context(ApiErrorResponse::Internal))?;
        let auth = terminal
            .decrypt_credentials(&self.cipher)
            .change_context(ApiErrorResponse::Crypto)?;
        let card = transaction
            .decrypt_card(&self.cipher)
            .change_context(ApiErrorResponse::Crypto)?;

        let callback_url = self.session.callback_url(transaction_id);
        let flow = PaymentFlowData {
            transaction: &mut transaction,
            terminal: &terminal,
            auth: &auth,
            card: Some(&card),
            callback_url,
        };
        let html = adapter.get_form_html(&flow).map_err(|error| {
            error.change_context(ApiErrorResponse::state("3-D form is not available"))
        })?;

        self.transactions
            .append_transaction_log(
                transaction_id,
                TransactionLog {
                    log_type: TransactionLogType::ThreeDForm,
                    request: serde_json::json!({ "served": true }),
                    response: serde_json::Value::Null,
                    at: date_time::now(),
                },
            )
            .await
            .to_internal_response()?;

        Ok(html)
    }

    fn outcome_of(transaction: &Transaction) -> CallbackOutcome {
        let result = transaction.result.as_ref();
        CallbackOutcome {
            transaction_id: transaction.id.clone(),
            success: result.map(|r| r.success).unwrap_or(false),
            status: transaction.status,
            code: result.and_then(|r| r.code.clone()),
            message: result.and_then(|r| r.message.clone()),
            amount: transaction.amount.to_major_unit_f64(),
            currency: transaction.currency,
            masked_card: transaction.card.masked.clone(),
        }
    }

    /// `POST /payment/{id}/callback` - validate the issuer callback and
    /// provision. Idempotent under retries: a terminal-state
    /// transaction short-circuits to its persisted outcome, and the
    /// final transition is a status CAS so a duplicate racing us can
    /// never double-finalize.
    pub async fn process_callback(
        &self,
        transaction_id: &str,
        fields: &std::collections::HashMap<String, String>,
    ) -> RouterResult<CallbackOutcome> {
        let mut transaction = self
            .transactions
            .find_transaction_by_id(transaction_id)
            .await
            .to_not_found_response("transaction")?;

        if transaction.status.is_terminal() {
            return Ok(Self::outcome_of(&transaction));
        }
        if transaction.status == TransactionStatus::Pending {
            return Err(report!(ApiErrorResponse::state(
                "payment has not been initialized"
            )));
        }

        let terminal = self
            .terminals
            .find_terminal_by_id(&transaction.terminal_id)
            .await
            .to_not_found_response("terminal")?;
        let adapter = get_connector(terminal.provider)
            .map_err(|error| error.change_context(ApiErrorResponse::Internal))?;
        let auth = terminal
            .decrypt_credentials(&self.cipher)
            .change_context(ApiErrorResponse::Crypto)?;
        let card = transaction
            .decrypt_card(&self.cipher)
            .change_context(ApiErrorResponse::Crypto)?;

        let callback_url = self.session.callback_url(transaction_id);
        let mut flow = PaymentFlowData {
            transaction: &mut transaction,
            terminal: &terminal,
            auth: &auth,
            card: Some(&card),
            callback_url,
        };

        let outcome = adapter.process_callback(&self.session, &mut flow, fields).await;

        let won = match outcome {
            Ok(AttemptOutcome::Approved {
                auth_code,
                ref_number,
            }) => {
                transaction.set_approval(auth_code, ref_number);
                transaction.status = TransactionStatus::Success;
                transaction.completed_at = Some(date_time::now());
                // CVV is zeroized the moment the attempt succeeds.
                transaction.card.cvv = None;
                self.persist_final_state(&transaction, &[TransactionStatus::Processing])
                    .await?
            }
            Ok(AttemptOutcome::Declined { code, message }) => {
                transaction.set_failure(code, message);
                transaction.status = TransactionStatus::Failed;
                transaction.completed_at = Some(date_time::now());
                self.persist_final_state(&transaction, &[TransactionStatus::Processing])
                    .await?
            }
            Ok(AttemptOutcome::Pending) => {
                return Err(report!(ApiErrorResponse::Internal))
                    .attach_printable("callback cannot leave a payment pending");
            }
            Err(error) => {
                let (code, message, _) = connector_failure(&error);
                transaction.set_failure(code, message);
                transaction.status = TransactionStatus::Failed;
                transaction.completed_at = Some(date_time::now());
                self.persist_final_state(&transaction, &[TransactionStatus::Processing])
                    .await?
            }
        };

        if !won {
            // A concurrent duplicate finalized first; its outcome is
            // authoritative.
            let persisted = self
                .transactions
                .find_transaction_by_id(transaction_id)
                .await
                .to_not_found_response("transaction")?;
            return Ok(Self::outcome_of(&persisted));
        }

        Ok(Self::outcome_of(&transaction))
    }

    /// `GET /api/payment/{id}` - the public projection only.
    pub async fn get_transaction_status(
        &self,
        transaction_id: &str,
    ) -> RouterResult<TransactionStatusResponse> {
        let transaction = self
            .transactions
            .find_transaction_by_id(transaction_id)
            .await
            .to_not_found_response("transaction")?;
        Ok(TransactionStatusResponse {
            status: true,
            transaction: transaction.public_view(),
        })
    }

    /// Refund a captured payment through a child transaction.
    pub async fn refund_payment(
        &self,
        transaction_id: &str,
    ) -> RouterResult<TransactionStatusResponse> {
        self.inverse_operation(transaction_id, TransactionKind::Refund)
            .await
    }

    /// Void a captured payment through a child transaction.
    pub async fn cancel_payment(
        &self,
        transaction_id: &str,
    ) -> RouterResult<TransactionStatusResponse> {
        self.inverse_operation(transaction_id, TransactionKind::Cancel)
            .await
    }

    async fn inverse_operation(
        &self,
        transaction_id: &str,
        kind: TransactionKind,
    ) -> RouterResult<TransactionStatusResponse> {
        let mut parent = self
            .transactions
            .find_transaction_by_id(transaction_id)
            .await
            .to_not_found_response("transaction")?;
        if parent.status != TransactionStatus::Success {
            return Err(report!(ApiErrorResponse::state(
                "only captured payments can be reversed"
            )));
        }

        let terminal = self
            .terminals
            .find_terminal_by_id(&parent.terminal_id)
            .await
            .to_not_found_response("terminal")?;
        let adapter = get_connector(terminal.provider)
            .map_err(|error| error.change_context(ApiErrorResponse::Internal))?;
        let supported = match kind {
            TransactionKind::Refund => adapter.capabilities().refund,
            TransactionKind::Cancel => adapter.capabilities().cancel,
            _ => false,
        };
        if !supported {
            return Err(report!(ApiErrorResponse::validation(format!(
                "{kind} is not available for this provider"
            ))));
        }

        let mut child = Transaction {
            id: common_utils::generate_id(),
            company_id: parent.company_id.clone(),
            terminal_id: parent.terminal_id.clone(),
            kind,
            parent_id: Some(parent.id.clone()),
            amount: parent.amount,
            currency: parent.currency,
            installment: parent.installment,
            card: parent.card.clone(),
            bin_info: parent.bin_info.clone(),
            customer: parent.customer.clone(),
            status: TransactionStatus::Pending,
            secure: Default::default(),
            result: None,
            logs: Vec::new(),
            external_id: parent.external_id.clone(),
            gateway_user: parent.gateway_user.clone(),
            created_at: date_time::now(),
            completed_at: None,
            refunded_at: None,
            cancelled_at: None,
        };
        child = self
            .transactions
            .insert_transaction(child)
            .await
            .to_internal_response()?;
        self.transactions
            .update_transaction_status(
                &child.id,
                &[TransactionStatus::Pending],
                TransactionStatus::Processing,
            )
            .await
            .to_internal_response()?;
        child.status = TransactionStatus::Processing;

        let auth = terminal
            .decrypt_credentials(&self.cipher)
            .change_context(ApiErrorResponse::Crypto)?;
        let callback_url = self.session.callback_url(&child.id);
        let mut flow = PaymentFlowData {
            transaction: &mut child,
            terminal: &terminal,
            auth: &auth,
            card: None,
            callback_url,
        };

        let outcome = match kind {
            TransactionKind::Refund => adapter.refund(&self.session, &mut flow, &parent).await,
            _ => adapter.cancel(&self.session, &mut flow, &parent).await,
        };

        match outcome {
            Ok(AttemptOutcome::Approved {
                auth_code,
                ref_number,
            }) => {
                child.set_approval(auth_code, ref_number);
                child.status = TransactionStatus::Success;
                child.completed_at = Some(date_time::now());
                self.persist_final_state(&child, &[TransactionStatus::Processing])
                    .await?;

                let now = date_time::now();
                match kind {
                    TransactionKind::Refund => parent.refunded_at = Some(now),
                    _ => {
                        parent.cancelled_at = Some(now);
                        parent.status = TransactionStatus::Cancelled;
                    }
                }
                self.transactions
                    .finalize_transaction(&parent, &[TransactionStatus::Success])
                    .await
                    .to_internal_response()?;

                Ok(TransactionStatusResponse {
                    status: true,
                    transaction: child.public_view(),
                })
            }
            Ok(AttemptOutcome::Declined { code, message }) => {
                child.set_failure(code.clone(), message.clone());
                child.status = TransactionStatus::Failed;
                child.completed_at = Some(date_time::now());
                self.persist_final_state(&child, &[TransactionStatus::Processing])
                    .await?;
                Err(report!(ApiErrorResponse::Provider { code, message }))
            }
            Ok(AttemptOutcome::Pending) => Err(report!(ApiErrorResponse::Internal)),
            Err(error) => {
                let (code, message, api_error) = connector_failure(&error);
                child.set_failure(code, message);
                child.status = TransactionStatus::Failed;
                child.completed_at = Some(date_time::now());
                self.persist_final_state(&child, &[TransactionStatus::Processing])
                    .await?;
                Err(error.change_context(api_error))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use common_enums::{BankCode, ProviderKind};
    use sanalpos_connectors::HttpClient;
    use sanalpos_domain_models::{TerminalCredentials, TerminalNew, ThreeDsConfig};

    use super::*;
    use crate::core::api_models::CardRequest;
    use crate::db::mock_db::MockDb;

    struct StaticBinResolver(Option<BinInfo>);

    #[async_trait::async_trait]
    impl BinResolver for StaticBinResolver {
        async fn resolve(
            &self,
            _bin: &str,
        ) -> common_utils::errors::CustomResult<BinInfo, sanalpos_domain_models::BinLookupError>
        {
            self.0
                .clone()
                .ok_or_else(|| sanalpos_domain_models::BinLookupError::LookupFailed.into())
        }
    }

    const MASTER_KEY: &str = "orchestrator-tests";

    fn garanti_terminal(cipher: &FieldCipher) -> Terminal {
        TerminalNew {
            company_id: DEFAULT_COMPANY.to_string(),
            name: "Garanti".to_string(),
            bank_code: BankCode::Garanti,
            provider: ProviderKind::Garanti,
            currencies: vec![Currency::Try, Currency::Usd],
            default_currencies: vec![Currency::Try],
            supported_card_families: vec!["Bonus".to_string()],
            credentials: TerminalCredentials {
                merchant_id: Secret::new("7000679".to_string()),
                terminal_id: Secret::new("30691298".to_string()),
                username: Some(Secret::new("PROVAUT".to_string())),
                password: Some("123qweASD/".to_string()),
                secret_key: None,
                extra: None,
            },
            three_ds: ThreeDsConfig {
                store_key: Some("12345678".to_string()),
                ..Default::default()
            },
            installment: Default::default(),
            limits: Default::default(),
            priority: 0,
            test_mode: false,
            allow_invalid_certs: false,
        }
        .into_terminal(cipher)
        .expect("terminal")
    }

    async fn core_with_bin(bin_info: Option<BinInfo>) -> (PaymentsCore, Terminal) {
        let cipher = FieldCipher::new(MASTER_KEY);
        let db = Arc::new(MockDb::new(cipher.clone()));
        let terminal = db
            .insert_terminal(garanti_terminal(&cipher))
            .await
            .expect("insert terminal");
        let core = PaymentsCore {
            terminals: db.clone(),
            transactions: db,
            bin_resolver: Arc::new(StaticBinResolver(bin_info)),
            cipher,
            session: SessionContext {
                http: HttpClient::new(1).expect("http client"),
                callback_base_url: "https://gateway.example".to_string(),
            },
        };
        (core, terminal)
    }

    fn payment_request() -> PaymentRequest {
        PaymentRequest {
            pos_id: None,
            amount: 150.00,
            currency: Currency::Try,
            installment: Some(1),
            card: CardRequest {
                holder: "AD SOYAD".to_string(),
                number: "4282209004348016".to_string(),
                expiry: "03/28".to_string(),
                cvv: "358".to_string(),
            },
            customer: None,
            external_id: None,
            company: None,
        }
    }

    #[tokio::test]
    async fn create_payment_moves_pending_to_processing() {
        let (core, _) = core_with_bin(None).await;
        let response = core
            .create_payment(payment_request(), None)
            .await
            .expect("payment created");

        assert!(response.success);
        assert!(response.form_url.ends_with(&format!(
            "/payment/{}/form",
            response.transaction_id
        )));

        let tx = core
            .transactions
            .find_transaction_by_id(&response.transaction_id)
            .await
            .expect("transaction");
        assert_eq!(tx.status, TransactionStatus::Processing);
        assert_eq!(tx.secure.provider, Some(ProviderKind::Garanti));
        let form_data = tx.secure.form_data.as_ref().expect("form data");
        assert!(form_data
            .get("fields")
            .and_then(|f| f.get("secure3dhash"))
            .is_some());
        assert!(!tx.logs.is_empty());
    }

    #[tokio::test]
    async fn foreign_currency_is_gated_for_domestic_cards() {
        let bin_info = BinInfo {
            country: Some("tr".to_string()),
            ..Default::default()
        };
        let (core, _) = core_with_bin(Some(bin_info)).await;
        let mut request = payment_request();
        request.currency = Currency::Usd;

        let error = core
            .create_payment(request, None)
            .await
            .expect_err("must be rejected");
        assert!(matches!(
            error.current_context(),
            ApiErrorResponse::Validation { .. }
        ));
    }

    #[tokio::test]
    async fn form_is_served_only_while_processing() {
        let (core, _) = core_with_bin(None).await;
        let response = core
            .create_payment(payment_request(), None)
            .await
            .expect("payment created");

        let html = core
            .get_payment_form(&response.transaction_id)
            .await
            .expect("form html");
        assert!(html.contains("gt3dengine"));
        assert!(html.contains("4282209004348016"));
        assert!(html.contains("document.forms[0].submit()"));

        // Force a terminal state and assert the form is refused.
        core.transactions
            .update_transaction_status(
                &response.transaction_id,
                &[TransactionStatus::Processing],
                TransactionStatus::Failed,
            )
            .await
            .expect("status update");
        let error = core
            .get_payment_form(&response.transaction_id)
            .await
            .expect_err("state error");
        assert!(matches!(
            error.current_context(),
            ApiErrorResponse::State { .. }
        ));
    }

    #[tokio::test]
    async fn rejected_md_status_fails_the_payment() {
        let (core, _) = core_with_bin(None).await;
        let response = core
            .create_payment(payment_request(), None)
            .await
            .expect("payment created");

        let mut fields = std::collections::HashMap::new();
        fields.insert("mdstatus".to_string(), "0".to_string());
        fields.insert(
            "mderrormessage".to_string(),
            "Authentication failed".to_string(),
        );

        let outcome = core
            .process_callback(&response.transaction_id, &fields)
            .await
            .expect("callback processed");
        assert!(!outcome.success);
        assert_eq!(outcome.status, TransactionStatus::Failed);
        assert_eq!(outcome.code.as_deref(), Some("0"));
        assert_eq!(outcome.message.as_deref(), Some("Authentication failed"));

        let tx = core
            .transactions
            .find_transaction_by_id(&response.transaction_id)
            .await
            .expect("transaction");
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert!(tx.completed_at.is_some());
    }

    #[tokio::test]
    async fn duplicate_callback_returns_persisted_outcome_unchanged() {
        let (core, _) = core_with_bin(None).await;
        let response = core
            .create_payment(payment_request(), None)
            .await
            .expect("payment created");

        let mut fields = std::collections::HashMap::new();
        fields.insert("mdstatus".to_string(), "0".to_string());

        let first = core
            .process_callback(&response.transaction_id, &fields)
            .await
            .expect("first callback");
        let logs_after_first = core
            .transactions
            .find_transaction_by_id(&response.transaction_id)
            .await
            .expect("transaction")
            .logs
            .len();

        let second = core
            .process_callback(&response.transaction_id, &fields)
            .await
            .expect("second callback");
        let tx = core
            .transactions
            .find_transaction_by_id(&response.transaction_id)
            .await
            .expect("transaction");

        assert_eq!(second.status, first.status);
        assert_eq!(second.code, first.code);
        assert_eq!(tx.logs.len(), logs_after_first, "no log growth on replay");
    }

    #[tokio::test]
    async fn unknown_transaction_is_not_found() {
        let (core, _) = core_with_bin(None).await;
        let error = core
            .get_transaction_status("missing")
            .await
            .expect_err("not found");
        assert!(matches!(
            error.current_context(),
            ApiErrorResponse::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn status_projection_hides_card_secrets() {
        let (core, _) = core_with_bin(None).await;
        let response = core
            .create_payment(payment_request(), None)
            .await
            .expect("payment created");

        let status = core
            .get_transaction_status(&response.transaction_id)
            .await
            .expect("status");
        let value = serde_json::to_value(&status).expect("serialize");

        let card = value
            .get("transaction")
            .and_then(|tx| tx.get("card"))
            .and_then(|card| card.as_object())
            .expect("card projection");
        assert_eq!(
            card.keys().collect::<Vec<_>>(),
            vec!["masked", "bin"],
            "only the masked view and BIN may leave the service"
        );
        assert_eq!(
            card.get("masked").and_then(|m| m.as_str()),
            Some("4282 20** **** 8016")
        );
        assert!(value.get("transaction").and_then(|tx| tx.get("secure")).is_none());
    }

    #[test]
    fn installment_options_boundaries() {
        let cipher = FieldCipher::new(MASTER_KEY);
        let mut terminal = garanti_terminal(&cipher);
        terminal.installment.enabled = true;
        terminal.installment.max_count = 6;
        terminal.installment.min_amount = MinorUnit::new(10000);

        // TRY credit above the minimum: full spread.
        let options = installment_options(
            MinorUnit::new(15000),
            Currency::Try,
            Some(CardType::Credit),
            &terminal,
        );
        assert_eq!(
            options.iter().map(|o| o.count).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5, 6]
        );
        assert!(options.iter().all(|o| (o.amount - 150.0).abs() < f64::EPSILON));

        // Below the minimum: single shot only.
        let options = installment_options(
            MinorUnit::new(5000),
            Currency::Try,
            Some(CardType::Credit),
            &terminal,
        );
        assert_eq!(options.len(), 1);

        // Non-TRY: single shot only.
        let options = installment_options(
            MinorUnit::new(15000),
            Currency::Usd,
            Some(CardType::Credit),
            &terminal,
        );
        assert_eq!(options.len(), 1);

        // Debit: single shot only.
        let options = installment_options(
            MinorUnit::new(15000),
            Currency::Try,
            Some(CardType::Debit),
            &terminal,
        );
        assert_eq!(options.len(), 1);
    }
}
