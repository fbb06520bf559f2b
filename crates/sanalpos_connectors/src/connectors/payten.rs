//! Payten (NestPay/EST) adapter covering the banks that run the shared
//! gateway: Halkbank, İş Bankası, Ziraat, TEB, ING, Şekerbank.
//!
//! The 3-D form is gate-hosted and protected by the "hash version 3"
//! scheme; provisioning is a `CC5Request` XML exchange.

pub mod transformers;

use common_enums::{ProviderKind, TransactionLogType};
use common_utils::{
    errors::CustomResult,
    ext_traits::Encode,
    request::{ContentType, Method, RequestBuilder},
};
use error_stack::ResultExt;
use masking::PeekInterface;
use rand::Rng;
use sanalpos_domain_models::{Terminal, TerminalAuth, Transaction};
use serde_json::json;
use transformers as payten;

use crate::{
    api::{Capabilities, ConnectorError, ProviderAdapter},
    types::{AttemptOutcome, CallbackFields, PaymentFlowData, SessionContext},
    utils,
};

/// The gateway treats 1 (full authentication) and 2/3/4 (attempt /
/// half-secure) as provisionable. Terminals can narrow the set.
const DEFAULT_ACCEPTED_MD_STATUSES: &[&str] = &["1", "2", "3", "4"];

#[derive(Clone, Debug)]
pub struct Payten;

impl Payten {
    pub const fn new() -> Self {
        Self
    }

    fn api_url(&self, terminal: &Terminal) -> CustomResult<String, ConnectorError> {
        payten::endpoints(terminal.bank_code, terminal.test_mode).map(|(_, api)| api)
    }

    fn gate_url(&self, terminal: &Terminal) -> CustomResult<String, ConnectorError> {
        payten::endpoints(terminal.bank_code, terminal.test_mode).map(|(gate, _)| gate)
    }

    async fn send_cc5(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        request: &payten::Cc5Request,
        log_type: TransactionLogType,
    ) -> CustomResult<payten::Cc5Response, ConnectorError> {
        let body = utils::XmlSerializer::serialize_to_xml_string(request, "1.0", Some("UTF-8"))?;
        let request_log = request
            .encode_to_value()
            .change_context(ConnectorError::RequestEncodingFailed)?;

        let http_request = RequestBuilder::new()
            .method(Method::Post)
            .url(&self.api_url(flow.terminal)?)
            .content_type(ContentType::Xml)
            .body(Some(body))
            .allow_invalid_certs(flow.terminal.allow_invalid_certs)
            .build();

        let response = match ctx.http.send(http_request).await {
            Ok(response) => response,
            Err(error) => {
                flow.log(
                    TransactionLogType::Error,
                    request_log,
                    json!({"error": "network failure"}),
                );
                return Err(error);
            }
        };
        let parsed: payten::Cc5Response = utils::deserialize_xml_to_struct(&response.body)?;
        let response_log = parsed
            .encode_to_value()
            .unwrap_or_else(|_| json!({"raw": String::from_utf8_lossy(&response.body)}));
        flow.log(log_type, request_log, response_log);
        Ok(parsed)
    }

    fn outcome_of(&self, response: &payten::Cc5Response) -> AttemptOutcome {
        if response.is_approved() {
            AttemptOutcome::Approved {
                auth_code: response.auth_code.clone(),
                ref_number: response.host_ref_num.clone(),
            }
        } else {
            AttemptOutcome::declined(response.error_code(), response.error_message())
        }
    }
}

fn random_nonce() -> String {
    format!("{:08}", rand::thread_rng().gen_range(0..100_000_000u32))
}

#[async_trait::async_trait]
impl ProviderAdapter for Payten {
    fn id(&self) -> &'static str {
        "payten"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            three_ds: true,
            direct: true,
            refund: true,
            cancel: true,
            status: true,
            history: true,
            pre_auth: true,
            post_auth: true,
        }
    }

    async fn initialize(
        &self,
        _ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = payten::PaytenAuthType::try_from(flow.auth)?;
        let gate_url = self.gate_url(flow.terminal)?;

        let tx = &mut *flow.transaction;
        let fields = vec![
            ("clientid".to_string(), auth.client_id.peek().clone()),
            ("storetype".to_string(), payten::STORE_TYPE.to_string()),
            (
                "hashAlgorithm".to_string(),
                payten::HASH_ALGORITHM.to_string(),
            ),
            ("islemtipi".to_string(), "Auth".to_string()),
            ("amount".to_string(), utils::amount_major_string(tx.amount)),
            (
                "currency".to_string(),
                tx.currency.iso_numeric_code().to_string(),
            ),
            ("oid".to_string(), tx.id.clone()),
            ("okUrl".to_string(), flow.callback_url.clone()),
            ("failUrl".to_string(), flow.callback_url.clone()),
            ("lang".to_string(), "tr".to_string()),
            ("rnd".to_string(), random_nonce()),
            (
                "taksit".to_string(),
                utils::installment_or_empty(tx.installment),
            ),
        ];

        let field_map: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        tx.secure.provider = Some(ProviderKind::Payten);
        tx.secure.form_data = Some(json!({
            "endpoint": gate_url,
            "fields": field_map,
        }));

        flow.log(
            TransactionLogType::Init,
            utils::redact_form_fields(&fields, &[]),
            json!({"prepared": true}),
        );

        Ok(AttemptOutcome::Pending)
    }

    fn get_form_html(
        &self,
        flow: &PaymentFlowData<'_>,
    ) -> CustomResult<String, ConnectorError> {
        let auth = payten::PaytenAuthType::try_from(flow.auth)?;
        let form_data = flow
            .transaction
            .secure
            .form_data
            .as_ref()
            .ok_or(ConnectorError::MissingFlowState("form"))?;
        let endpoint = form_data
            .get("endpoint")
            .and_then(|v| v.as_str())
            .ok_or(ConnectorError::MissingFlowState("form"))?;
        let mut fields: Vec<(String, String)> = form_data
            .get("fields")
            .and_then(|v| v.as_object())
            .ok_or(ConnectorError::MissingFlowState("form"))?
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect();

        let card = flow.card_required()?;
        fields.push(("pan".to_string(), card.number.peek().clone()));
        fields.push((
            "Ecom_Payment_Card_ExpDate_Month".to_string(),
            card.exp_month.peek().clone(),
        ));
        fields.push((
            "Ecom_Payment_Card_ExpDate_Year".to_string(),
            card.exp_year.peek().clone(),
        ));
        fields.push(("cv2".to_string(), card.cvv.peek().clone()));

        // Hash version 3 covers every posted field, card included, so it
        // is computed at form time.
        let hash = payten::hash_ver3(&fields, auth.store_key.peek())?;
        fields.push(("hash".to_string(), hash));

        Ok(utils::build_auto_submit_form(endpoint, &fields))
    }

    async fn process_callback(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        fields: &CallbackFields,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = payten::PaytenAuthType::try_from(flow.auth)?;
        let field_pairs: Vec<(String, String)> =
            fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let posted_hash = fields
            .get("HASH")
            .or_else(|| fields.get("hash"))
            .cloned()
            .ok_or(ConnectorError::InvalidCallbackPayload)?;
        if !payten::verify_callback_hash(&field_pairs, auth.store_key.peek(), &posted_hash)? {
            return Err(ConnectorError::InvalidCallbackPayload.into());
        }

        let md_status = fields
            .get("mdStatus")
            .cloned()
            .ok_or(ConnectorError::InvalidCallbackPayload)?;

        {
            let tx = &mut *flow.transaction;
            tx.secure.md = fields.get("md").cloned();
            tx.secure.xid = fields.get("xid").cloned();
            tx.secure.eci = fields.get("eci").cloned();
            tx.secure.cavv = fields.get("cavv").cloned();
        }

        flow.log(
            TransactionLogType::ThreeDCallback,
            utils::redact_form_fields(&field_pairs, &["pan", "cv2"]),
            json!({"mdStatus": md_status}),
        );

        let accepted = flow
            .terminal
            .three_ds
            .accepted_md_statuses
            .clone()
            .unwrap_or_else(|| {
                DEFAULT_ACCEPTED_MD_STATUSES
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            });
        if !accepted.contains(&md_status) {
            let message = fields
                .get("mdErrorMsg")
                .or_else(|| fields.get("ErrMsg"))
                .cloned()
                .unwrap_or_else(|| "3-D authentication failed".to_string());
            return Ok(AttemptOutcome::declined(md_status, message));
        }

        self.process_provision(ctx, flow).await
    }

    async fn process_provision(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = payten::PaytenAuthType::try_from(flow.auth)?;
        let md = flow
            .transaction
            .secure
            .md
            .clone()
            .ok_or(ConnectorError::MissingFlowState("3d"))?;

        let tx = &*flow.transaction;
        let mut request = payten::build_provision_request(
            &auth,
            payten::PaytenTxnType::Auth,
            &tx.id,
            Some(utils::amount_major_string(tx.amount)),
            Some(tx.currency.iso_numeric_code().to_string()),
            Some(utils::installment_or_empty(tx.installment)),
        );
        request.number = Some(masking::Secret::new(md));
        request.payer_txn_id = tx.secure.xid.clone();
        request.payer_security_level = tx.secure.eci.clone();
        request.payer_authentication_code = tx.secure.cavv.clone();

        let response = self
            .send_cc5(ctx, flow, &request, TransactionLogType::Provision)
            .await?;
        Ok(self.outcome_of(&response))
    }

    async fn direct_payment(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = payten::PaytenAuthType::try_from(flow.auth)?;
        let card = flow.card_required()?;
        let tx = &*flow.transaction;

        let mut request = payten::build_provision_request(
            &auth,
            payten::PaytenTxnType::Auth,
            &tx.id,
            Some(utils::amount_major_string(tx.amount)),
            Some(tx.currency.iso_numeric_code().to_string()),
            Some(utils::installment_or_empty(tx.installment)),
        );
        request.number = Some(card.number.clone());
        request.expires = Some(masking::Secret::new(format!(
            "{}/{}",
            card.exp_month.peek(),
            card.exp_year.peek()
        )));
        request.cvv2_val = Some(card.cvv.clone());

        let response = self
            .send_cc5(ctx, flow, &request, TransactionLogType::Provision)
            .await?;
        Ok(self.outcome_of(&response))
    }

    async fn refund(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        original: &Transaction,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = payten::PaytenAuthType::try_from(flow.auth)?;
        let request = payten::build_provision_request(
            &auth,
            payten::PaytenTxnType::Credit,
            &original.id,
            Some(utils::amount_major_string(flow.transaction.amount)),
            Some(flow.transaction.currency.iso_numeric_code().to_string()),
            None,
        );
        let response = self
            .send_cc5(ctx, flow, &request, TransactionLogType::Refund)
            .await?;
        Ok(self.outcome_of(&response))
    }

    async fn cancel(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        original: &Transaction,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = payten::PaytenAuthType::try_from(flow.auth)?;
        let request = payten::build_provision_request(
            &auth,
            payten::PaytenTxnType::Void,
            &original.id,
            None,
            None,
            None,
        );
        let response = self
            .send_cc5(ctx, flow, &request, TransactionLogType::Cancel)
            .await?;
        Ok(self.outcome_of(&response))
    }

    async fn pre_auth(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = payten::PaytenAuthType::try_from(flow.auth)?;
        let card = flow.card_required()?;
        let tx = &*flow.transaction;

        let mut request = payten::build_provision_request(
            &auth,
            payten::PaytenTxnType::PreAuth,
            &tx.id,
            Some(utils::amount_major_string(tx.amount)),
            Some(tx.currency.iso_numeric_code().to_string()),
            Some(utils::installment_or_empty(tx.installment)),
        );
        request.number = Some(card.number.clone());
        request.expires = Some(masking::Secret::new(format!(
            "{}/{}",
            card.exp_month.peek(),
            card.exp_year.peek()
        )));
        request.cvv2_val = Some(card.cvv.clone());

        let response = self
            .send_cc5(ctx, flow, &request, TransactionLogType::PreAuth)
            .await?;
        Ok(self.outcome_of(&response))
    }

    async fn post_auth(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        original: &Transaction,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = payten::PaytenAuthType::try_from(flow.auth)?;
        let request = payten::build_provision_request(
            &auth,
            payten::PaytenTxnType::PostAuth,
            &original.id,
            Some(utils::amount_major_string(flow.transaction.amount)),
            None,
            None,
        );
        let response = self
            .send_cc5(ctx, flow, &request, TransactionLogType::PostAuth)
            .await?;
        Ok(self.outcome_of(&response))
    }

    async fn status(
        &self,
        ctx: &SessionContext,
        terminal: &Terminal,
        auth: &TerminalAuth,
        order_id: &str,
    ) -> CustomResult<serde_json::Value, ConnectorError> {
        self.query(ctx, terminal, auth, order_id, payten::PaytenTxnType::OrderInquiry)
            .await
    }

    async fn history(
        &self,
        ctx: &SessionContext,
        terminal: &Terminal,
        auth: &TerminalAuth,
        order_id: &str,
    ) -> CustomResult<serde_json::Value, ConnectorError> {
        self.query(ctx, terminal, auth, order_id, payten::PaytenTxnType::OrderHistory)
            .await
    }
}

impl Payten {
    async fn query(
        &self,
        ctx: &SessionContext,
        terminal: &Terminal,
        auth: &TerminalAuth,
        order_id: &str,
        txn_type: payten::PaytenTxnType,
    ) -> CustomResult<serde_json::Value, ConnectorError> {
        let auth = payten::PaytenAuthType::try_from(auth)?;
        let request =
            payten::build_provision_request(&auth, txn_type, order_id, None, None, None);
        let body = utils::XmlSerializer::serialize_to_xml_string(&request, "1.0", Some("UTF-8"))?;

        let http_request = RequestBuilder::new()
            .method(Method::Post)
            .url(&self.api_url(terminal)?)
            .content_type(ContentType::Xml)
            .body(Some(body))
            .allow_invalid_certs(terminal.allow_invalid_certs)
            .build();
        let response = ctx.http.send(http_request).await?;
        let parsed: payten::Cc5Response = utils::deserialize_xml_to_struct(&response.body)?;
        parsed
            .encode_to_value()
            .change_context(ConnectorError::ResponseDeserializationFailed)
    }
}
