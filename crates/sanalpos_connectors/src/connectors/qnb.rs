//! QNB Finansbank PayFor adapter.
//!
//! Gate-hosted 3-D form guarded by a SHA-1 pack-base64 hash; the
//! financial API answers in the semicolon-pair coding
//! (`ProcReturnCode=00;;AuthCode=...`).

pub mod transformers;

use common_enums::{ProviderKind, TransactionLogType};
use common_utils::{
    errors::CustomResult,
    request::{ContentType, Method, RequestBuilder},
};
use masking::PeekInterface;
use sanalpos_domain_models::Terminal;
use serde_json::json;
use transformers as qnb;

use crate::{
    api::{Capabilities, ConnectorError, ProviderAdapter},
    types::{AttemptOutcome, CallbackFields, PaymentFlowData, SessionContext},
    utils,
};

const DEFAULT_ACCEPTED_3D_STATUSES: &[&str] = &["1"];

#[derive(Clone, Debug)]
pub struct Qnb;

impl Qnb {
    pub const fn new() -> Self {
        Self
    }

    fn gate_url(&self, terminal: &Terminal) -> &'static str {
        if terminal.test_mode {
            "https://vpostest.qnbfinansbank.com/Gateway/Default.aspx"
        } else {
            "https://vpos.qnbfinansbank.com/Gateway/Default.aspx"
        }
    }

    fn api_url(&self, terminal: &Terminal) -> &'static str {
        if terminal.test_mode {
            "https://vpostest.qnbfinansbank.com/Gateway/XMLGate.aspx"
        } else {
            "https://vpos.qnbfinansbank.com/Gateway/XMLGate.aspx"
        }
    }

    async fn send_form(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        fields: Vec<(String, String)>,
        log_type: TransactionLogType,
    ) -> CustomResult<std::collections::HashMap<String, String>, ConnectorError> {
        let body = utils::encode_form_fields(&fields)?;
        let request_log = utils::redact_form_fields(&fields, &["Pan", "Cvv2", "UserPass"]);

        let http_request = RequestBuilder::new()
            .method(Method::Post)
            .url(self.api_url(flow.terminal))
            .content_type(ContentType::FormUrlEncoded)
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
        let text = String::from_utf8_lossy(&response.body).into_owned();
        let parsed = utils::parse_semicolon_pairs(&text);
        flow.log(log_type, request_log, json!(parsed));
        Ok(parsed)
    }

    fn outcome_of(&self, parsed: &std::collections::HashMap<String, String>) -> AttemptOutcome {
        let proc_return_code = parsed
            .get("ProcReturnCode")
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());
        if proc_return_code == qnb::PROC_RETURN_APPROVED {
            AttemptOutcome::Approved {
                auth_code: parsed.get("AuthCode").cloned().filter(|c| !c.is_empty()),
                ref_number: parsed
                    .get("HostRefNum")
                    .or_else(|| parsed.get("TransId"))
                    .cloned()
                    .filter(|c| !c.is_empty()),
            }
        } else {
            let message = parsed
                .get("ErrMsg")
                .cloned()
                .filter(|msg| !msg.is_empty())
                .unwrap_or_else(|| "declined".to_string());
            AttemptOutcome::declined(proc_return_code, message)
        }
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for Qnb {
    fn id(&self) -> &'static str {
        "qnb"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            three_ds: true,
            direct: true,
            refund: false,
            cancel: false,
            status: false,
            history: false,
            pre_auth: false,
            post_auth: false,
        }
    }

    async fn initialize(
        &self,
        _ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = qnb::QnbAuthType::try_from(flow.auth)?;
        let tx_amount = utils::amount_major_string(flow.transaction.amount);
        let installment = qnb::installment_count(flow.transaction.installment);
        let rnd = qnb::microtime_rnd();
        let hash = qnb::request_hash(
            &flow.transaction.id,
            &tx_amount,
            &flow.callback_url,
            &flow.callback_url,
            qnb::TXN_TYPE_AUTH,
            &installment,
            &rnd,
            auth.merchant_pass.peek(),
        )?;

        let tx = &mut *flow.transaction;
        let fields = vec![
            ("MbrId".to_string(), qnb::MBR_ID.to_string()),
            ("MerchantID".to_string(), auth.merchant_id.peek().clone()),
            ("UserCode".to_string(), auth.user_code.peek().clone()),
            ("OrderId".to_string(), tx.id.clone()),
            ("Lang".to_string(), "TR".to_string()),
            ("SecureType".to_string(), qnb::SECURE_TYPE_3D.to_string()),
            ("TxnType".to_string(), qnb::TXN_TYPE_AUTH.to_string()),
            ("PurchAmount".to_string(), tx_amount),
            (
                "Currency".to_string(),
                tx.currency.iso_numeric_code().to_string(),
            ),
            ("InstallmentCount".to_string(), installment),
            ("OkUrl".to_string(), flow.callback_url.clone()),
            ("FailUrl".to_string(), flow.callback_url.clone()),
            ("Rnd".to_string(), rnd),
            ("Hash".to_string(), hash),
        ];

        let field_map: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        tx.secure.provider = Some(ProviderKind::Qnb);
        tx.secure.form_data = Some(json!({
            "endpoint": self.gate_url(flow.terminal),
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
        fields.push((
            "CardHolderName".to_string(),
            card.holder.peek().clone(),
        ));
        fields.push(("Pan".to_string(), card.number.peek().clone()));
        fields.push(("Expiry".to_string(), card.expiry_mmyy()));
        fields.push(("Cvv2".to_string(), card.cvv.peek().clone()));

        Ok(utils::build_auto_submit_form(endpoint, &fields))
    }

    async fn process_callback(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        fields: &CallbackFields,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let status = fields
            .get("3DStatus")
            .or_else(|| fields.get("mdStatus"))
            .cloned()
            .ok_or(ConnectorError::InvalidCallbackPayload)?;

        {
            let tx = &mut *flow.transaction;
            tx.secure.md = fields.get("MD").or_else(|| fields.get("md")).cloned();
            tx.secure.xid = fields.get("PayerTxnId").or_else(|| fields.get("Xid")).cloned();
            tx.secure.eci = fields.get("Eci").or_else(|| fields.get("PayerSecurityLevel")).cloned();
            tx.secure.cavv = fields
                .get("Cavv")
                .or_else(|| fields.get("PayerAuthenticationCode"))
                .cloned();
        }

        let field_pairs: Vec<(String, String)> =
            fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        flow.log(
            TransactionLogType::ThreeDCallback,
            utils::redact_form_fields(&field_pairs, &["Pan", "Cvv2"]),
            json!({"3DStatus": status}),
        );

        let accepted = flow
            .terminal
            .three_ds
            .accepted_md_statuses
            .clone()
            .unwrap_or_else(|| {
                DEFAULT_ACCEPTED_3D_STATUSES
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            });
        if !accepted.contains(&status) {
            let message = fields
                .get("ErrMsg")
                .cloned()
                .filter(|msg| !msg.is_empty())
                .unwrap_or_else(|| "3-D authentication failed".to_string());
            return Ok(AttemptOutcome::declined(status, message));
        }

        self.process_provision(ctx, flow).await
    }

    async fn process_provision(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = qnb::QnbAuthType::try_from(flow.auth)?;
        let tx_amount = utils::amount_major_string(flow.transaction.amount);
        let installment = qnb::installment_count(flow.transaction.installment);
        let rnd = qnb::microtime_rnd();
        let hash = qnb::request_hash(
            &flow.transaction.id,
            &tx_amount,
            &flow.callback_url,
            &flow.callback_url,
            qnb::TXN_TYPE_AUTH,
            &installment,
            &rnd,
            auth.merchant_pass.peek(),
        )?;

        let mut fields = vec![
            ("MbrId".to_string(), qnb::MBR_ID.to_string()),
            ("MerchantID".to_string(), auth.merchant_id.peek().clone()),
            ("UserCode".to_string(), auth.user_code.peek().clone()),
            ("UserPass".to_string(), auth.user_pass.peek().clone()),
            ("OrderId".to_string(), flow.transaction.id.clone()),
            ("SecureType".to_string(), qnb::SECURE_TYPE_3D.to_string()),
            ("TxnType".to_string(), qnb::TXN_TYPE_AUTH.to_string()),
            ("PurchAmount".to_string(), tx_amount),
            (
                "Currency".to_string(),
                flow.transaction.currency.iso_numeric_code().to_string(),
            ),
            ("InstallmentCount".to_string(), installment),
            ("Rnd".to_string(), rnd),
            ("Hash".to_string(), hash),
        ];
        if let Some(xid) = flow.transaction.secure.xid.clone() {
            fields.push(("PayerTxnId".to_string(), xid));
        }
        if let Some(eci) = flow.transaction.secure.eci.clone() {
            fields.push(("PayerSecurityLevel".to_string(), eci));
        }
        if let Some(cavv) = flow.transaction.secure.cavv.clone() {
            fields.push(("PayerAuthenticationCode".to_string(), cavv));
        }

        let parsed = self
            .send_form(ctx, flow, fields, TransactionLogType::Provision)
            .await?;
        Ok(self.outcome_of(&parsed))
    }

    async fn direct_payment(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = qnb::QnbAuthType::try_from(flow.auth)?;
        let card = flow.card_required()?;
        let tx_amount = utils::amount_major_string(flow.transaction.amount);
        let installment = qnb::installment_count(flow.transaction.installment);
        let rnd = qnb::microtime_rnd();
        let hash = qnb::request_hash(
            &flow.transaction.id,
            &tx_amount,
            &flow.callback_url,
            &flow.callback_url,
            qnb::TXN_TYPE_AUTH,
            &installment,
            &rnd,
            auth.merchant_pass.peek(),
        )?;

        let fields = vec![
            ("MbrId".to_string(), qnb::MBR_ID.to_string()),
            ("MerchantID".to_string(), auth.merchant_id.peek().clone()),
            ("UserCode".to_string(), auth.user_code.peek().clone()),
            ("UserPass".to_string(), auth.user_pass.peek().clone()),
            ("OrderId".to_string(), flow.transaction.id.clone()),
            (
                "SecureType".to_string(),
                qnb::SECURE_TYPE_NON_SECURE.to_string(),
            ),
            ("TxnType".to_string(), qnb::TXN_TYPE_AUTH.to_string()),
            ("PurchAmount".to_string(), tx_amount),
            (
                "Currency".to_string(),
                flow.transaction.currency.iso_numeric_code().to_string(),
            ),
            ("InstallmentCount".to_string(), installment),
            ("Rnd".to_string(), rnd),
            ("Hash".to_string(), hash),
            ("CardHolderName".to_string(), card.holder.peek().clone()),
            ("Pan".to_string(), card.number.peek().clone()),
            ("Expiry".to_string(), card.expiry_mmyy()),
            ("Cvv2".to_string(), card.cvv.peek().clone()),
        ];

        let parsed = self
            .send_form(ctx, flow, fields, TransactionLogType::Provision)
            .await?;
        Ok(self.outcome_of(&parsed))
    }
}
