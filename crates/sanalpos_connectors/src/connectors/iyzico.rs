//! iyzico aggregator adapter.
//!
//! JSON over HTTPS with the IYZWS PKI-string signature. The 3-D form is
//! not built by us: the initialize response carries a base64 HTML
//! document that is stored and served verbatim.

pub mod transformers;

use base64::Engine;
use common_enums::{ProviderKind, TransactionLogType};
use common_utils::{
    consts::BASE64_ENGINE,
    errors::CustomResult,
    ext_traits::Encode,
    request::{ContentType, Method, RequestBuilder},
};
use error_stack::ResultExt;
use sanalpos_domain_models::Terminal;
use serde_json::json;
use transformers as iyzico;

use crate::{
    api::{Capabilities, ConnectorError, ProviderAdapter},
    types::{AttemptOutcome, CallbackFields, PaymentFlowData, SessionContext},
};

#[derive(Clone, Debug)]
pub struct Iyzico;

impl Iyzico {
    pub const fn new() -> Self {
        Self
    }

    fn base_url(&self, terminal: &Terminal) -> &'static str {
        if terminal.test_mode {
            "https://sandbox-api.iyzipay.com"
        } else {
            "https://api.iyzipay.com"
        }
    }

    async fn send_json<Req, Resp>(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        path: &str,
        request: &Req,
        log_type: TransactionLogType,
        redact: &[&str],
    ) -> CustomResult<Resp, ConnectorError>
    where
        Req: serde::Serialize + std::fmt::Debug,
        Resp: serde::de::DeserializeOwned + serde::Serialize + Encode,
    {
        let auth = iyzico::IyzicoAuthType::try_from(flow.auth)?;
        let body_value = request
            .encode_to_value()
            .change_context(ConnectorError::RequestEncodingFailed)?;
        let headers = iyzico::auth_headers(&auth, &body_value)?;
        let body = request
            .encode_to_string_of_json()
            .change_context(ConnectorError::RequestEncodingFailed)?;

        let mut request_log = body_value.clone();
        if let serde_json::Value::Object(map) = &mut request_log {
            if let Some(card) = map.get_mut("paymentCard") {
                for key in redact {
                    if let Some(entry) = card.get_mut(*key) {
                        *entry = serde_json::Value::String("*** redacted ***".to_string());
                    }
                }
            }
        }

        let http_request = RequestBuilder::new()
            .method(Method::Post)
            .url(&format!("{}{path}", self.base_url(flow.terminal)))
            .headers(headers)
            .content_type(ContentType::Json)
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
        let parsed: Resp = serde_json::from_slice(&response.body)
            .change_context(ConnectorError::ResponseDeserializationFailed)?;
        let response_log = parsed
            .encode_to_value()
            .unwrap_or_else(|_| json!({"raw": String::from_utf8_lossy(&response.body)}));
        flow.log(log_type, request_log, response_log);
        Ok(parsed)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for Iyzico {
    fn id(&self) -> &'static str {
        "iyzico"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            three_ds: true,
            direct: false,
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
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let card = flow.card_required()?;
        let request = iyzico::ThreeDsInitializeRequest::new(
            &flow.transaction.id,
            flow.transaction.amount,
            flow.transaction.currency.iso_alpha_code(),
            flow.transaction.installment,
            card,
            flow.transaction.customer.clone().as_ref(),
            &flow.callback_url,
        );

        let response: iyzico::ThreeDsInitializeResponse = self
            .send_json(
                ctx,
                flow,
                "/payment/3dsecure/initialize",
                &request,
                TransactionLogType::Init,
                &["cardNumber", "cvc"],
            )
            .await?;

        if !iyzico::is_success(response.status.as_deref()) {
            return Ok(AttemptOutcome::declined(
                response.error_code.unwrap_or_else(|| "unknown".to_string()),
                response
                    .error_message
                    .unwrap_or_else(|| "initialize failed".to_string()),
            ));
        }

        let html_b64 = response
            .three_ds_html_content
            .ok_or(ConnectorError::ResponseDeserializationFailed)?;
        let html_bytes = BASE64_ENGINE
            .decode(html_b64.trim())
            .change_context(ConnectorError::ResponseDeserializationFailed)?;
        let html = String::from_utf8(html_bytes)
            .change_context(ConnectorError::ResponseDeserializationFailed)?;

        let tx = &mut *flow.transaction;
        tx.secure.provider = Some(ProviderKind::Iyzico);
        tx.secure.html = Some(html);
        tx.secure.form_data = Some(json!({
            "payment_id": response.payment_id,
            "conversation_id": response.conversation_id,
        }));

        Ok(AttemptOutcome::Pending)
    }

    fn get_form_html(
        &self,
        flow: &PaymentFlowData<'_>,
    ) -> CustomResult<String, ConnectorError> {
        flow.transaction
            .secure
            .html
            .clone()
            .ok_or_else(|| ConnectorError::MissingFlowState("form").into())
    }

    async fn process_callback(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        fields: &CallbackFields,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let status = fields
            .get("status")
            .cloned()
            .ok_or(ConnectorError::InvalidCallbackPayload)?;

        {
            let tx = &mut *flow.transaction;
            if let Some(payment_id) = fields.get("paymentId") {
                tx.secure.xid = Some(payment_id.clone());
            }
            tx.secure.md = fields.get("conversationData").cloned();
        }

        let field_pairs: Vec<(String, String)> =
            fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        flow.log(
            TransactionLogType::ThreeDCallback,
            crate::utils::redact_form_fields(&field_pairs, &[]),
            json!({"status": status}),
        );

        if !iyzico::is_success(Some(status.as_str())) {
            let message = fields
                .get("mdStatus")
                .map(|md_status| format!("3-D authentication failed (mdStatus {md_status})"))
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
        let payment_id = flow
            .transaction
            .secure
            .xid
            .clone()
            .or_else(|| {
                flow.transaction
                    .secure
                    .form_data
                    .as_ref()
                    .and_then(|data| data.get("payment_id"))
                    .and_then(|value| value.as_str().map(ToString::to_string))
            })
            .ok_or(ConnectorError::MissingFlowState("3d"))?;

        let request = iyzico::ThreeDsAuthRequest {
            locale: iyzico::LOCALE.to_string(),
            conversation_id: flow.transaction.id.clone(),
            payment_id,
            conversation_data: flow.transaction.secure.md.clone(),
        };

        let response: iyzico::ThreeDsAuthResponse = self
            .send_json(
                ctx,
                flow,
                "/payment/3dsecure/auth",
                &request,
                TransactionLogType::Provision,
                &[],
            )
            .await?;

        if iyzico::is_success(response.status.as_deref()) {
            Ok(AttemptOutcome::Approved {
                auth_code: None,
                ref_number: response.payment_id,
            })
        } else {
            Ok(AttemptOutcome::declined(
                response.error_code.unwrap_or_else(|| "unknown".to_string()),
                response
                    .error_message
                    .unwrap_or_else(|| "provision failed".to_string()),
            ))
        }
    }
}
