//! Garanti BBVA GVPS adapter, interface version 512.
//!
//! The 3-D flow is gate-hosted: the form posts straight to the bank's
//! 3-D engine with a SHA-512 hash chain; provisioning is an ISO-8859-9
//! XML exchange against the VPServlet.

pub mod transformers;

use common_enums::{ProviderKind, TransactionLogType};
use common_utils::{
    errors::CustomResult,
    ext_traits::Encode,
    request::{ContentType, Method, RequestBuilder},
};
use error_stack::ResultExt;
use masking::PeekInterface;
use sanalpos_domain_models::{Terminal, TerminalAuth, Transaction};
use serde_json::json;
use transformers as garanti;

use crate::{
    api::{Capabilities, ConnectorError, ProviderAdapter},
    types::{AttemptOutcome, CallbackFields, PaymentFlowData, SessionContext},
    utils,
};

const XML_ENCODING: &str = "ISO-8859-9";
const DEFAULT_ACCEPTED_MD_STATUSES: &[&str] = &["1"];

#[derive(Clone, Debug)]
pub struct Garanti;

impl Garanti {
    pub const fn new() -> Self {
        Self
    }

    fn gate_url(&self, terminal: &Terminal) -> &'static str {
        if terminal.test_mode {
            "https://sanalposprovtest.garantibbva.com.tr/servlet/gt3dengine"
        } else {
            "https://sanalposprov.garanti.com.tr/servlet/gt3dengine"
        }
    }

    fn api_url(&self, terminal: &Terminal) -> &'static str {
        if terminal.test_mode {
            "https://sanalposprovtest.garantibbva.com.tr/VPServlet"
        } else {
            "https://sanalposprov.garanti.com.tr/VPServlet"
        }
    }

    async fn send_gvps(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        request: &garanti::GvpsRequest,
        log_type: TransactionLogType,
    ) -> CustomResult<garanti::GvpsResponse, ConnectorError> {
        let body = utils::XmlSerializer::serialize_to_xml_bytes(request, "1.0", Some(XML_ENCODING))?;
        let request_log = request
            .encode_to_value()
            .change_context(ConnectorError::RequestEncodingFailed)?;

        let http_request = RequestBuilder::new()
            .method(Method::Post)
            .url(self.api_url(flow.terminal))
            .content_type(ContentType::Xml)
            .encoded_body(body)
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
        let parsed: garanti::GvpsResponse = utils::deserialize_xml_to_struct(&response.body)?;
        let response_log = parsed
            .encode_to_value()
            .unwrap_or_else(|_| json!({"raw": String::from_utf8_lossy(&response.body)}));
        flow.log(log_type, request_log, response_log);
        Ok(parsed)
    }

    #[allow(clippy::too_many_arguments)]
    fn provision_request(
        &self,
        flow: &PaymentFlowData<'_>,
        auth: &garanti::GarantiAuthType,
        txn_type: &str,
        order_id: &str,
        card: garanti::GvpsCard,
        card_number_for_hash: &str,
        secure_3d: Option<garanti::GvpsSecure3d>,
        original_retref_num: Option<String>,
    ) -> CustomResult<garanti::GvpsRequest, ConnectorError> {
        let tx = &*flow.transaction;
        let hash = garanti::provision_hash(
            auth,
            order_id,
            card_number_for_hash,
            tx.amount,
            tx.currency,
        )?;
        let (ip, email) = customer_of(tx);
        let three_ds = secure_3d.is_some();

        Ok(garanti::GvpsRequest {
            mode: garanti::mode(flow.terminal.test_mode).to_string(),
            version: garanti::API_VERSION.to_string(),
            terminal: garanti::GvpsTerminal {
                prov_user_id: auth.prov_user_id.clone(),
                hash_data: hash,
                user_id: auth.prov_user_id.clone(),
                id: auth.terminal_id.clone(),
                merchant_id: auth.merchant_id.clone(),
            },
            customer: garanti::GvpsCustomer {
                ip_address: ip,
                email_address: email,
            },
            card,
            order: garanti::GvpsOrder {
                order_id: order_id.to_string(),
            },
            transaction: garanti::GvpsTransaction {
                txn_type: txn_type.to_string(),
                installment_cnt: utils::installment_or_empty(tx.installment),
                amount: utils::amount_cents_string(tx.amount),
                currency_code: tx.currency.iso_numeric_code().to_string(),
                cardholder_present_code: if three_ds { "13" } else { "0" }.to_string(),
                moto_ind: if three_ds { "N" } else { "H" }.to_string(),
                original_retref_num,
                secure_3d,
            },
        })
    }

    fn outcome_of(&self, response: &garanti::GvpsResponse) -> AttemptOutcome {
        if response.is_approved() {
            AttemptOutcome::Approved {
                auth_code: response.transaction.auth_code.clone(),
                ref_number: response.transaction.retref_num.clone(),
            }
        } else {
            AttemptOutcome::declined(response.error_code(), response.error_message())
        }
    }
}

fn customer_of(tx: &Transaction) -> (String, String) {
    let ip = tx
        .customer
        .as_ref()
        .and_then(|c| c.ip.clone())
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let email = tx
        .customer
        .as_ref()
        .and_then(|c| c.email.clone())
        .unwrap_or_default();
    (ip, email)
}

#[async_trait::async_trait]
impl ProviderAdapter for Garanti {
    fn id(&self) -> &'static str {
        "garanti"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            three_ds: true,
            direct: true,
            refund: true,
            cancel: true,
            status: true,
            history: false,
            pre_auth: true,
            post_auth: true,
        }
    }

    async fn initialize(
        &self,
        _ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = garanti::GarantiAuthType::try_from(flow.auth)?;
        let installment = utils::installment_or_empty(flow.transaction.installment);
        let hash = garanti::three_d_hash(
            &auth,
            &flow.transaction.id,
            flow.transaction.amount,
            flow.transaction.currency,
            &flow.callback_url,
            &flow.callback_url,
            &installment,
        )?;

        let tx = &mut *flow.transaction;
        let (ip, email) = customer_of(tx);
        let fields = vec![
            ("mode".to_string(), garanti::mode(flow.terminal.test_mode).to_string()),
            ("apiversion".to_string(), garanti::API_VERSION.to_string()),
            ("secure3dsecuritylevel".to_string(), "3D".to_string()),
            (
                "terminalprovuserid".to_string(),
                auth.prov_user_id.peek().clone(),
            ),
            ("terminaluserid".to_string(), auth.prov_user_id.peek().clone()),
            (
                "terminalmerchantid".to_string(),
                auth.merchant_id.peek().clone(),
            ),
            ("terminalid".to_string(), auth.terminal_id.peek().clone()),
            ("orderid".to_string(), tx.id.clone()),
            ("customeremailaddress".to_string(), email),
            ("customeripaddress".to_string(), ip),
            ("txnamount".to_string(), utils::amount_cents_string(tx.amount)),
            (
                "txncurrencycode".to_string(),
                tx.currency.iso_numeric_code().to_string(),
            ),
            ("txninstallmentcount".to_string(), installment),
            ("successurl".to_string(), flow.callback_url.clone()),
            ("errorurl".to_string(), flow.callback_url.clone()),
            ("txntype".to_string(), garanti::TXN_TYPE_SALES.to_string()),
            ("lang".to_string(), "tr".to_string()),
            ("secure3dhash".to_string(), hash),
        ];

        let field_map: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        tx.secure.provider = Some(ProviderKind::Garanti);
        tx.secure.form_data = Some(json!({
            "endpoint": self.gate_url(flow.terminal),
            "fields": field_map,
        }));

        let request_log = utils::redact_form_fields(&fields, &[]);
        flow.log(
            TransactionLogType::Init,
            request_log,
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
        fields.push(("cardnumber".to_string(), card.number.peek().clone()));
        fields.push((
            "cardexpiredatemonth".to_string(),
            card.exp_month.peek().clone(),
        ));
        fields.push((
            "cardexpiredateyear".to_string(),
            card.exp_year.peek().clone(),
        ));
        fields.push(("cardcvv2".to_string(), card.cvv.peek().clone()));

        Ok(utils::build_auto_submit_form(endpoint, &fields))
    }

    async fn process_callback(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        fields: &CallbackFields,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let md_status = fields
            .get("mdstatus")
            .cloned()
            .ok_or(ConnectorError::InvalidCallbackPayload)?;

        {
            let tx = &mut *flow.transaction;
            tx.secure.md = fields.get("md").cloned();
            tx.secure.xid = fields.get("xid").cloned();
            tx.secure.eci = fields.get("eci").cloned();
            tx.secure.cavv = fields.get("cavv").cloned();
        }

        let field_pairs: Vec<(String, String)> =
            fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        flow.log(
            TransactionLogType::ThreeDCallback,
            utils::redact_form_fields(&field_pairs, &["cardnumber", "cardcvv2"]),
            json!({"mdstatus": md_status}),
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
                .get("mderrormessage")
                .or_else(|| fields.get("errmsg"))
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
        let auth = garanti::GarantiAuthType::try_from(flow.auth)?;
        let md = flow
            .transaction
            .secure
            .md
            .clone()
            .ok_or(ConnectorError::MissingFlowState("3d"))?;
        let secure_3d = garanti::GvpsSecure3d {
            authentication_code: flow.transaction.secure.cavv.clone().unwrap_or_default(),
            security_level: flow.transaction.secure.eci.clone().unwrap_or_default(),
            txn_id: flow.transaction.secure.xid.clone().unwrap_or_default(),
            md,
        };

        let order_id = flow.transaction.id.clone();
        let request = self.provision_request(
            flow,
            &auth,
            garanti::TXN_TYPE_SALES,
            &order_id,
            garanti::GvpsCard::default(),
            "",
            Some(secure_3d),
            None,
        )?;
        let response = self
            .send_gvps(ctx, flow, &request, TransactionLogType::Provision)
            .await?;
        Ok(self.outcome_of(&response))
    }

    async fn direct_payment(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = garanti::GarantiAuthType::try_from(flow.auth)?;
        let card = flow.card_required()?;
        let gvps_card = garanti::GvpsCard {
            number: card.number.clone(),
            expire_date: card.expiry_mmyy().into(),
            cvv2: card.cvv.clone(),
        };
        let card_number = card.number.peek().clone();

        let order_id = flow.transaction.id.clone();
        let request = self.provision_request(
            flow,
            &auth,
            garanti::TXN_TYPE_SALES,
            &order_id,
            gvps_card,
            &card_number,
            None,
            None,
        )?;
        let response = self
            .send_gvps(ctx, flow, &request, TransactionLogType::Provision)
            .await?;
        Ok(self.outcome_of(&response))
    }

    async fn refund(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        original: &Transaction,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let mut auth = garanti::GarantiAuthType::try_from(flow.auth)?;
        // Inverse operations run under the refund provisioning user.
        auth.prov_user_id = masking::Secret::new("PROVRFN".to_string());

        let request = self.provision_request(
            flow,
            &auth,
            "refund",
            &original.id,
            garanti::GvpsCard::default(),
            "",
            None,
            None,
        )?;
        let response = self
            .send_gvps(ctx, flow, &request, TransactionLogType::Refund)
            .await?;
        Ok(self.outcome_of(&response))
    }

    async fn cancel(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        original: &Transaction,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let mut auth = garanti::GarantiAuthType::try_from(flow.auth)?;
        auth.prov_user_id = masking::Secret::new("PROVRFN".to_string());
        let retref = original
            .result
            .as_ref()
            .and_then(|result| result.ref_number.clone());

        let request = self.provision_request(
            flow,
            &auth,
            "void",
            &original.id,
            garanti::GvpsCard::default(),
            "",
            None,
            retref,
        )?;
        let response = self
            .send_gvps(ctx, flow, &request, TransactionLogType::Cancel)
            .await?;
        Ok(self.outcome_of(&response))
    }

    async fn pre_auth(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = garanti::GarantiAuthType::try_from(flow.auth)?;
        let card = flow.card_required()?;
        let gvps_card = garanti::GvpsCard {
            number: card.number.clone(),
            expire_date: card.expiry_mmyy().into(),
            cvv2: card.cvv.clone(),
        };
        let card_number = card.number.peek().clone();

        let order_id = flow.transaction.id.clone();
        let request = self.provision_request(
            flow,
            &auth,
            "preauth",
            &order_id,
            gvps_card,
            &card_number,
            None,
            None,
        )?;
        let response = self
            .send_gvps(ctx, flow, &request, TransactionLogType::PreAuth)
            .await?;
        Ok(self.outcome_of(&response))
    }

    async fn post_auth(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        original: &Transaction,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = garanti::GarantiAuthType::try_from(flow.auth)?;

        let request = self.provision_request(
            flow,
            &auth,
            "postauth",
            &original.id,
            garanti::GvpsCard::default(),
            "",
            None,
            None,
        )?;
        let response = self
            .send_gvps(ctx, flow, &request, TransactionLogType::PostAuth)
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
        let auth = garanti::GarantiAuthType::try_from(auth)?;
        let hash = garanti::provision_hash(
            &auth,
            order_id,
            "",
            common_utils::types::MinorUnit::new(0),
            common_enums::Currency::Try,
        )?;
        let request = garanti::GvpsRequest {
            mode: garanti::mode(terminal.test_mode).to_string(),
            version: garanti::API_VERSION.to_string(),
            terminal: garanti::GvpsTerminal {
                prov_user_id: auth.prov_user_id.clone(),
                hash_data: hash,
                user_id: auth.prov_user_id.clone(),
                id: auth.terminal_id.clone(),
                merchant_id: auth.merchant_id.clone(),
            },
            customer: garanti::GvpsCustomer {
                ip_address: "127.0.0.1".to_string(),
                email_address: String::new(),
            },
            card: garanti::GvpsCard::default(),
            order: garanti::GvpsOrder {
                order_id: order_id.to_string(),
            },
            transaction: garanti::GvpsTransaction {
                txn_type: "orderinq".to_string(),
                installment_cnt: String::new(),
                amount: "0".to_string(),
                currency_code: common_enums::Currency::Try.iso_numeric_code().to_string(),
                cardholder_present_code: "0".to_string(),
                moto_ind: "N".to_string(),
                original_retref_num: None,
                secure_3d: None,
            },
        };

        let body = utils::XmlSerializer::serialize_to_xml_bytes(&request, "1.0", Some(XML_ENCODING))?;
        let http_request = RequestBuilder::new()
            .method(Method::Post)
            .url(self.api_url(terminal))
            .content_type(ContentType::Xml)
            .encoded_body(body)
            .allow_invalid_certs(terminal.allow_invalid_certs)
            .build();
        let response = ctx.http.send(http_request).await?;
        let parsed: garanti::GvpsResponse = utils::deserialize_xml_to_struct(&response.body)?;
        parsed
            .encode_to_value()
            .change_context(ConnectorError::ResponseDeserializationFailed)
    }
}
