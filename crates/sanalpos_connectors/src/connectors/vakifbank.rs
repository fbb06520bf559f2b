//! VakıfBank VPOS adapter.
//!
//! Two-call 3-D: a server-side `VerifyEnrollmentRequest` against the
//! MPI gate yields the ACS coordinates; after the issuer callback the
//! financial call goes to the VPOS API as `prmstr=<VposRequest XML>`.

pub mod transformers;

use common_enums::{ProviderKind, TransactionLogType};
use common_utils::{
    errors::CustomResult,
    ext_traits::Encode,
    request::{ContentType, Method, RequestBuilder},
};
use masking::PeekInterface;
use sanalpos_domain_models::Terminal;
use serde_json::json;
use transformers as vakifbank;

use crate::{
    api::{Capabilities, ConnectorError, ProviderAdapter},
    types::{AttemptOutcome, CallbackFields, PaymentFlowData, SessionContext},
    utils,
};

#[derive(Clone, Debug)]
pub struct Vakifbank;

impl Vakifbank {
    pub const fn new() -> Self {
        Self
    }

    fn enrollment_url(&self, terminal: &Terminal) -> &'static str {
        if terminal.test_mode {
            "https://3dsecuretest.vakifbank.com.tr/MPIAPI/MPI_Enrollment.aspx"
        } else {
            "https://3dsecure.vakifbank.com.tr/MPIAPI/MPI_Enrollment.aspx"
        }
    }

    fn api_url(&self, terminal: &Terminal) -> &'static str {
        if terminal.test_mode {
            "https://onlineodemetest.vakifbank.com.tr:4443/VposService/v3/Vposreq.aspx"
        } else {
            "https://onlineodeme.vakifbank.com.tr:4443/VposService/v3/Vposreq.aspx"
        }
    }

    async fn send_vpos(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        request: &vakifbank::VposRequest,
        log_type: TransactionLogType,
    ) -> CustomResult<vakifbank::VposResponse, ConnectorError> {
        let xml = utils::XmlSerializer::serialize_to_xml_string(request, "1.0", Some("UTF-8"))?;
        let body = utils::encode_form_fields(&[("prmstr".to_string(), xml)])?;
        let request_log = json!({
            "transaction_type": request.transaction_type,
            "transaction_id": request.transaction_id,
            "currency_amount": request.currency_amount,
            "currency_code": request.currency_code,
        });

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
        let parsed: vakifbank::VposResponse = utils::deserialize_xml_to_struct(&response.body)?;
        let response_log = parsed
            .encode_to_value()
            .unwrap_or_else(|_| json!({"raw": String::from_utf8_lossy(&response.body)}));
        flow.log(log_type, request_log, response_log);
        Ok(parsed)
    }

    fn outcome_of(&self, response: &vakifbank::VposResponse) -> AttemptOutcome {
        if response.is_approved() {
            AttemptOutcome::Approved {
                auth_code: response.auth_code.clone(),
                ref_number: response.rrn.clone(),
            }
        } else {
            AttemptOutcome::declined(response.error_code(), response.error_message())
        }
    }

    fn vpos_request(
        &self,
        flow: &PaymentFlowData<'_>,
        auth: &vakifbank::VakifbankAuthType,
        transaction_type: &str,
        three_ds: bool,
    ) -> CustomResult<vakifbank::VposRequest, ConnectorError> {
        let card = flow.card_required()?;
        let tx = &*flow.transaction;
        let client_ip = tx
            .customer
            .as_ref()
            .and_then(|c| c.ip.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string());

        Ok(vakifbank::VposRequest {
            merchant_id: auth.merchant_id.clone(),
            password: auth.password.clone(),
            terminal_no: auth.terminal_no.clone(),
            transaction_type: transaction_type.to_string(),
            transaction_id: tx.id.clone(),
            currency_amount: utils::amount_major_string(tx.amount),
            currency_code: tx.currency.iso_numeric_code().to_string(),
            number_of_installments: if tx.installment > 1 {
                Some(tx.installment.to_string())
            } else {
                None
            },
            pan: card.number.clone(),
            // The financial call wants YYYYMM; only the enrollment uses
            // the short YYMM form.
            expiry: card.expiry_yyyymm().into(),
            cvv: Some(card.cvv.clone()),
            eci: if three_ds { tx.secure.eci.clone() } else { None },
            cavv: if three_ds { tx.secure.cavv.clone() } else { None },
            mpi_transaction_id: if three_ds { tx.secure.md.clone() } else { None },
            order_id: tx.id.clone(),
            client_ip,
            transaction_device_source: "0".to_string(),
            reference_transaction_id: None,
        })
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for Vakifbank {
    fn id(&self) -> &'static str {
        "vakifbank"
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
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = vakifbank::VakifbankAuthType::try_from(flow.auth)?;
        let card = flow.card_required()?;
        let brand = vakifbank::brand_code(
            flow.transaction.bin_info.as_ref().and_then(|b| b.brand),
            card.number.peek(),
        )
        .ok_or(ConnectorError::MissingRequiredField {
            field_name: "card brand",
        })?;

        let fields = vec![
            ("Pan".to_string(), card.number.peek().clone()),
            ("ExpiryDate".to_string(), card.expiry_yymm()),
            (
                "PurchaseAmount".to_string(),
                utils::amount_major_string(flow.transaction.amount),
            ),
            (
                "Currency".to_string(),
                flow.transaction.currency.iso_numeric_code().to_string(),
            ),
            ("BrandName".to_string(), brand.to_string()),
            (
                "VerifyEnrollmentRequestId".to_string(),
                flow.transaction.id.clone(),
            ),
            ("MerchantId".to_string(), auth.merchant_id.peek().clone()),
            (
                "MerchantPassword".to_string(),
                auth.password.peek().clone(),
            ),
            ("SuccessUrl".to_string(), flow.callback_url.clone()),
            ("FailureUrl".to_string(), flow.callback_url.clone()),
        ];
        let body = utils::encode_form_fields(&fields)?;
        let request_log = utils::redact_form_fields(&fields, &["Pan", "MerchantPassword"]);

        let http_request = RequestBuilder::new()
            .method(Method::Post)
            .url(self.enrollment_url(flow.terminal))
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
        let parsed: vakifbank::IPaySecure = utils::deserialize_xml_to_struct(&response.body)?;
        let response_log = parsed
            .encode_to_value()
            .unwrap_or_else(|_| json!({"raw": String::from_utf8_lossy(&response.body)}));
        flow.log(TransactionLogType::Init, request_log, response_log);

        let Some(enrolled) = parsed.enrolled() else {
            return Ok(AttemptOutcome::declined(
                parsed.error_code(),
                parsed.error_message_text(),
            ));
        };

        let tx = &mut *flow.transaction;
        tx.secure.provider = Some(ProviderKind::Vakifbank);
        tx.secure.md = enrolled.md.clone();
        tx.secure.form_data = Some(json!({
            "endpoint": enrolled.acs_url.clone().unwrap_or_default(),
            "fields": {
                "PaReq": enrolled.pa_req.clone().unwrap_or_default(),
                "TermUrl": enrolled
                    .term_url
                    .clone()
                    .unwrap_or_else(|| flow.callback_url.clone()),
                "MD": enrolled.md.clone().unwrap_or_default(),
            },
        }));

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
            .filter(|url| !url.is_empty())
            .ok_or(ConnectorError::MissingFlowState("form"))?;
        let fields: Vec<(String, String)> = form_data
            .get("fields")
            .and_then(|v| v.as_object())
            .ok_or(ConnectorError::MissingFlowState("form"))?
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect();
        Ok(utils::build_auto_submit_form(endpoint, &fields))
    }

    async fn process_callback(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        fields: &CallbackFields,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let status = fields
            .get("Status")
            .cloned()
            .ok_or(ConnectorError::InvalidCallbackPayload)?;

        {
            let tx = &mut *flow.transaction;
            tx.secure.eci = fields.get("Eci").or_else(|| fields.get("ECI")).cloned();
            tx.secure.cavv = fields.get("Cavv").or_else(|| fields.get("CAVV")).cloned();
            if let Some(mpi_txid) = fields.get("VerifyEnrollmentRequestId") {
                tx.secure.xid = Some(mpi_txid.clone());
            }
        }

        let field_pairs: Vec<(String, String)> =
            fields.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        flow.log(
            TransactionLogType::ThreeDCallback,
            utils::redact_form_fields(&field_pairs, &["Pan"]),
            json!({"Status": status}),
        );

        if status != "Y" {
            return Ok(AttemptOutcome::declined(
                status,
                fields
                    .get("ErrorMessage")
                    .cloned()
                    .unwrap_or_else(|| "3-D authentication failed".to_string()),
            ));
        }

        self.process_provision(ctx, flow).await
    }

    async fn process_provision(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = vakifbank::VakifbankAuthType::try_from(flow.auth)?;
        if flow.transaction.secure.eci.is_none() {
            return Err(ConnectorError::MissingFlowState("3d").into());
        }
        let request = self.vpos_request(flow, &auth, "Sale", true)?;
        let response = self
            .send_vpos(ctx, flow, &request, TransactionLogType::Provision)
            .await?;
        Ok(self.outcome_of(&response))
    }

    async fn direct_payment(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = vakifbank::VakifbankAuthType::try_from(flow.auth)?;
        let request = self.vpos_request(flow, &auth, "Sale", false)?;
        let response = self
            .send_vpos(ctx, flow, &request, TransactionLogType::Provision)
            .await?;
        Ok(self.outcome_of(&response))
    }
}
