//! YKB POSNET adapter.
//!
//! Requests are ISO-8859-9 XML documents posted as an `xmldata=` form
//! field. The 3-D initialize runs server-side (`oosRequestData`); the
//! issuer callback carries a Triple-DES encrypted `MerchantPacket`
//! whose decryption is the protocol's hardest step.

pub mod transformers;

use common_enums::{ProviderKind, TransactionLogType};
use common_utils::{
    errors::CustomResult,
    ext_traits::Encode,
    request::{ContentType, Method, RequestBuilder},
};
use error_stack::ResultExt;
use masking::PeekInterface;
use sanalpos_domain_models::Terminal;
use serde::Serialize;
use serde_json::json;
use transformers as ykb;

use crate::{
    api::{Capabilities, ConnectorError, ProviderAdapter},
    types::{AttemptOutcome, CallbackFields, PaymentFlowData, SessionContext},
    utils,
};

const XML_ENCODING: &str = "ISO-8859-9";

#[derive(Clone, Debug)]
pub struct Ykb;

impl Ykb {
    pub const fn new() -> Self {
        Self
    }

    fn api_url(&self, terminal: &Terminal) -> &'static str {
        if terminal.test_mode {
            "https://setmpos.ykb.com/PosnetWebService/XML"
        } else {
            "https://posnet.yapikredi.com.tr/PosnetWebService/XML"
        }
    }

    fn gate_url(&self, terminal: &Terminal) -> &'static str {
        if terminal.test_mode {
            "https://setmpos.ykb.com/3DSWebService/YKBPaymentService"
        } else {
            "https://posnet.yapikredi.com.tr/3DSWebService/YKBPaymentService"
        }
    }

    /// POSNET wants `xmldata=<url-encoded ISO-8859-9 XML>`.
    fn form_body<T: Serialize>(&self, request: &T) -> CustomResult<String, ConnectorError> {
        let xml = utils::XmlSerializer::serialize_to_xml_string(request, "1.0", Some(XML_ENCODING))?;
        let encoded = utils::encode_with_charset(&xml, Some(XML_ENCODING));
        let escaped: String = url::form_urlencoded::byte_serialize(&encoded).collect();
        Ok(format!("xmldata={escaped}"))
    }

    async fn send_posnet<T: Serialize + std::fmt::Debug>(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
        request: &T,
        log_type: TransactionLogType,
        redact: &[&str],
    ) -> CustomResult<ykb::PosnetResponse, ConnectorError> {
        let body = self.form_body(request)?;
        let request_log = request
            .encode_to_value()
            .map(|value| redact_value(value, redact))
            .change_context(ConnectorError::RequestEncodingFailed)?;

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
        let parsed: ykb::PosnetResponse = utils::deserialize_xml_to_struct(&response.body)?;
        let response_log = parsed
            .encode_to_value()
            .unwrap_or_else(|_| json!({"raw": String::from_utf8_lossy(&response.body)}));
        flow.log(log_type, request_log, response_log);
        Ok(parsed)
    }
}

/// Blank out secret-bearing keys in a logged request value.
fn redact_value(mut value: serde_json::Value, keys: &[&str]) -> serde_json::Value {
    fn walk(value: &mut serde_json::Value, keys: &[&str]) {
        if let serde_json::Value::Object(map) = value {
            for (key, entry) in map.iter_mut() {
                if keys.iter().any(|k| key.eq_ignore_ascii_case(k)) {
                    *entry = serde_json::Value::String("*** redacted ***".to_string());
                } else {
                    walk(entry, keys);
                }
            }
        }
    }
    walk(&mut value, keys);
    value
}

#[async_trait::async_trait]
impl ProviderAdapter for Ykb {
    fn id(&self) -> &'static str {
        "ykb"
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
        let auth = ykb::YkbAuthType::try_from(flow.auth)?;
        let card = flow.card_required()?;
        let xid = ykb::format_xid(&flow.transaction.id);

        let request = ykb::PosnetOosRequest {
            mid: auth.merchant_id.clone(),
            tid: auth.terminal_id.clone(),
            oos_request_data: ykb::OosRequestData {
                posnetid: auth.posnet_id.clone(),
                xid: xid.clone(),
                amount: utils::amount_cents_string(flow.transaction.amount),
                currency_code: flow.transaction.currency.posnet_alpha_code().to_string(),
                installment: utils::installment_two_digit(flow.transaction.installment),
                tran_type: "Sale".to_string(),
                card_holder_name: card.holder.clone(),
                ccno: card.number.clone(),
                exp_date: card.expiry_yymm().into(),
                cvc: card.cvv.clone(),
            },
        };

        let response = self
            .send_posnet(
                ctx,
                flow,
                &request,
                TransactionLogType::Init,
                &["ccno", "cvc", "cardHolderName"],
            )
            .await?;

        if !response.is_approved() {
            return Ok(AttemptOutcome::declined(
                response.error_code(),
                response.error_message(),
            ));
        }
        let oos = response
            .oos_request_data_response
            .ok_or(ConnectorError::ResponseDeserializationFailed)?;

        let tx = &mut *flow.transaction;
        tx.secure.provider = Some(ProviderKind::Ykb);
        tx.secure.xid = Some(xid);
        tx.secure.form_data = Some(json!({
            "endpoint": self.gate_url(flow.terminal),
            "fields": {
                "mid": auth.merchant_id.peek(),
                "posnetID": auth.posnet_id.peek(),
                "posnetData": oos.data1.unwrap_or_default(),
                "posnetData2": oos.data2.unwrap_or_default(),
                "digest": oos.sign.unwrap_or_default(),
                "vftCode": "",
                "merchantReturnURL": flow.callback_url.clone(),
                "url": "",
                "lang": "tr",
                "openANewWindow": "0",
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
        let auth = ykb::YkbAuthType::try_from(flow.auth)?;
        let merchant_packet = fields
            .get("MerchantPacket")
            .cloned()
            .ok_or(ConnectorError::InvalidCallbackPayload)?;
        let bank_packet = fields.get("BankPacket").cloned().unwrap_or_default();
        let sign = fields.get("Sign").cloned().unwrap_or_default();

        let packet_fields =
            ykb::decrypt_merchant_packet(&merchant_packet, auth.store_key.peek())?;
        let packet = ykb::MerchantPacket::from_fields(&packet_fields)?;

        {
            let tx = &mut *flow.transaction;
            tx.secure.xid = Some(packet.xid.clone());
            tx.secure.decrypted = Some(json!({
                "packet": packet,
                "bank_packet": bank_packet,
                "merchant_packet": merchant_packet,
                "sign": sign,
            }));
        }

        flow.log(
            TransactionLogType::ThreeDCallback,
            json!({"merchant_packet": "*** encrypted ***"}),
            json!({"tds_md_status": packet.tds_md_status}),
        );

        let accepted = flow
            .terminal
            .three_ds
            .accepted_md_statuses
            .clone()
            .unwrap_or_else(|| {
                ykb::ACCEPTED_MD_STATUSES
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            });
        if !accepted.contains(&packet.tds_md_status) {
            let message = if packet.tds_md_error_message.is_empty() {
                "3-D authentication failed".to_string()
            } else {
                packet.tds_md_error_message.clone()
            };
            return Ok(AttemptOutcome::declined(packet.tds_md_status, message));
        }

        self.process_provision(ctx, flow).await
    }

    async fn process_provision(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = ykb::YkbAuthType::try_from(flow.auth)?;
        let decrypted = flow
            .transaction
            .secure
            .decrypted
            .clone()
            .ok_or(ConnectorError::MissingFlowState("3d"))?;
        let packet: ykb::MerchantPacket = serde_json::from_value(
            decrypted
                .get("packet")
                .cloned()
                .ok_or(ConnectorError::MissingFlowState("3d"))?,
        )
        .change_context(ConnectorError::MissingFlowState("3d"))?;
        let bank_packet = decrypted
            .get("bank_packet")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let merchant_packet = decrypted
            .get("merchant_packet")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let sign = decrypted
            .get("sign")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let amount = utils::amount_cents_string(flow.transaction.amount);
        let currency = flow.transaction.currency.posnet_alpha_code();
        let mac = ykb::provision_mac(&auth, &packet.xid, &amount, currency)?;

        let request = ykb::PosnetOosTranRequest {
            mid: auth.merchant_id.clone(),
            tid: auth.terminal_id.clone(),
            oos_tran_data: ykb::OosTranData {
                bank_data: bank_packet,
                merchant_data: merchant_packet,
                sign,
                wp_amount: "0".to_string(),
                mac,
            },
        };

        let response = self
            .send_posnet(ctx, flow, &request, TransactionLogType::Provision, &[])
            .await?;
        if response.is_approved() {
            Ok(AttemptOutcome::Approved {
                auth_code: response.auth_code.clone(),
                ref_number: response.hostlogkey.clone(),
            })
        } else {
            Ok(AttemptOutcome::declined(
                response.error_code(),
                response.error_message(),
            ))
        }
    }

    async fn direct_payment(
        &self,
        ctx: &SessionContext,
        flow: &mut PaymentFlowData<'_>,
    ) -> CustomResult<AttemptOutcome, ConnectorError> {
        let auth = ykb::YkbAuthType::try_from(flow.auth)?;
        let card = flow.card_required()?;

        let request = ykb::PosnetSaleRequest {
            mid: auth.merchant_id.clone(),
            tid: auth.terminal_id.clone(),
            sale: ykb::PosnetSale {
                order_id: ykb::format_xid(&flow.transaction.id),
                amount: utils::amount_cents_string(flow.transaction.amount),
                currency_code: flow.transaction.currency.posnet_alpha_code().to_string(),
                ccno: card.number.clone(),
                exp_date: card.expiry_yymm().into(),
                cvc: card.cvv.clone(),
                installment: utils::installment_two_digit(flow.transaction.installment),
            },
        };

        let response = self
            .send_posnet(
                ctx,
                flow,
                &request,
                TransactionLogType::Provision,
                &["ccno", "cvc"],
            )
            .await?;
        if response.is_approved() {
            Ok(AttemptOutcome::Approved {
                auth_code: response.auth_code.clone(),
                ref_number: response.hostlogkey.clone(),
            })
        } else {
            Ok(AttemptOutcome::declined(
                response.error_code(),
                response.error_message(),
            ))
        }
    }
}
