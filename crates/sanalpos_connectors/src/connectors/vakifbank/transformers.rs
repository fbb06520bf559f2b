//! VakıfBank VPOS wire types: the MPI enrollment exchange and the
//! `VposRequest` financial XML.

use common_enums::CardBrand;
use masking::{PeekInterface, Secret};
use sanalpos_domain_models::TerminalAuth;
use serde::{Deserialize, Serialize};

use crate::api::ConnectorError;

pub const RESULT_CODE_APPROVED: &str = "0000";

pub struct VakifbankAuthType {
    pub merchant_id: Secret<String>,
    pub terminal_no: Secret<String>,
    pub password: Secret<String>,
}

impl TryFrom<&TerminalAuth> for VakifbankAuthType {
    type Error = error_stack::Report<ConnectorError>;

    fn try_from(auth: &TerminalAuth) -> Result<Self, Self::Error> {
        if auth.password.peek().is_empty() {
            return Err(ConnectorError::FailedToObtainAuthType.into());
        }
        Ok(Self {
            merchant_id: auth.merchant_id.clone(),
            terminal_no: auth.terminal_id.clone(),
            password: auth.password.clone(),
        })
    }
}

/// The MPI `BrandName` code; falls back to the PAN's leading digit when
/// the BIN snapshot carries no brand.
pub fn brand_code(brand: Option<CardBrand>, pan: &str) -> Option<&'static str> {
    match brand {
        Some(brand) => brand.vakifbank_brand_code(),
        None => match pan.chars().next() {
            Some('4') => Some("100"),
            Some('5') => Some("200"),
            Some('3') => Some("300"),
            _ => None,
        },
    }
}

/// Enrollment response. The gate answers
/// `<IPaySecure><Message><VERes>...</VERes></Message>...</IPaySecure>`.
#[derive(Debug, Deserialize, Serialize)]
pub struct IPaySecure {
    #[serde(rename = "Message")]
    pub message: Option<EnrollmentMessage>,
    #[serde(rename = "MessageErrorCode")]
    pub message_error_code: Option<String>,
    #[serde(rename = "ErrorMessage")]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EnrollmentMessage {
    #[serde(rename = "VERes")]
    pub ve_res: Option<VeRes>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VeRes {
    #[serde(rename = "Status")]
    pub status: Option<String>,
    #[serde(rename = "PaReq")]
    pub pa_req: Option<String>,
    #[serde(rename = "ACSUrl")]
    pub acs_url: Option<String>,
    #[serde(rename = "TermUrl")]
    pub term_url: Option<String>,
    #[serde(rename = "MD")]
    pub md: Option<String>,
}

impl IPaySecure {
    /// Enrollment succeeds only with `VERes.Status == "Y"`.
    pub fn enrolled(&self) -> Option<&VeRes> {
        self.message
            .as_ref()
            .and_then(|message| message.ve_res.as_ref())
            .filter(|ve_res| ve_res.status.as_deref() == Some("Y"))
    }

    pub fn error_code(&self) -> String {
        self.message_error_code
            .clone()
            .or_else(|| {
                self.message
                    .as_ref()
                    .and_then(|m| m.ve_res.as_ref())
                    .and_then(|v| v.status.clone())
            })
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn error_message_text(&self) -> String {
        self.error_message
            .clone()
            .filter(|msg| !msg.is_empty())
            .unwrap_or_else(|| "cardholder not enrolled".to_string())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename = "VposRequest")]
pub struct VposRequest {
    #[serde(rename = "MerchantId")]
    pub merchant_id: Secret<String>,
    #[serde(rename = "Password")]
    pub password: Secret<String>,
    #[serde(rename = "TerminalNo")]
    pub terminal_no: Secret<String>,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "TransactionId")]
    pub transaction_id: String,
    #[serde(rename = "CurrencyAmount")]
    pub currency_amount: String,
    #[serde(rename = "CurrencyCode")]
    pub currency_code: String,
    #[serde(rename = "NumberOfInstallments", skip_serializing_if = "Option::is_none")]
    pub number_of_installments: Option<String>,
    #[serde(rename = "Pan")]
    pub pan: Secret<String>,
    #[serde(rename = "Expiry")]
    pub expiry: Secret<String>,
    #[serde(rename = "Cvv", skip_serializing_if = "Option::is_none")]
    pub cvv: Option<Secret<String>>,
    #[serde(rename = "ECI", skip_serializing_if = "Option::is_none")]
    pub eci: Option<String>,
    #[serde(rename = "CAVV", skip_serializing_if = "Option::is_none")]
    pub cavv: Option<String>,
    #[serde(rename = "MpiTransactionId", skip_serializing_if = "Option::is_none")]
    pub mpi_transaction_id: Option<String>,
    #[serde(rename = "OrderId")]
    pub order_id: String,
    #[serde(rename = "ClientIp")]
    pub client_ip: String,
    #[serde(rename = "TransactionDeviceSource")]
    pub transaction_device_source: String,
    #[serde(rename = "ReferenceTransactionId", skip_serializing_if = "Option::is_none")]
    pub reference_transaction_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct VposResponse {
    #[serde(rename = "ResultCode")]
    pub result_code: Option<String>,
    #[serde(rename = "ResultDetail")]
    pub result_detail: Option<String>,
    #[serde(rename = "AuthCode")]
    pub auth_code: Option<String>,
    #[serde(rename = "Rrn")]
    pub rrn: Option<String>,
    #[serde(rename = "TransactionId")]
    pub transaction_id: Option<String>,
}

impl VposResponse {
    /// Approval is `ResultCode == "0000"`.
    pub fn is_approved(&self) -> bool {
        self.result_code.as_deref() == Some(RESULT_CODE_APPROVED)
    }

    pub fn error_code(&self) -> String {
        self.result_code
            .clone()
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn error_message(&self) -> String {
        self.result_detail
            .clone()
            .filter(|msg| !msg.is_empty())
            .unwrap_or_else(|| "declined".to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn enrollment_response_with_status_y_parses() {
        let body = r#"<IPaySecure>
            <Message>
                <VERes>
                    <Status>Y</Status>
                    <PaReq>BASE64PAREQ</PaReq>
                    <ACSUrl>https://acs.bank.example/challenge</ACSUrl>
                    <TermUrl>https://gateway.example/payment/tx-1/callback</TermUrl>
                    <MD>MD-TOKEN</MD>
                </VERes>
            </Message>
        </IPaySecure>"#;
        let response: IPaySecure =
            crate::utils::deserialize_xml_to_struct(body.as_bytes()).expect("parse");
        let enrolled = response.enrolled().expect("enrolled");
        assert_eq!(enrolled.acs_url.as_deref(), Some("https://acs.bank.example/challenge"));
        assert_eq!(enrolled.md.as_deref(), Some("MD-TOKEN"));
    }

    #[test]
    fn rejected_enrollment_is_not_enrolled() {
        let body = r#"<IPaySecure>
            <Message>
                <VERes>
                    <Status>N</Status>
                </VERes>
            </Message>
            <MessageErrorCode>2005</MessageErrorCode>
            <ErrorMessage>Kart dogrulanamadi</ErrorMessage>
        </IPaySecure>"#;
        let response: IPaySecure =
            crate::utils::deserialize_xml_to_struct(body.as_bytes()).expect("parse");
        assert!(response.enrolled().is_none());
        assert_eq!(response.error_code(), "2005");
        assert_eq!(response.error_message_text(), "Kart dogrulanamadi");
    }

    #[test]
    fn brand_codes_fall_back_to_leading_digit() {
        assert_eq!(brand_code(Some(CardBrand::Visa), "5400000000000000"), Some("100"));
        assert_eq!(brand_code(None, "4282209004348016"), Some("100"));
        assert_eq!(brand_code(None, "5400010000000004"), Some("200"));
        assert_eq!(brand_code(None, "340000000000009"), Some("300"));
        assert_eq!(brand_code(None, "9792000000000001"), None);
    }

    #[test]
    fn approved_vpos_response_parses() {
        let body = r#"<VposTransactionResponseContract>
            <ResultCode>0000</ResultCode>
            <ResultDetail>ISLEM BASARILI</ResultDetail>
            <AuthCode>123456</AuthCode>
            <Rrn>407508395062</Rrn>
            <TransactionId>tx-1</TransactionId>
        </VposTransactionResponseContract>"#;
        let response: VposResponse =
            crate::utils::deserialize_xml_to_struct(body.as_bytes()).expect("parse");
        assert!(response.is_approved());
        assert_eq!(response.auth_code.as_deref(), Some("123456"));
    }
}
