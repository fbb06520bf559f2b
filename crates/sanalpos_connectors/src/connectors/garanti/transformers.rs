//! Garanti GVPS wire types, version 512.

use common_enums::Currency;
use common_utils::{
    crypto::{sha1_hex_upper, sha512_hex_upper},
    errors::CustomResult,
    types::MinorUnit,
};
use error_stack::ResultExt;
use masking::{PeekInterface, Secret};
use sanalpos_domain_models::TerminalAuth;
use serde::{Deserialize, Serialize};

use crate::api::ConnectorError;

pub const API_VERSION: &str = "512";
pub const TXN_TYPE_SALES: &str = "sales";

pub struct GarantiAuthType {
    pub merchant_id: Secret<String>,
    pub terminal_id: Secret<String>,
    pub prov_user_id: Secret<String>,
    pub password: Secret<String>,
    pub store_key: Secret<String>,
}

impl TryFrom<&TerminalAuth> for GarantiAuthType {
    type Error = error_stack::Report<ConnectorError>;

    fn try_from(auth: &TerminalAuth) -> Result<Self, Self::Error> {
        if auth.password.peek().is_empty() {
            return Err(ConnectorError::FailedToObtainAuthType.into());
        }
        Ok(Self {
            merchant_id: auth.merchant_id.clone(),
            terminal_id: auth.terminal_id.clone(),
            prov_user_id: auth
                .username
                .clone()
                .unwrap_or_else(|| Secret::new("PROVAUT".to_string())),
            password: auth.password.clone(),
            store_key: auth.store_key.clone(),
        })
    }
}

/// `Mode` element: test terminals speak `test`, production `PROD`.
pub fn mode(test_mode: bool) -> &'static str {
    if test_mode {
        "test"
    } else {
        "PROD"
    }
}

/// The provision password hash:
/// `upper(sha1(password + "0" + terminal_id))`.
pub fn security_data(auth: &GarantiAuthType) -> CustomResult<String, ConnectorError> {
    sha1_hex_upper(
        format!("{}0{}", auth.password.peek(), auth.terminal_id.peek()).as_bytes(),
    )
    .change_context(ConnectorError::RequestEncodingFailed)
}

/// The 3-D form hash:
/// `upper(sha512(tid + orderid + amount + currency + okUrl + failUrl +
/// "sales" + installment + storeKey + hp))`.
#[allow(clippy::too_many_arguments)]
pub fn three_d_hash(
    auth: &GarantiAuthType,
    order_id: &str,
    amount: MinorUnit,
    currency: Currency,
    success_url: &str,
    error_url: &str,
    installment: &str,
) -> CustomResult<String, ConnectorError> {
    let hashed_password = security_data(auth)?;
    let hash_input = format!(
        "{}{}{}{}{}{}{}{}{}{}",
        auth.terminal_id.peek(),
        order_id,
        amount.to_minor_unit_string(),
        currency.iso_numeric_code(),
        success_url,
        error_url,
        TXN_TYPE_SALES,
        installment,
        auth.store_key.peek(),
        hashed_password,
    );
    sha512_hex_upper(hash_input.as_bytes()).change_context(ConnectorError::RequestEncodingFailed)
}

/// The provision hash:
/// `upper(sha512(orderid + tid + cardnumber-or-empty + amount + currency
/// + hp))`. The card number slot stays empty on 3-D completion.
pub fn provision_hash(
    auth: &GarantiAuthType,
    order_id: &str,
    card_number: &str,
    amount: MinorUnit,
    currency: Currency,
) -> CustomResult<String, ConnectorError> {
    let hashed_password = security_data(auth)?;
    let hash_input = format!(
        "{}{}{}{}{}{}",
        order_id,
        auth.terminal_id.peek(),
        card_number,
        amount.to_minor_unit_string(),
        currency.iso_numeric_code(),
        hashed_password,
    );
    sha512_hex_upper(hash_input.as_bytes()).change_context(ConnectorError::RequestEncodingFailed)
}

#[derive(Debug, Serialize)]
#[serde(rename = "GVPSRequest")]
pub struct GvpsRequest {
    #[serde(rename = "Mode")]
    pub mode: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Terminal")]
    pub terminal: GvpsTerminal,
    #[serde(rename = "Customer")]
    pub customer: GvpsCustomer,
    #[serde(rename = "Card")]
    pub card: GvpsCard,
    #[serde(rename = "Order")]
    pub order: GvpsOrder,
    #[serde(rename = "Transaction")]
    pub transaction: GvpsTransaction,
}

#[derive(Debug, Serialize)]
pub struct GvpsTerminal {
    #[serde(rename = "ProvUserID")]
    pub prov_user_id: Secret<String>,
    #[serde(rename = "HashData")]
    pub hash_data: String,
    #[serde(rename = "UserID")]
    pub user_id: Secret<String>,
    #[serde(rename = "ID")]
    pub id: Secret<String>,
    #[serde(rename = "MerchantID")]
    pub merchant_id: Secret<String>,
}

#[derive(Debug, Serialize)]
pub struct GvpsCustomer {
    #[serde(rename = "IPAddress")]
    pub ip_address: String,
    #[serde(rename = "EmailAddress")]
    pub email_address: String,
}

/// Card slots stay present but empty on 3-D completion; the issuer
/// already authenticated the PAN.
#[derive(Debug, Default, Serialize)]
pub struct GvpsCard {
    #[serde(rename = "Number")]
    pub number: Secret<String>,
    #[serde(rename = "ExpireDate")]
    pub expire_date: Secret<String>,
    #[serde(rename = "CVV2")]
    pub cvv2: Secret<String>,
}

#[derive(Debug, Serialize)]
pub struct GvpsOrder {
    #[serde(rename = "OrderID")]
    pub order_id: String,
}

#[derive(Debug, Serialize)]
pub struct GvpsTransaction {
    #[serde(rename = "Type")]
    pub txn_type: String,
    #[serde(rename = "InstallmentCnt")]
    pub installment_cnt: String,
    #[serde(rename = "Amount")]
    pub amount: String,
    #[serde(rename = "CurrencyCode")]
    pub currency_code: String,
    #[serde(rename = "CardholderPresentCode")]
    pub cardholder_present_code: String,
    #[serde(rename = "MotoInd")]
    pub moto_ind: String,
    #[serde(rename = "OriginalRetrefNum", skip_serializing_if = "Option::is_none")]
    pub original_retref_num: Option<String>,
    #[serde(rename = "Secure3D", skip_serializing_if = "Option::is_none")]
    pub secure_3d: Option<GvpsSecure3d>,
}

#[derive(Debug, Serialize)]
pub struct GvpsSecure3d {
    #[serde(rename = "AuthenticationCode")]
    pub authentication_code: String,
    #[serde(rename = "SecurityLevel")]
    pub security_level: String,
    #[serde(rename = "TxnID")]
    pub txn_id: String,
    #[serde(rename = "Md")]
    pub md: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GvpsResponse {
    #[serde(rename = "Order")]
    pub order: Option<GvpsOrderResponse>,
    #[serde(rename = "Transaction")]
    pub transaction: GvpsTransactionResponse,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GvpsOrderResponse {
    #[serde(rename = "OrderID")]
    pub order_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GvpsTransactionResponse {
    #[serde(rename = "Response")]
    pub response: GvpsInnerResponse,
    #[serde(rename = "RetrefNum")]
    pub retref_num: Option<String>,
    #[serde(rename = "AuthCode")]
    pub auth_code: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GvpsInnerResponse {
    #[serde(rename = "Source")]
    pub source: Option<String>,
    #[serde(rename = "Code")]
    pub code: Option<String>,
    #[serde(rename = "ReasonCode")]
    pub reason_code: Option<String>,
    #[serde(rename = "Message")]
    pub message: Option<String>,
    #[serde(rename = "ErrorMsg")]
    pub error_msg: Option<String>,
    #[serde(rename = "SysErrMsg")]
    pub sys_err_msg: Option<String>,
}

impl GvpsResponse {
    /// Garanti approves with `Transaction.Response.Message == "Approved"`.
    pub fn is_approved(&self) -> bool {
        self.transaction
            .response
            .message
            .as_deref()
            .is_some_and(|message| message == "Approved")
    }

    pub fn error_code(&self) -> String {
        self.transaction
            .response
            .reason_code
            .clone()
            .or_else(|| self.transaction.response.code.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn error_message(&self) -> String {
        self.transaction
            .response
            .error_msg
            .clone()
            .filter(|msg| !msg.is_empty())
            .or_else(|| {
                self.transaction
                    .response
                    .sys_err_msg
                    .clone()
                    .filter(|msg| !msg.is_empty())
            })
            .or_else(|| self.transaction.response.message.clone())
            .unwrap_or_else(|| "declined".to_string())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    fn sample_auth() -> GarantiAuthType {
        GarantiAuthType {
            merchant_id: Secret::new("7000679".to_string()),
            terminal_id: Secret::new("30691298".to_string()),
            prov_user_id: Secret::new("PROVAUT".to_string()),
            password: Secret::new("123qweASD/".to_string()),
            store_key: Secret::new("12345678".to_string()),
        }
    }

    #[test]
    fn security_data_composition() {
        let auth = sample_auth();
        let expected = sha1_hex_upper(b"123qweASD/030691298").expect("digest");
        assert_eq!(security_data(&auth).expect("hash"), expected);
        assert_eq!(expected.len(), 40);
        assert_eq!(expected, expected.to_uppercase());
    }

    #[test]
    fn three_d_hash_composition() {
        let auth = sample_auth();
        let callback = "https://gateway.example/payment/tx-1/callback";
        let hash = three_d_hash(
            &auth,
            "order-1",
            MinorUnit::new(15000),
            Currency::Try,
            callback,
            callback,
            "",
        )
        .expect("hash");

        let hp = security_data(&auth).expect("hp");
        let expected = sha512_hex_upper(
            format!("30691298order-115000949{callback}{callback}sales12345678{hp}").as_bytes(),
        )
        .expect("digest");
        assert_eq!(hash, expected);
    }

    #[test]
    fn provision_hash_keeps_card_slot_empty_for_3d() {
        let auth = sample_auth();
        let hash = provision_hash(&auth, "order-1", "", MinorUnit::new(15000), Currency::Try)
            .expect("hash");
        let hp = security_data(&auth).expect("hp");
        let expected = sha512_hex_upper(format!("order-13069129815000949{hp}").as_bytes())
            .expect("digest");
        assert_eq!(hash, expected);
    }

    #[test]
    fn provision_xml_shape() {
        let auth = sample_auth();
        let request = GvpsRequest {
            mode: mode(false).to_string(),
            version: API_VERSION.to_string(),
            terminal: GvpsTerminal {
                prov_user_id: auth.prov_user_id.clone(),
                hash_data: "HASH".to_string(),
                user_id: auth.prov_user_id.clone(),
                id: auth.terminal_id.clone(),
                merchant_id: auth.merchant_id.clone(),
            },
            customer: GvpsCustomer {
                ip_address: "127.0.0.1".to_string(),
                email_address: "test@example.com".to_string(),
            },
            card: GvpsCard::default(),
            order: GvpsOrder {
                order_id: "order-1".to_string(),
            },
            transaction: GvpsTransaction {
                txn_type: TXN_TYPE_SALES.to_string(),
                installment_cnt: String::new(),
                amount: "15000".to_string(),
                currency_code: "949".to_string(),
                cardholder_present_code: "13".to_string(),
                moto_ind: "N".to_string(),
                original_retref_num: None,
                secure_3d: Some(GvpsSecure3d {
                    authentication_code: "cavv".to_string(),
                    security_level: "05".to_string(),
                    txn_id: "xid".to_string(),
                    md: "md".to_string(),
                }),
            },
        };
        let xml = quick_xml::se::to_string(&request).expect("xml");
        assert!(xml.starts_with("<GVPSRequest>"));
        assert!(xml.contains("<Mode>PROD</Mode>"));
        assert!(xml.contains("<Version>512</Version>"));
        assert!(xml.contains("<CardholderPresentCode>13</CardholderPresentCode>"));
        assert!(xml.contains("<MotoInd>N</MotoInd>"));
        assert!(xml.contains("<Secure3D>"));
    }

    #[test]
    fn approved_response_parses() {
        let body = r#"<GVPSResponse>
            <Order><OrderID>order-1</OrderID></Order>
            <Transaction>
                <Response>
                    <Source>HOST</Source>
                    <Code>00</Code>
                    <ReasonCode>00</ReasonCode>
                    <Message>Approved</Message>
                    <ErrorMsg></ErrorMsg>
                    <SysErrMsg></SysErrMsg>
                </Response>
                <RetrefNum>407508395060</RetrefNum>
                <AuthCode>304919</AuthCode>
            </Transaction>
        </GVPSResponse>"#;
        let response: GvpsResponse =
            crate::utils::deserialize_xml_to_struct(body.as_bytes()).expect("parse");
        assert!(response.is_approved());
        assert_eq!(response.transaction.auth_code.as_deref(), Some("304919"));
    }

    #[test]
    fn declined_response_surfaces_error() {
        let body = r#"<GVPSResponse>
            <Transaction>
                <Response>
                    <Code>99</Code>
                    <ReasonCode>12</ReasonCode>
                    <Message>Declined</Message>
                    <ErrorMsg>Islem onaylanmadi</ErrorMsg>
                </Response>
            </Transaction>
        </GVPSResponse>"#;
        let response: GvpsResponse =
            crate::utils::deserialize_xml_to_struct(body.as_bytes()).expect("parse");
        assert!(!response.is_approved());
        assert_eq!(response.error_code(), "12");
        assert_eq!(response.error_message(), "Islem onaylanmadi");
    }
}
