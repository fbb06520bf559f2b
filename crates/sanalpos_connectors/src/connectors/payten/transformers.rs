//! Payten/NestPay wire types. One dialect, many banks: Halkbank, İş
//! Bankası, Ziraat, TEB, ING and Şekerbank all run the same EST
//! gateway, differing only in hostnames.

use common_enums::BankCode;
use common_utils::crypto::sha512_pack_base64;
use common_utils::errors::CustomResult;
use error_stack::ResultExt;
use masking::Secret;
use sanalpos_domain_models::TerminalAuth;
use serde::{Deserialize, Serialize};

use crate::api::ConnectorError;

pub const STORE_TYPE: &str = "3d_pay";
pub const HASH_ALGORITHM: &str = "ver3";

pub struct PaytenAuthType {
    pub client_id: Secret<String>,
    pub username: Secret<String>,
    pub password: Secret<String>,
    pub store_key: Secret<String>,
}

impl TryFrom<&TerminalAuth> for PaytenAuthType {
    type Error = error_stack::Report<ConnectorError>;

    fn try_from(auth: &TerminalAuth) -> Result<Self, Self::Error> {
        let username = auth
            .username
            .clone()
            .ok_or(ConnectorError::FailedToObtainAuthType)?;
        Ok(Self {
            client_id: auth.merchant_id.clone(),
            username,
            password: auth.password.clone(),
            store_key: auth.store_key.clone(),
        })
    }
}

/// EST gateway endpoints per bank. The test environment is shared.
pub fn endpoints(bank_code: BankCode, test_mode: bool) -> CustomResult<(String, String), ConnectorError> {
    if test_mode {
        return Ok((
            "https://entegrasyon.asseco-see.com.tr/fim/est3Dgate".to_string(),
            "https://entegrasyon.asseco-see.com.tr/fim/api".to_string(),
        ));
    }
    let host = match bank_code {
        BankCode::Halkbank => "sanalpos.halkbank.com.tr",
        BankCode::Isbank => "sanalpos.isbank.com.tr",
        BankCode::Ziraat => "sanalpos2.ziraatbank.com.tr",
        BankCode::Teb => "sanalpos.teb.com.tr",
        BankCode::Ing => "pos.ingbank.com.tr",
        BankCode::Sekerbank => "sanalpos.sekerbank.com.tr",
        other => {
            return Err(ConnectorError::NotImplemented(format!(
                "payten endpoints for {other}"
            ))
            .into())
        }
    };
    Ok((
        format!("https://{host}/fim/est3Dgate"),
        format!("https://{host}/fim/api"),
    ))
}

/// NestPay hash version 3.
///
/// Sort the posted fields case-insensitively by name, drop `hash` and
/// `encoding`, join the escaped values with `|`, append the escaped
/// store key, then pack the SHA-512 digest to base64. Escaping doubles
/// backslashes first, then guards the separator.
pub fn hash_ver3(
    fields: &[(String, String)],
    store_key: &str,
) -> CustomResult<String, ConnectorError> {
    fn escape(value: &str) -> String {
        value.replace('\\', "\\\\").replace('|', "\\|")
    }

    let mut sorted: Vec<&(String, String)> = fields
        .iter()
        .filter(|(key, _)| {
            let lowered = key.to_lowercase();
            lowered != "hash" && lowered != "encoding"
        })
        .collect();
    sorted.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()));

    let mut hash_input = String::new();
    for (_, value) in sorted {
        hash_input.push_str(&escape(value));
        hash_input.push('|');
    }
    hash_input.push_str(&escape(store_key));

    sha512_pack_base64(hash_input.as_bytes())
        .change_context(ConnectorError::RequestEncodingFailed)
}

/// Recompute the callback hash and compare it to what the gateway
/// posted.
pub fn verify_callback_hash(
    fields: &[(String, String)],
    store_key: &str,
    posted_hash: &str,
) -> CustomResult<bool, ConnectorError> {
    let expected = hash_ver3(fields, store_key)?;
    Ok(expected == posted_hash)
}

/// Financial API transaction types.
#[derive(Clone, Copy, Debug, Serialize, strum::Display)]
pub enum PaytenTxnType {
    Auth,
    PreAuth,
    PostAuth,
    Void,
    Credit,
    OrderInquiry,
    OrderHistory,
}

#[derive(Debug, Serialize)]
#[serde(rename = "CC5Request")]
pub struct Cc5Request {
    #[serde(rename = "Name")]
    pub name: Secret<String>,
    #[serde(rename = "Password")]
    pub password: Secret<String>,
    #[serde(rename = "ClientId")]
    pub client_id: Secret<String>,
    #[serde(rename = "Type")]
    pub txn_type: String,
    #[serde(rename = "IPAddress", skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(rename = "Email", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "OrderId")]
    pub order_id: String,
    #[serde(rename = "Total", skip_serializing_if = "Option::is_none")]
    pub total: Option<String>,
    #[serde(rename = "Currency", skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(rename = "Taksit", skip_serializing_if = "Option::is_none")]
    pub taksit: Option<String>,
    /// The PAN slot. 3-D completions put the callback `md` here instead
    /// of a card number.
    #[serde(rename = "Number", skip_serializing_if = "Option::is_none")]
    pub number: Option<Secret<String>>,
    #[serde(rename = "Expires", skip_serializing_if = "Option::is_none")]
    pub expires: Option<Secret<String>>,
    #[serde(rename = "Cvv2Val", skip_serializing_if = "Option::is_none")]
    pub cvv2_val: Option<Secret<String>>,
    #[serde(rename = "PayerTxnId", skip_serializing_if = "Option::is_none")]
    pub payer_txn_id: Option<String>,
    #[serde(rename = "PayerSecurityLevel", skip_serializing_if = "Option::is_none")]
    pub payer_security_level: Option<String>,
    #[serde(
        rename = "PayerAuthenticationCode",
        skip_serializing_if = "Option::is_none"
    )]
    pub payer_authentication_code: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Cc5Response {
    #[serde(rename = "OrderId")]
    pub order_id: Option<String>,
    #[serde(rename = "GroupId")]
    pub group_id: Option<String>,
    #[serde(rename = "Response")]
    pub response: Option<String>,
    #[serde(rename = "AuthCode")]
    pub auth_code: Option<String>,
    #[serde(rename = "HostRefNum")]
    pub host_ref_num: Option<String>,
    #[serde(rename = "ProcReturnCode")]
    pub proc_return_code: Option<String>,
    #[serde(rename = "TransId")]
    pub trans_id: Option<String>,
    #[serde(rename = "ErrMsg")]
    pub err_msg: Option<String>,
}

impl Cc5Response {
    /// NestPay approves with `Response == "Approved"`.
    pub fn is_approved(&self) -> bool {
        self.response.as_deref().is_some_and(|r| r == "Approved")
    }

    pub fn error_code(&self) -> String {
        self.proc_return_code
            .clone()
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn error_message(&self) -> String {
        self.err_msg
            .clone()
            .filter(|msg| !msg.is_empty())
            .or_else(|| self.response.clone())
            .unwrap_or_else(|| "declined".to_string())
    }
}

pub fn build_provision_request(
    auth: &PaytenAuthType,
    txn_type: PaytenTxnType,
    order_id: &str,
    total: Option<String>,
    currency: Option<String>,
    taksit: Option<String>,
) -> Cc5Request {
    Cc5Request {
        name: auth.username.clone(),
        password: auth.password.clone(),
        client_id: auth.client_id.clone(),
        txn_type: txn_type.to_string(),
        ip_address: None,
        email: None,
        order_id: order_id.to_string(),
        total,
        currency,
        taksit,
        number: None,
        expires: None,
        cvv2_val: None,
        payer_txn_id: None,
        payer_security_level: None,
        payer_authentication_code: None,
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    fn field(key: &str, value: &str) -> (String, String) {
        (key.to_string(), value.to_string())
    }

    #[test]
    fn hash_ver3_sorts_case_insensitively_and_appends_store_key() {
        let fields = vec![
            field("oid", "order-1"),
            field("clientid", "700655000200"),
            field("amount", "150.00"),
            field("HASH", "should-be-skipped"),
            field("encoding", "utf-8"),
        ];
        let hash = hash_ver3(&fields, "TRPS0200").expect("hash");

        // amount < clientid < oid under case-insensitive ordering.
        let expected = sha512_pack_base64(b"150.00|700655000200|order-1|TRPS0200").expect("digest");
        assert_eq!(hash, expected);
    }

    #[test]
    fn hash_ver3_escapes_separator_and_backslash() {
        let fields = vec![field("okUrl", r"https://x/a|b"), field("note", r"c\d")];
        let hash = hash_ver3(&fields, r"key|with\chars").expect("hash");

        let expected =
            sha512_pack_base64(br"c\\d|https://x/a\|b|key\|with\\chars").expect("digest");
        assert_eq!(hash, expected);
    }

    #[test]
    fn callback_hash_verification_round_trips() {
        let fields = vec![
            field("mdStatus", "1"),
            field("oid", "order-1"),
            field("clientid", "700655000200"),
        ];
        let posted = hash_ver3(&fields, "TRPS0200").expect("hash");
        assert!(verify_callback_hash(&fields, "TRPS0200", &posted).expect("verify"));
        assert!(!verify_callback_hash(&fields, "TRPS0200", "bogus").expect("verify"));
    }

    #[test]
    fn production_endpoints_are_per_bank() {
        let (gate, api) = endpoints(BankCode::Halkbank, false).expect("endpoints");
        assert_eq!(gate, "https://sanalpos.halkbank.com.tr/fim/est3Dgate");
        assert_eq!(api, "https://sanalpos.halkbank.com.tr/fim/api");

        let (gate, _) = endpoints(BankCode::Isbank, true).expect("endpoints");
        assert_eq!(gate, "https://entegrasyon.asseco-see.com.tr/fim/est3Dgate");

        assert!(endpoints(BankCode::Garanti, false).is_err());
    }

    #[test]
    fn declined_response_parses_spec_vector() {
        let body = r#"<CC5Response>
            <OrderId>order-1</OrderId>
            <Response>Error</Response>
            <ProcReturnCode>12</ProcReturnCode>
            <ErrMsg>Red-Kart hatali</ErrMsg>
        </CC5Response>"#;
        let response: Cc5Response =
            crate::utils::deserialize_xml_to_struct(body.as_bytes()).expect("parse");
        assert!(!response.is_approved());
        assert_eq!(response.error_code(), "12");
        assert_eq!(response.error_message(), "Red-Kart hatali");
    }

    #[test]
    fn approved_response_parses() {
        let body = r#"<CC5Response>
            <OrderId>order-1</OrderId>
            <Response>Approved</Response>
            <AuthCode>220825</AuthCode>
            <HostRefNum>407508395061</HostRefNum>
            <ProcReturnCode>00</ProcReturnCode>
            <TransId>24074PsJG18011</TransId>
        </CC5Response>"#;
        let response: Cc5Response =
            crate::utils::deserialize_xml_to_struct(body.as_bytes()).expect("parse");
        assert!(response.is_approved());
        assert_eq!(response.auth_code.as_deref(), Some("220825"));
        assert_eq!(response.host_ref_num.as_deref(), Some("407508395061"));
    }
}
