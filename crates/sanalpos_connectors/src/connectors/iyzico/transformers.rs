//! iyzico JSON wire types and the IYZWS request signature.

use common_utils::{crypto::sha1_pack_base64, errors::CustomResult, types::MinorUnit};
use error_stack::ResultExt;
use masking::{Mask, PeekInterface, Secret};
use rand::Rng;
use sanalpos_domain_models::{Customer, PaymentCard, TerminalAuth};
use serde::{Deserialize, Serialize};

use crate::{api::ConnectorError, utils};

pub const LOCALE: &str = "tr";
pub const STATUS_SUCCESS: &str = "success";

pub struct IyzicoAuthType {
    pub api_key: Secret<String>,
    pub secret_key: Secret<String>,
}

impl TryFrom<&TerminalAuth> for IyzicoAuthType {
    type Error = error_stack::Report<ConnectorError>;

    fn try_from(auth: &TerminalAuth) -> Result<Self, Self::Error> {
        if auth.secret_key.peek().is_empty() {
            return Err(ConnectorError::FailedToObtainAuthType.into());
        }
        Ok(Self {
            api_key: auth.merchant_id.clone(),
            secret_key: auth.secret_key.clone(),
        })
    }
}

/// iyzico renders prices as plain decimals with the trailing zeros
/// trimmed but at least one fractional digit: `"150.0"`, `"150.55"`.
pub fn format_price(amount: MinorUnit) -> String {
    let full = amount.to_major_unit_string();
    match full.strip_suffix('0') {
        Some(trimmed) if !trimmed.ends_with('.') => trimmed.to_string(),
        Some(trimmed) => format!("{trimmed}0"),
        None => full,
    }
}

/// The IYZWS authorization pair:
/// `Authorization: IYZWS <apiKey>:<hash>` and `x-iyzi-rnd`, where
/// `hash = base64(sha1(apiKey + rnd + secretKey + pki_string(body)))`.
pub fn auth_headers(
    auth: &IyzicoAuthType,
    body: &serde_json::Value,
) -> CustomResult<Vec<(String, masking::Maskable<String>)>, ConnectorError> {
    let random_string = format!("{:016}", rand::thread_rng().gen_range(0..u64::MAX));
    let pki = utils::pki_string(body);
    let hash = sha1_pack_base64(
        format!(
            "{}{random_string}{}{pki}",
            auth.api_key.peek(),
            auth.secret_key.peek()
        )
        .as_bytes(),
    )
    .change_context(ConnectorError::RequestEncodingFailed)?;

    Ok(vec![
        (
            "Authorization".to_string(),
            format!("IYZWS {}:{hash}", auth.api_key.peek()).into_masked(),
        ),
        ("x-iyzi-rnd".to_string(), random_string.into()),
        ("Accept".to_string(), "application/json".to_string().into()),
    ])
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreeDsInitializeRequest {
    pub locale: String,
    pub conversation_id: String,
    pub price: String,
    pub paid_price: String,
    pub installment: u16,
    pub payment_channel: String,
    pub payment_group: String,
    pub payment_card: IyzicoPaymentCard,
    pub buyer: IyzicoBuyer,
    pub shipping_address: IyzicoAddress,
    pub billing_address: IyzicoAddress,
    pub basket_items: Vec<IyzicoBasketItem>,
    pub currency: String,
    pub callback_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IyzicoPaymentCard {
    pub card_holder_name: Secret<String>,
    pub card_number: Secret<String>,
    pub expire_month: Secret<String>,
    pub expire_year: Secret<String>,
    pub cvc: Secret<String>,
    pub register_card: u8,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IyzicoBuyer {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub identity_number: String,
    pub registration_address: String,
    pub city: String,
    pub country: String,
    pub ip: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IyzicoAddress {
    pub contact_name: String,
    pub city: String,
    pub country: String,
    pub address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IyzicoBasketItem {
    pub id: String,
    pub name: String,
    pub category1: String,
    pub item_type: String,
    pub price: String,
}

impl ThreeDsInitializeRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        transaction_id: &str,
        amount: MinorUnit,
        currency_alpha: &str,
        installment: u16,
        card: &PaymentCard,
        customer: Option<&Customer>,
        callback_url: &str,
    ) -> Self {
        let price = format_price(amount);
        let (name, surname) = split_name(customer.and_then(|c| c.name.as_deref()));
        let email = customer
            .and_then(|c| c.email.clone())
            .unwrap_or_else(|| "cardholder@example.com".to_string());
        let ip = customer
            .and_then(|c| c.ip.clone())
            .unwrap_or_else(|| "127.0.0.1".to_string());
        let contact_name = customer
            .and_then(|c| c.name.clone())
            .unwrap_or_else(|| card.holder.peek().clone());
        let address = IyzicoAddress {
            contact_name,
            city: "Istanbul".to_string(),
            country: "Turkey".to_string(),
            address: "-".to_string(),
        };

        Self {
            locale: LOCALE.to_string(),
            conversation_id: transaction_id.to_string(),
            price: price.clone(),
            paid_price: price.clone(),
            installment,
            payment_channel: "WEB".to_string(),
            payment_group: "PRODUCT".to_string(),
            payment_card: IyzicoPaymentCard {
                card_holder_name: card.holder.clone(),
                card_number: card.number.clone(),
                expire_month: card.exp_month.clone(),
                expire_year: card.exp_year.clone(),
                cvc: card.cvv.clone(),
                register_card: 0,
            },
            buyer: IyzicoBuyer {
                id: transaction_id.to_string(),
                name,
                surname,
                email,
                identity_number: "11111111111".to_string(),
                registration_address: "-".to_string(),
                city: "Istanbul".to_string(),
                country: "Turkey".to_string(),
                ip,
            },
            shipping_address: address_clone(&address),
            billing_address: address,
            basket_items: vec![IyzicoBasketItem {
                id: transaction_id.to_string(),
                name: "Payment".to_string(),
                category1: "General".to_string(),
                item_type: "VIRTUAL".to_string(),
                price,
            }],
            currency: currency_alpha.to_string(),
            callback_url: callback_url.to_string(),
        }
    }
}

fn address_clone(address: &IyzicoAddress) -> IyzicoAddress {
    IyzicoAddress {
        contact_name: address.contact_name.clone(),
        city: address.city.clone(),
        country: address.country.clone(),
        address: address.address.clone(),
    }
}

fn split_name(full: Option<&str>) -> (String, String) {
    match full {
        Some(full) => match full.rsplit_once(' ') {
            Some((name, surname)) => (name.to_string(), surname.to_string()),
            None => (full.to_string(), full.to_string()),
        },
        None => ("Cardholder".to_string(), "Cardholder".to_string()),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreeDsAuthRequest {
    pub locale: String,
    pub conversation_id: String,
    pub payment_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_data: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreeDsInitializeResponse {
    pub status: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    #[serde(rename = "threeDSHtmlContent")]
    pub three_ds_html_content: Option<String>,
    pub payment_id: Option<String>,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreeDsAuthResponse {
    pub status: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub payment_id: Option<String>,
}

pub fn is_success(status: Option<&str>) -> bool {
    status == Some(STATUS_SUCCESS)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn price_trims_trailing_zeros_but_keeps_one_decimal() {
        assert_eq!(format_price(MinorUnit::new(15000)), "150.0");
        assert_eq!(format_price(MinorUnit::new(15050)), "150.5");
        assert_eq!(format_price(MinorUnit::new(15055)), "150.55");
        assert_eq!(format_price(MinorUnit::new(100)), "1.0");
    }

    #[test]
    fn auth_hash_composition() {
        let auth = IyzicoAuthType {
            api_key: Secret::new("api-key".to_string()),
            secret_key: Secret::new("api-secret".to_string()),
        };
        let body = serde_json::json!({"locale": "tr", "conversationId": "tx-1"});
        let headers = auth_headers(&auth, &body).expect("headers");

        let authorization = headers
            .iter()
            .find(|(name, _)| name == "Authorization")
            .map(|(_, value)| value.clone().into_inner())
            .expect("authorization header");
        assert!(authorization.starts_with("IYZWS api-key:"));

        let rnd = headers
            .iter()
            .find(|(name, _)| name == "x-iyzi-rnd")
            .map(|(_, value)| value.clone().into_inner())
            .expect("rnd header");
        let expected_hash = sha1_pack_base64(
            format!("api-key{rnd}api-secret[locale=tr,conversationId=tx-1]").as_bytes(),
        )
        .expect("digest");
        assert_eq!(authorization, format!("IYZWS api-key:{expected_hash}"));
    }

    #[test]
    fn initialize_request_serializes_camel_case() {
        let card = PaymentCard {
            holder: Secret::new("AD SOYAD".to_string()),
            number: Secret::new("4282209004348016".to_string()),
            exp_month: Secret::new("03".to_string()),
            exp_year: Secret::new("28".to_string()),
            cvv: Secret::new("358".to_string()),
        };
        let request = ThreeDsInitializeRequest::new(
            "tx-1",
            MinorUnit::new(15000),
            "TRY",
            1,
            &card,
            None,
            "https://gw/payment/tx-1/callback",
        );
        let value = serde_json::to_value(&request).expect("value");

        assert_eq!(value.get("conversationId").and_then(|v| v.as_str()), Some("tx-1"));
        assert_eq!(value.get("price").and_then(|v| v.as_str()), Some("150.0"));
        assert_eq!(value.get("callbackUrl").and_then(|v| v.as_str()), Some("https://gw/payment/tx-1/callback"));
        assert!(value
            .get("paymentCard")
            .and_then(|v| v.get("cardNumber"))
            .is_some());
    }

    #[test]
    fn html_content_response_parses() {
        let body = r#"{
            "status": "success",
            "threeDSHtmlContent": "PGh0bWw+PC9odG1sPg==",
            "paymentId": "12345",
            "conversationId": "tx-1"
        }"#;
        let response: ThreeDsInitializeResponse = serde_json::from_str(body).expect("parse");
        assert!(is_success(response.status.as_deref()));
        assert_eq!(response.payment_id.as_deref(), Some("12345"));
    }
}
