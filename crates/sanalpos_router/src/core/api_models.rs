//! Request/response shapes of the payment API.

use common_enums::{BankCode, CardBrand, CardType, Currency, ProviderKind};
use serde::{Deserialize, Serialize};

pub const DEFAULT_COMPANY: &str = "default";

#[derive(Debug, Deserialize)]
pub struct BinQueryRequest {
    pub bin: String,
    pub amount: f64,
    pub currency: Currency,
    #[serde(default)]
    pub company: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinQueryResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_code: Option<BankCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_type: Option<CardType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<CardBrand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub pos: PosSummary,
    pub installments: Vec<InstallmentOption>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PosSummary {
    pub id: String,
    pub name: String,
    pub bank_code: BankCode,
    pub provider: ProviderKind,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InstallmentOption {
    pub count: u16,
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    #[serde(default, rename = "posId")]
    pub pos_id: Option<String>,
    pub amount: f64,
    pub currency: Currency,
    #[serde(default)]
    pub installment: Option<u16>,
    pub card: CardRequest,
    #[serde(default)]
    pub customer: Option<CustomerRequest>,
    #[serde(default, rename = "externalId")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CardRequest {
    pub holder: String,
    pub number: String,
    /// `MM/YY`
    pub expiry: String,
    pub cvv: String,
}

#[derive(Debug, Deserialize)]
pub struct CustomerRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreatedResponse {
    pub success: bool,
    pub transaction_id: String,
    pub form_url: String,
}

#[derive(Debug, Serialize)]
pub struct TransactionStatusResponse {
    pub status: bool,
    pub transaction: sanalpos_domain_models::TransactionResponse,
}

/// What the public callback page renders and posts to the parent
/// window.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackOutcome {
    pub transaction_id: String,
    pub success: bool,
    pub status: common_enums::TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub amount: f64,
    pub currency: Currency,
    pub masked_card: String,
}
