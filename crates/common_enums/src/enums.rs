//! Closed enumerations used by terminals, transactions and the provider
//! adapters, together with the acquirer wire-coding tables that belong to
//! them.

use serde::{Deserialize, Serialize};

/// The currencies the platform accepts.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Currency {
    #[default]
    Try,
    Eur,
    Usd,
    Gbp,
}

impl Currency {
    /// Numeric ISO-4217 code as sent on most VPOS wire formats.
    pub const fn iso_numeric_code(self) -> &'static str {
        match self {
            Self::Try => "949",
            Self::Usd => "840",
            Self::Eur => "978",
            Self::Gbp => "826",
        }
    }

    /// The legacy POSNET alpha currency table.
    pub const fn posnet_alpha_code(self) -> &'static str {
        match self {
            Self::Try => "TL",
            Self::Usd => "US",
            Self::Eur => "EU",
            Self::Gbp => "PU",
        }
    }

    /// ISO alpha-3 code, used by JSON aggregators.
    pub const fn iso_alpha_code(self) -> &'static str {
        match self {
            Self::Try => "TRY",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
        }
    }
}

/// Banks a terminal can be bound to.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BankCode {
    Garanti,
    Isbank,
    Akbank,
    Ykb,
    Vakifbank,
    Halkbank,
    Ziraat,
    Qnb,
    Teb,
    Ing,
    Sekerbank,
    Denizbank,
    Kuveytturk,
}

/// Protocol adapter families. A terminal's provider decides which wire
/// dialect is spoken; several banks can share one provider (NestPay).
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProviderKind {
    Garanti,
    Akbank,
    Ykb,
    Vakifbank,
    Payten,
    Qnb,
    Denizbank,
    Kuveytturk,
    Paytr,
    Iyzico,
    Sigmapay,
}

/// Card scheme of the PAN.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CardBrand {
    Visa,
    #[serde(alias = "mastercard")]
    MasterCard,
    Amex,
    Troy,
}

impl CardBrand {
    /// VakıfBank VPOS `BrandName` code table. Troy is not routable over
    /// the MPI, hence no code.
    pub const fn vakifbank_brand_code(self) -> Option<&'static str> {
        match self {
            Self::Visa => Some("100"),
            Self::MasterCard => Some("200"),
            Self::Amex => Some("300"),
            Self::Troy => None,
        }
    }
}

/// Product type of the card.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CardType {
    Credit,
    Debit,
    Prepaid,
}

/// Lifecycle state of a payment attempt.
///
/// Transitions are monotonic along
/// `pending -> processing -> {success, failed}`; `cancelled` is reached
/// only from `success` through an approved cancel.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionStatus {
    #[default]
    Pending,
    Processing,
    Success,
    Failed,
    Cancelled,
}

impl TransactionStatus {
    /// Whether the status admits no further transition.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }
}

/// What kind of financial operation a transaction record represents.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionKind {
    #[default]
    Sale,
    PreAuth,
    PostAuth,
    Refund,
    Cancel,
}

/// Discriminator for entries in the transaction's append-only exchange log.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    PartialEq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionLogType {
    Init,
    #[serde(rename = "3d_form")]
    #[strum(serialize = "3d_form")]
    ThreeDForm,
    #[serde(rename = "3d_callback")]
    #[strum(serialize = "3d_callback")]
    ThreeDCallback,
    Provision,
    Refund,
    Cancel,
    Status,
    PreAuth,
    PostAuth,
    Error,
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn iso_numeric_codes_match_vendor_docs() {
        assert_eq!(Currency::Try.iso_numeric_code(), "949");
        assert_eq!(Currency::Usd.iso_numeric_code(), "840");
        assert_eq!(Currency::Eur.iso_numeric_code(), "978");
        assert_eq!(Currency::Gbp.iso_numeric_code(), "826");
    }

    #[test]
    fn posnet_alpha_codes_match_vendor_docs() {
        assert_eq!(Currency::Try.posnet_alpha_code(), "TL");
        assert_eq!(Currency::Usd.posnet_alpha_code(), "US");
        assert_eq!(Currency::Eur.posnet_alpha_code(), "EU");
        assert_eq!(Currency::Gbp.posnet_alpha_code(), "PU");
    }

    #[test]
    fn every_currency_has_wire_codes() {
        for currency in Currency::iter() {
            assert!(!currency.iso_numeric_code().is_empty());
            assert!(!currency.posnet_alpha_code().is_empty());
            assert_eq!(currency.iso_alpha_code().len(), 3);
        }
    }

    #[test]
    fn vakifbank_brand_codes() {
        assert_eq!(CardBrand::Visa.vakifbank_brand_code(), Some("100"));
        assert_eq!(CardBrand::MasterCard.vakifbank_brand_code(), Some("200"));
        assert_eq!(CardBrand::Amex.vakifbank_brand_code(), Some("300"));
        assert_eq!(CardBrand::Troy.vakifbank_brand_code(), None);
    }

    #[test]
    fn master_card_accepts_both_spellings() {
        let brand: CardBrand = serde_json::from_str(r#""master_card""#).expect("snake case");
        assert_eq!(brand, CardBrand::MasterCard);
        let brand: CardBrand = serde_json::from_str(r#""mastercard""#).expect("alias");
        assert_eq!(brand, CardBrand::MasterCard);
    }

    #[test]
    fn log_type_serializes_with_numeric_prefix() {
        let log_type = serde_json::to_string(&TransactionLogType::ThreeDCallback).expect("ser");
        assert_eq!(log_type, r#""3d_callback""#);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!TransactionStatus::Pending.is_terminal());
        assert!(!TransactionStatus::Processing.is_terminal());
        assert!(TransactionStatus::Success.is_terminal());
        assert!(TransactionStatus::Failed.is_terminal());
        assert!(TransactionStatus::Cancelled.is_terminal());
    }
}
