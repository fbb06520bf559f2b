//! BIN resolution: the upstream lookup is injected behind a trait and
//! memoized by the caller.

use common_enums::{BankCode, CardBrand, CardType};
use common_utils::errors::CustomResult;
use serde::{Deserialize, Serialize};

/// What the BIN upstream knows about a card range.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BinInfo {
    /// Issuing bank display name
    #[serde(default)]
    pub bank: Option<String>,
    /// Issuing bank, when it is one of ours
    #[serde(default, alias = "bankCode")]
    pub bank_code: Option<BankCode>,
    /// Card scheme
    #[serde(default)]
    pub brand: Option<CardBrand>,
    /// Product type
    #[serde(default, rename = "type", alias = "cardType")]
    pub card_type: Option<CardType>,
    /// Loyalty family (Bonus, World, Axess, ...)
    #[serde(default)]
    pub family: Option<String>,
    /// ISO country code, lowercase
    #[serde(default)]
    pub country: Option<String>,
}

/// Errors of the BIN lookup upstream.
#[derive(Debug, thiserror::Error)]
pub enum BinLookupError {
    /// The BIN is not 6-8 digits
    #[error("Invalid BIN")]
    InvalidBin,
    /// Upstream refused or timed out
    #[error("BIN lookup failed")]
    LookupFailed,
}

/// Pluggable BIN resolver. Implementations must be safe to share across
/// request tasks; results are immutable once produced.
#[async_trait::async_trait]
pub trait BinResolver: Send + Sync {
    /// Resolve the leading PAN digits into issuer data.
    async fn resolve(&self, bin: &str) -> CustomResult<BinInfo, BinLookupError>;
}
