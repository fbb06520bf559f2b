//! The terminal entity: one merchant bound to one acquirer at one bank.

use common_enums::{BankCode, Currency, ProviderKind};
use common_utils::{
    date_time,
    encryption::FieldCipher,
    errors::{CryptoError, CustomResult},
    types::MinorUnit,
};
use error_stack::ResultExt;
use masking::Secret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use time::OffsetDateTime;

fn default_true() -> bool {
    true
}

/// A merchant×acquirer binding with everything an adapter needs to talk
/// to the bank on the merchant's behalf.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Terminal {
    /// Storage identifier
    #[serde(rename = "_id")]
    pub id: String,
    /// Owning company
    pub company_id: String,
    /// Display name
    pub name: String,
    /// The acquiring bank
    pub bank_code: BankCode,
    /// Which protocol adapter speaks to this terminal
    pub provider: ProviderKind,
    /// Active flag; inactive terminals never get selected
    #[serde(default = "default_true")]
    pub status: bool,
    /// Routes requests at the acquirer's test endpoints
    #[serde(default)]
    pub test_mode: bool,
    /// Selection priority, higher wins
    #[serde(default)]
    pub priority: i32,
    /// Currencies this terminal accepts
    pub currencies: Vec<Currency>,
    /// Subset of `currencies` this terminal is the company default for
    #[serde(default)]
    pub default_currencies: Vec<Currency>,
    /// Card families (Bonus, World, Axess, ...) this terminal can route
    #[serde(default)]
    pub supported_card_families: Vec<String>,
    /// Acquirer credentials; secret fields are ciphertext at rest
    pub credentials: TerminalCredentials,
    /// 3-D Secure configuration
    #[serde(default)]
    pub three_ds: ThreeDsConfig,
    /// Installment policy
    #[serde(default)]
    pub installment: InstallmentPolicy,
    /// Time-indexed commission rates
    #[serde(default)]
    pub commission_periods: Vec<CommissionPeriod>,
    /// Per-transaction limits
    #[serde(default)]
    pub limits: TransactionLimits,
    /// Accept the acquirer's invalid TLS certificate. Explicit opt-in
    /// for legacy hosts, never a global default.
    #[serde(default)]
    pub allow_invalid_certs: bool,
    /// Creation timestamp
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Acquirer credentials. `password`, `secret_key` and `extra` are stored
/// as `"<iv-hex>:<cipher-hex>"` ciphertext; the separator sentinel keeps
/// re-encryption idempotent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TerminalCredentials {
    /// Merchant number at the acquirer
    pub merchant_id: Secret<String>,
    /// Terminal number at the acquirer
    pub terminal_id: Secret<String>,
    /// API username, where the protocol wants one
    #[serde(default)]
    pub username: Option<Secret<String>>,
    /// API password (ciphertext at rest)
    #[serde(default)]
    pub password: Option<String>,
    /// API secret / key (ciphertext at rest)
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Adapter-specific extra credentials as a JSON string (ciphertext)
    #[serde(default)]
    pub extra: Option<String>,
}

/// 3-D Secure configuration of a terminal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThreeDsConfig {
    /// Whether 3-D flows are available
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Whether non-3-D (direct) payments are refused
    #[serde(default)]
    pub required: bool,
    /// The acquirer 3-D store key (ciphertext at rest)
    #[serde(default)]
    pub store_key: Option<String>,
    /// Override of the mdStatus values accepted on callback. `None`
    /// keeps each adapter's own default set.
    #[serde(default)]
    pub accepted_md_statuses: Option<Vec<String>>,
}

impl Default for ThreeDsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            required: false,
            store_key: None,
            accepted_md_statuses: None,
        }
    }
}

/// Installment policy of a terminal. Rates are stored per count but not
/// yet applied to option amounts; customer-facing price adjustment is an
/// extension point.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstallmentPolicy {
    /// Whether installments are offered at all
    #[serde(default)]
    pub enabled: bool,
    /// Smallest offered count above single shot
    #[serde(default = "InstallmentPolicy::default_min_count")]
    pub min_count: u16,
    /// Largest offered count
    #[serde(default = "InstallmentPolicy::default_max_count")]
    pub max_count: u16,
    /// Minimum basket amount for installments
    #[serde(default)]
    pub min_amount: MinorUnit,
    /// Commission rate per installment count
    #[serde(default)]
    pub rates: BTreeMap<String, f64>,
    /// Campaigns keyed by card family or BIN prefix
    #[serde(default)]
    pub campaigns: Vec<InstallmentCampaign>,
}

impl InstallmentPolicy {
    const fn default_min_count() -> u16 {
        2
    }

    const fn default_max_count() -> u16 {
        12
    }
}

impl Default for InstallmentPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            min_count: Self::default_min_count(),
            max_count: Self::default_max_count(),
            min_amount: MinorUnit::new(0),
            rates: BTreeMap::new(),
            campaigns: Vec::new(),
        }
    }
}

/// An installment campaign scoped to a card family or a BIN prefix.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstallmentCampaign {
    /// Card family the campaign applies to
    #[serde(default)]
    pub card_family: Option<String>,
    /// BIN prefix the campaign applies to
    #[serde(default)]
    pub bin_prefix: Option<String>,
    /// Offered installment counts
    pub counts: Vec<u16>,
    /// Campaign commission rate
    #[serde(default)]
    pub rate: Option<f64>,
}

/// A commission rate valid over a time window.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CommissionPeriod {
    /// Start of validity
    #[serde(with = "time::serde::rfc3339")]
    pub valid_from: OffsetDateTime,
    /// End of validity; open-ended when absent
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub valid_to: Option<OffsetDateTime>,
    /// Rate in percent
    pub rate: f64,
    /// Restrict to a specific installment count
    #[serde(default)]
    pub installment_count: Option<u16>,
}

/// Per-transaction amount limits.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransactionLimits {
    /// Smallest chargeable amount
    #[serde(default)]
    pub min_amount: Option<MinorUnit>,
    /// Largest chargeable amount
    #[serde(default)]
    pub max_amount: Option<MinorUnit>,
}

/// Decrypted credentials view handed to adapters. Derived per call and
/// never written back.
#[derive(Clone, Debug)]
pub struct TerminalAuth {
    /// Merchant number
    pub merchant_id: Secret<String>,
    /// Terminal number
    pub terminal_id: Secret<String>,
    /// API username
    pub username: Option<Secret<String>>,
    /// Decrypted API password (empty when unset)
    pub password: Secret<String>,
    /// Decrypted API secret
    pub secret_key: Secret<String>,
    /// Decrypted 3-D store key
    pub store_key: Secret<String>,
    /// Decrypted adapter-specific extras
    pub extra: Option<serde_json::Value>,
}

impl Terminal {
    /// Whether this terminal accepts the given currency.
    pub fn supports_currency(&self, currency: Currency) -> bool {
        self.currencies.contains(&currency)
    }

    /// Whether this terminal is the company default for the currency.
    pub fn is_default_for(&self, currency: Currency) -> bool {
        self.default_currencies.contains(&currency)
    }

    /// Case-insensitive card-family match.
    pub fn matches_card_family(&self, family: &str) -> bool {
        self.supported_card_families
            .iter()
            .any(|supported| supported.eq_ignore_ascii_case(family))
    }

    /// Field-encrypt the secret credential fields wherever plaintext is
    /// detected. Safe to call repeatedly; the ciphertext sentinel makes
    /// it a no-op on already-encrypted values.
    pub fn encrypt_credentials(&mut self, cipher: &FieldCipher) -> CustomResult<(), CryptoError> {
        if let Some(password) = self.credentials.password.take() {
            self.credentials.password = Some(cipher.encrypt(&password)?);
        }
        if let Some(secret_key) = self.credentials.secret_key.take() {
            self.credentials.secret_key = Some(cipher.encrypt(&secret_key)?);
        }
        if let Some(extra) = self.credentials.extra.take() {
            self.credentials.extra = Some(cipher.encrypt(&extra)?);
        }
        if let Some(store_key) = self.three_ds.store_key.take() {
            self.three_ds.store_key = Some(cipher.encrypt(&store_key)?);
        }
        Ok(())
    }

    /// Produce the decrypted credentials view for an adapter call.
    pub fn decrypt_credentials(
        &self,
        cipher: &FieldCipher,
    ) -> CustomResult<TerminalAuth, CryptoError> {
        let decrypt_opt = |value: &Option<String>| -> CustomResult<String, CryptoError> {
            value
                .as_deref()
                .map(|v| cipher.decrypt(v))
                .transpose()
                .map(Option::unwrap_or_default)
        };

        let extra = decrypt_opt(&self.credentials.extra)?;
        let extra = if extra.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str(&extra)
                    .change_context(CryptoError::DecodingFailed)
                    .attach_printable("credentials.extra is not valid JSON")?,
            )
        };

        Ok(TerminalAuth {
            merchant_id: self.credentials.merchant_id.clone(),
            terminal_id: self.credentials.terminal_id.clone(),
            username: self.credentials.username.clone(),
            password: Secret::new(decrypt_opt(&self.credentials.password)?),
            secret_key: Secret::new(decrypt_opt(&self.credentials.secret_key)?),
            store_key: Secret::new(decrypt_opt(&self.three_ds.store_key)?),
            extra,
        })
    }
}

/// Input for creating a terminal.
#[derive(Clone, Debug, Deserialize)]
pub struct TerminalNew {
    /// Owning company
    pub company_id: String,
    /// Display name
    pub name: String,
    /// Acquiring bank
    pub bank_code: BankCode,
    /// Protocol adapter
    pub provider: ProviderKind,
    /// Accepted currencies; must be non-empty
    pub currencies: Vec<Currency>,
    /// Currencies this terminal should be the company default for
    #[serde(default)]
    pub default_currencies: Vec<Currency>,
    /// Supported card families
    #[serde(default)]
    pub supported_card_families: Vec<String>,
    /// Credentials, secret fields in plaintext at this point
    pub credentials: TerminalCredentials,
    /// 3-DS configuration
    #[serde(default)]
    pub three_ds: ThreeDsConfig,
    /// Installment policy
    #[serde(default)]
    pub installment: InstallmentPolicy,
    /// Limits
    #[serde(default)]
    pub limits: TransactionLimits,
    /// Selection priority
    #[serde(default)]
    pub priority: i32,
    /// Test endpoints flag
    #[serde(default)]
    pub test_mode: bool,
    /// TLS relaxation opt-in
    #[serde(default)]
    pub allow_invalid_certs: bool,
}

impl TerminalNew {
    /// Build the entity, encrypting credentials on the way in.
    pub fn into_terminal(self, cipher: &FieldCipher) -> CustomResult<Terminal, CryptoError> {
        let mut terminal = Terminal {
            id: common_utils::generate_id(),
            company_id: self.company_id,
            name: self.name,
            bank_code: self.bank_code,
            provider: self.provider,
            status: true,
            test_mode: self.test_mode,
            priority: self.priority,
            currencies: self.currencies,
            default_currencies: self.default_currencies,
            supported_card_families: self.supported_card_families,
            credentials: self.credentials,
            three_ds: self.three_ds,
            installment: self.installment,
            commission_periods: Vec::new(),
            limits: self.limits,
            allow_invalid_certs: self.allow_invalid_certs,
            created_at: date_time::now(),
        };
        terminal.encrypt_credentials(cipher)?;
        Ok(terminal)
    }
}

/// Partial update for a terminal. Absent fields stay untouched.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TerminalUpdate {
    /// New display name
    #[serde(default)]
    pub name: Option<String>,
    /// New active flag
    #[serde(default)]
    pub status: Option<bool>,
    /// New test flag
    #[serde(default)]
    pub test_mode: Option<bool>,
    /// New priority
    #[serde(default)]
    pub priority: Option<i32>,
    /// Replacement currency set
    #[serde(default)]
    pub currencies: Option<Vec<Currency>>,
    /// Replacement card family set
    #[serde(default)]
    pub supported_card_families: Option<Vec<String>>,
    /// Replacement credentials (plaintext secrets get encrypted)
    #[serde(default)]
    pub credentials: Option<TerminalCredentials>,
    /// Replacement 3-DS config
    #[serde(default)]
    pub three_ds: Option<ThreeDsConfig>,
    /// Replacement installment policy
    #[serde(default)]
    pub installment: Option<InstallmentPolicy>,
    /// Replacement limits
    #[serde(default)]
    pub limits: Option<TransactionLimits>,
}

impl TerminalUpdate {
    /// Apply the patch, re-encrypting any freshly supplied secrets.
    pub fn apply(
        self,
        terminal: &mut Terminal,
        cipher: &FieldCipher,
    ) -> CustomResult<(), CryptoError> {
        if let Some(name) = self.name {
            terminal.name = name;
        }
        if let Some(status) = self.status {
            terminal.status = status;
        }
        if let Some(test_mode) = self.test_mode {
            terminal.test_mode = test_mode;
        }
        if let Some(priority) = self.priority {
            terminal.priority = priority;
        }
        if let Some(currencies) = self.currencies {
            terminal
                .default_currencies
                .retain(|currency| currencies.contains(currency));
            terminal.currencies = currencies;
        }
        if let Some(families) = self.supported_card_families {
            terminal.supported_card_families = families;
        }
        if let Some(credentials) = self.credentials {
            terminal.credentials = credentials;
        }
        if let Some(three_ds) = self.three_ds {
            terminal.three_ds = three_ds;
        }
        if let Some(installment) = self.installment {
            terminal.installment = installment;
        }
        if let Some(limits) = self.limits {
            terminal.limits = limits;
        }
        terminal.encrypt_credentials(cipher)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use masking::PeekInterface;

    use super::*;

    fn sample_new() -> TerminalNew {
        TerminalNew {
            company_id: "company-1".to_string(),
            name: "Garanti production".to_string(),
            bank_code: BankCode::Garanti,
            provider: ProviderKind::Garanti,
            currencies: vec![Currency::Try],
            default_currencies: vec![Currency::Try],
            supported_card_families: vec!["Bonus".to_string()],
            credentials: TerminalCredentials {
                merchant_id: Secret::new("7000679".to_string()),
                terminal_id: Secret::new("30691298".to_string()),
                username: Some(Secret::new("PROVAUT".to_string())),
                password: Some("123qweASD/".to_string()),
                secret_key: None,
                extra: None,
            },
            three_ds: ThreeDsConfig {
                store_key: Some("12345678".to_string()),
                ..Default::default()
            },
            installment: InstallmentPolicy::default(),
            limits: TransactionLimits::default(),
            priority: 0,
            test_mode: false,
            allow_invalid_certs: false,
        }
    }

    #[test]
    fn create_encrypts_secret_fields() {
        let cipher = FieldCipher::new("master");
        let terminal = sample_new().into_terminal(&cipher).expect("terminal");

        let password = terminal.credentials.password.as_deref().expect("password");
        assert!(FieldCipher::is_encrypted(password));
        let store_key = terminal.three_ds.store_key.as_deref().expect("store key");
        assert!(FieldCipher::is_encrypted(store_key));
    }

    #[test]
    fn decrypted_view_round_trips() {
        let cipher = FieldCipher::new("master");
        let terminal = sample_new().into_terminal(&cipher).expect("terminal");
        let auth = terminal.decrypt_credentials(&cipher).expect("auth");

        assert_eq!(auth.password.peek(), "123qweASD/");
        assert_eq!(auth.store_key.peek(), "12345678");
        assert_eq!(auth.merchant_id.peek(), "7000679");
    }

    #[test]
    fn re_encryption_is_idempotent() {
        let cipher = FieldCipher::new("master");
        let mut terminal = sample_new().into_terminal(&cipher).expect("terminal");
        let once = terminal.credentials.password.clone();
        terminal.encrypt_credentials(&cipher).expect("re-encrypt");
        assert_eq!(terminal.credentials.password, once);
    }

    #[test]
    fn family_match_is_case_insensitive() {
        let cipher = FieldCipher::new("master");
        let terminal = sample_new().into_terminal(&cipher).expect("terminal");
        assert!(terminal.matches_card_family("bonus"));
        assert!(terminal.matches_card_family("BONUS"));
        assert!(!terminal.matches_card_family("world"));
    }
}
