//! The transaction entity: one payment attempt, its encrypted card, the
//! adapter-private 3-D bundle and the append-only exchange log.

use common_enums::{Currency, ProviderKind, TransactionKind, TransactionLogType, TransactionStatus};
use common_utils::{
    card,
    date_time,
    encryption::FieldCipher,
    errors::{CryptoError, CustomResult, ValidationError},
    types::MinorUnit,
};
use error_stack::report;
use masking::{PeekInterface, Secret};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::bin_info::BinInfo;

/// A single payment attempt against one terminal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    /// Storage identifier, also the order correlation id towards banks
    #[serde(rename = "_id")]
    pub id: String,
    /// Owning company
    pub company_id: String,
    /// Terminal the attempt runs on
    pub terminal_id: String,
    /// Sale, pre-auth or an inverse operation
    #[serde(default)]
    pub kind: TransactionKind,
    /// Original transaction for refund/cancel/post-auth children
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Amount in minor units
    pub amount: MinorUnit,
    /// Currency of the attempt
    pub currency: Currency,
    /// Installment count, 1 for single shot
    pub installment: u16,
    /// Card fields, encrypted at rest
    pub card: StoredCard,
    /// BIN resolution snapshot taken at create time
    #[serde(default)]
    pub bin_info: Option<BinInfo>,
    /// Customer snapshot
    #[serde(default)]
    pub customer: Option<Customer>,
    /// Lifecycle state
    #[serde(default)]
    pub status: TransactionStatus,
    /// Adapter-private 3-D bundle, persisted verbatim as a whole
    #[serde(default)]
    pub secure: SecureData,
    /// Terminal outcome
    #[serde(default)]
    pub result: Option<TransactionResult>,
    /// Append-only exchange log
    #[serde(default)]
    pub logs: Vec<TransactionLog>,
    /// Merchant-supplied correlation id
    #[serde(default)]
    pub external_id: Option<String>,
    /// Gateway user propagated from the ingress, for audit
    #[serde(default)]
    pub gateway_user: Option<String>,
    /// Creation timestamp
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Set when the attempt reaches a terminal state
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    /// Set on the original once a refund child succeeds
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub refunded_at: Option<OffsetDateTime>,
    /// Set on the original once a cancel child succeeds
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub cancelled_at: Option<OffsetDateTime>,
}

/// Card fields as persisted. `holder`, `number`, `expiry` and `cvv` are
/// ciphertext; only `masked` and `bin` are safe to project.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredCard {
    /// Cardholder name (ciphertext)
    pub holder: String,
    /// PAN (ciphertext)
    pub number: String,
    /// Expiry as `MM/YY` (ciphertext)
    pub expiry: String,
    /// CVV (ciphertext); cleared the moment the attempt succeeds
    #[serde(default)]
    pub cvv: Option<String>,
    /// Masked PAN for display
    pub masked: String,
    /// Numeric BIN, first eight PAN digits
    pub bin: u32,
}

/// Clear card data, in memory only.
#[derive(Clone, Debug)]
pub struct PaymentCard {
    /// Cardholder name
    pub holder: Secret<String>,
    /// PAN, digits only
    pub number: Secret<String>,
    /// Expiry month, two digits
    pub exp_month: Secret<String>,
    /// Expiry year, two digits
    pub exp_year: Secret<String>,
    /// Card verification value
    pub cvv: Secret<String>,
}

impl PaymentCard {
    /// Parse the `MM/YY` expiry the public API carries.
    pub fn parse_expiry(expiry: &str) -> CustomResult<(String, String), ValidationError> {
        let (month, year) = expiry.split_once('/').ok_or_else(|| {
            report!(ValidationError::IncorrectValueProvided {
                field_name: "card.expiry",
            })
        })?;
        let month = month.trim();
        let year = year.trim();
        let month_num: u8 = month.parse().map_err(|_| {
            report!(ValidationError::IncorrectValueProvided {
                field_name: "card.expiry",
            })
        })?;
        if !(1..=12).contains(&month_num) || year.len() != 2 {
            return Err(ValidationError::IncorrectValueProvided {
                field_name: "card.expiry",
            }
            .into());
        }
        Ok((format!("{month_num:02}"), year.to_string()))
    }

    /// `MMYY`, e.g. `"0328"`.
    pub fn expiry_mmyy(&self) -> String {
        format!("{}{}", self.exp_month.peek(), self.exp_year.peek())
    }

    /// `YYMM`, e.g. `"2803"`.
    pub fn expiry_yymm(&self) -> String {
        format!("{}{}", self.exp_year.peek(), self.exp_month.peek())
    }

    /// `YYYYMM`, e.g. `"202803"`. Two-digit years are anchored to 2000.
    pub fn expiry_yyyymm(&self) -> String {
        format!("20{}{}", self.exp_year.peek(), self.exp_month.peek())
    }
}

/// Customer snapshot taken at create time.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Customer {
    /// Full name
    #[serde(default)]
    pub name: Option<String>,
    /// E-mail address
    #[serde(default)]
    pub email: Option<String>,
    /// Phone number
    #[serde(default)]
    pub phone: Option<String>,
    /// Request IP
    #[serde(default)]
    pub ip: Option<String>,
}

/// The adapter-private 3-D bundle. An opaque tagged envelope: the
/// orchestrator persists it verbatim and whole; it is never diffed
/// field-by-field.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SecureData {
    /// Which adapter owns the payload
    #[serde(default)]
    pub provider: Option<ProviderKind>,
    /// Form fields for the ACS redirect, shape private to the adapter
    #[serde(default)]
    pub form_data: Option<serde_json::Value>,
    /// 3-DS verification artifacts carried through the callback
    #[serde(default)]
    pub md: Option<String>,
    /// Transaction id from the MPI
    #[serde(default)]
    pub xid: Option<String>,
    /// Electronic commerce indicator
    #[serde(default)]
    pub eci: Option<String>,
    /// Cardholder authentication verification value
    #[serde(default)]
    pub cavv: Option<String>,
    /// Decrypted callback packet, where the protocol encrypts it
    #[serde(default)]
    pub decrypted: Option<serde_json::Value>,
    /// Pre-rendered 3-D form document, where the acquirer supplies one
    #[serde(default)]
    pub html: Option<String>,
}

/// Terminal outcome of the attempt.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransactionResult {
    /// Whether the acquirer approved
    pub success: bool,
    /// Acquirer's native result code
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: Option<String>,
    /// Authorization code on approval
    #[serde(default)]
    pub auth_code: Option<String>,
    /// Retrieval reference number on approval
    #[serde(default)]
    pub ref_number: Option<String>,
}

/// One entry of the append-only exchange log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionLog {
    /// What kind of exchange this captures
    #[serde(rename = "type")]
    pub log_type: TransactionLogType,
    /// Request payload (secrets already masked by the caller)
    pub request: serde_json::Value,
    /// Response payload
    pub response: serde_json::Value,
    /// When the entry was appended
    #[serde(with = "time::serde::rfc3339")]
    pub at: OffsetDateTime,
}

/// Input for creating a transaction.
#[derive(Clone, Debug)]
pub struct NewTransaction {
    /// Owning company
    pub company_id: String,
    /// Terminal to run on
    pub terminal_id: String,
    /// Operation kind
    pub kind: TransactionKind,
    /// Original transaction for inverse operations
    pub parent_id: Option<String>,
    /// Amount in minor units
    pub amount: MinorUnit,
    /// Currency
    pub currency: Currency,
    /// Installment count
    pub installment: u16,
    /// Clear card data
    pub card: PaymentCard,
    /// BIN snapshot
    pub bin_info: Option<BinInfo>,
    /// Customer snapshot
    pub customer: Option<Customer>,
    /// Merchant correlation id
    pub external_id: Option<String>,
    /// Gateway user header
    pub gateway_user: Option<String>,
}

/// Public projection of a transaction. This is the only shape that ever
/// leaves the service; encrypted fields have no path into it.
#[derive(Clone, Debug, Serialize)]
pub struct TransactionResponse {
    /// Transaction id
    pub id: String,
    /// Lifecycle state
    pub status: TransactionStatus,
    /// Amount in major units
    pub amount: f64,
    /// Currency
    pub currency: Currency,
    /// Installment count
    pub installment: u16,
    /// Masked card view
    pub card: CardProjection,
    /// Terminal outcome
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TransactionResult>,
    /// Creation timestamp
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Completion timestamp
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

/// The card as projected publicly.
#[derive(Clone, Debug, Serialize)]
pub struct CardProjection {
    /// Masked PAN
    pub masked: String,
    /// Numeric BIN
    pub bin: u32,
}

impl Transaction {
    /// Build the entity, encrypting the card on the way in and deriving
    /// the masked view and numeric BIN.
    pub fn from_new(new: NewTransaction, cipher: &FieldCipher) -> CustomResult<Self, CryptoError> {
        let pan = new.card.number.peek();
        let masked = card::mask_pan(pan);
        let bin = card::pan_bin(pan)
            .map_err(|_| report!(CryptoError::EncodingFailed))?;
        let expiry = format!(
            "{}/{}",
            new.card.exp_month.peek(),
            new.card.exp_year.peek()
        );

        Ok(Self {
            id: common_utils::generate_id(),
            company_id: new.company_id,
            terminal_id: new.terminal_id,
            kind: new.kind,
            parent_id: new.parent_id,
            amount: new.amount,
            currency: new.currency,
            installment: new.installment,
            card: StoredCard {
                holder: cipher.encrypt(new.card.holder.peek())?,
                number: cipher.encrypt(pan)?,
                expiry: cipher.encrypt(&expiry)?,
                cvv: Some(cipher.encrypt(new.card.cvv.peek())?),
                masked,
                bin,
            },
            bin_info: new.bin_info,
            customer: new.customer,
            status: TransactionStatus::Pending,
            secure: SecureData::default(),
            result: None,
            logs: Vec::new(),
            external_id: new.external_id,
            gateway_user: new.gateway_user,
            created_at: date_time::now(),
            completed_at: None,
            refunded_at: None,
            cancelled_at: None,
        })
    }

    /// Decrypt the stored card back into the in-memory clear shape.
    /// Fails once the CVV has been zeroized.
    pub fn decrypt_card(&self, cipher: &FieldCipher) -> CustomResult<PaymentCard, CryptoError> {
        let expiry = cipher.decrypt(&self.card.expiry)?;
        let (month, year) = expiry
            .split_once('/')
            .ok_or_else(|| report!(CryptoError::DecodingFailed))?;
        Ok(PaymentCard {
            holder: Secret::new(cipher.decrypt(&self.card.holder)?),
            number: Secret::new(cipher.decrypt(&self.card.number)?),
            exp_month: Secret::new(month.to_string()),
            exp_year: Secret::new(year.to_string()),
            cvv: Secret::new(
                self.card
                    .cvv
                    .as_deref()
                    .map(|cvv| cipher.decrypt(cvv))
                    .transpose()?
                    .unwrap_or_default(),
            ),
        })
    }

    /// Append an exchange log entry. Entries are never mutated after
    /// insertion.
    pub fn append_log(
        &mut self,
        log_type: TransactionLogType,
        request: serde_json::Value,
        response: serde_json::Value,
    ) {
        self.logs.push(TransactionLog {
            log_type,
            request,
            response,
            at: date_time::now(),
        });
    }

    /// Record an acquirer refusal on the result.
    pub fn set_failure(&mut self, code: impl Into<String>, message: impl Into<String>) {
        self.result = Some(TransactionResult {
            success: false,
            code: Some(code.into()),
            message: Some(message.into()),
            auth_code: None,
            ref_number: None,
        });
    }

    /// Record an approval on the result.
    pub fn set_approval(&mut self, auth_code: Option<String>, ref_number: Option<String>) {
        self.result = Some(TransactionResult {
            success: true,
            code: None,
            message: None,
            auth_code,
            ref_number,
        });
    }

    /// The public projection.
    pub fn public_view(&self) -> TransactionResponse {
        TransactionResponse {
            id: self.id.clone(),
            status: self.status,
            amount: self.amount.to_major_unit_f64(),
            currency: self.currency,
            installment: self.installment,
            card: CardProjection {
                masked: self.card.masked.clone(),
                bin: self.card.bin,
            },
            result: self.result.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    fn sample_card() -> PaymentCard {
        PaymentCard {
            holder: Secret::new("AD SOYAD".to_string()),
            number: Secret::new("4282209004348016".to_string()),
            exp_month: Secret::new("03".to_string()),
            exp_year: Secret::new("28".to_string()),
            cvv: Secret::new("358".to_string()),
        }
    }

    fn sample_new() -> NewTransaction {
        NewTransaction {
            company_id: "company-1".to_string(),
            terminal_id: "terminal-1".to_string(),
            kind: TransactionKind::Sale,
            parent_id: None,
            amount: MinorUnit::new(15000),
            currency: Currency::Try,
            installment: 1,
            card: sample_card(),
            bin_info: None,
            customer: None,
            external_id: None,
            gateway_user: None,
        }
    }

    #[test]
    fn create_encrypts_card_and_derives_projections() {
        let cipher = FieldCipher::new("master");
        let tx = Transaction::from_new(sample_new(), &cipher).expect("transaction");

        assert!(FieldCipher::is_encrypted(&tx.card.number));
        assert!(FieldCipher::is_encrypted(&tx.card.holder));
        assert!(FieldCipher::is_encrypted(&tx.card.expiry));
        assert!(FieldCipher::is_encrypted(tx.card.cvv.as_deref().expect("cvv")));
        assert_eq!(tx.card.masked, "4282 20** **** 8016");
        assert_eq!(tx.card.bin, 42822090);
        assert_eq!(tx.status, TransactionStatus::Pending);
    }

    #[test]
    fn decrypt_card_round_trips() {
        let cipher = FieldCipher::new("master");
        let tx = Transaction::from_new(sample_new(), &cipher).expect("transaction");
        let card = tx.decrypt_card(&cipher).expect("card");

        assert_eq!(card.number.peek(), "4282209004348016");
        assert_eq!(card.expiry_mmyy(), "0328");
        assert_eq!(card.expiry_yymm(), "2803");
        assert_eq!(card.expiry_yyyymm(), "202803");
        assert_eq!(card.cvv.peek(), "358");
    }

    #[test]
    fn expiry_parser_accepts_api_shape() {
        let (month, year) = PaymentCard::parse_expiry("3/28").expect("expiry");
        assert_eq!(month, "03");
        assert_eq!(year, "28");
        assert!(PaymentCard::parse_expiry("13/28").is_err());
        assert!(PaymentCard::parse_expiry("0328").is_err());
    }

    #[test]
    fn public_view_carries_only_masked_card() {
        let cipher = FieldCipher::new("master");
        let tx = Transaction::from_new(sample_new(), &cipher).expect("transaction");
        let view = serde_json::to_value(tx.public_view()).expect("serialize");

        let card = view.get("card").expect("card");
        assert_eq!(
            card.get("masked").and_then(|m| m.as_str()),
            Some("4282 20** **** 8016")
        );
        assert!(card.get("number").is_none());
        assert!(card.get("cvv").is_none());
        assert!(view.get("secure").is_none());
        assert!(view.get("logs").is_none());
    }

    #[test]
    fn logs_are_append_only() {
        let cipher = FieldCipher::new("master");
        let mut tx = Transaction::from_new(sample_new(), &cipher).expect("transaction");
        tx.append_log(
            TransactionLogType::Init,
            serde_json::json!({"request": 1}),
            serde_json::json!({"response": 1}),
        );
        tx.append_log(
            TransactionLogType::Provision,
            serde_json::json!({"request": 2}),
            serde_json::json!({"response": 2}),
        );
        assert_eq!(tx.logs.len(), 2);
        assert_eq!(tx.logs[0].log_type, TransactionLogType::Init);
    }
}
