//! YKB POSNET wire types: ISO-8859-9 XML posted as `xmldata=`, the
//! Triple-DES `MerchantPacket` callback and the SHA-256 MAC chain.

use common_utils::{
    crypto::{md5_hex_upper, sha256_base64, tdes_cbc_decrypt},
    errors::CustomResult,
};
use error_stack::{report, ResultExt};
use masking::{PeekInterface, Secret};
use sanalpos_domain_models::TerminalAuth;
use serde::{Deserialize, Serialize};

use crate::api::ConnectorError;

/// Statuses the issuer may report that still provision successfully.
pub const ACCEPTED_MD_STATUSES: &[&str] = &["1", "2", "4", "9"];

pub struct YkbAuthType {
    pub merchant_id: Secret<String>,
    pub terminal_id: Secret<String>,
    pub posnet_id: Secret<String>,
    pub store_key: Secret<String>,
}

impl TryFrom<&TerminalAuth> for YkbAuthType {
    type Error = error_stack::Report<ConnectorError>;

    fn try_from(auth: &TerminalAuth) -> Result<Self, Self::Error> {
        let posnet_id = auth
            .username
            .clone()
            .ok_or(ConnectorError::FailedToObtainAuthType)?;
        Ok(Self {
            merchant_id: auth.merchant_id.clone(),
            terminal_id: auth.terminal_id.clone(),
            posnet_id,
            store_key: auth.store_key.clone(),
        })
    }
}

/// POSNET order ids are 20 characters, zero-padded on the left.
pub fn format_xid(order_id: &str) -> String {
    let tail: String = order_id
        .chars()
        .rev()
        .take(20)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("{tail:0>20}")
}

#[derive(Debug, Serialize)]
#[serde(rename = "posnetRequest")]
pub struct PosnetOosRequest {
    pub mid: Secret<String>,
    pub tid: Secret<String>,
    #[serde(rename = "oosRequestData")]
    pub oos_request_data: OosRequestData,
}

#[derive(Debug, Serialize)]
pub struct OosRequestData {
    pub posnetid: Secret<String>,
    #[serde(rename = "XID")]
    pub xid: String,
    pub amount: String,
    #[serde(rename = "currencyCode")]
    pub currency_code: String,
    pub installment: String,
    #[serde(rename = "tranType")]
    pub tran_type: String,
    #[serde(rename = "cardHolderName")]
    pub card_holder_name: Secret<String>,
    pub ccno: Secret<String>,
    #[serde(rename = "expDate")]
    pub exp_date: Secret<String>,
    pub cvc: Secret<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename = "posnetRequest")]
pub struct PosnetOosTranRequest {
    pub mid: Secret<String>,
    pub tid: Secret<String>,
    #[serde(rename = "oosTranData")]
    pub oos_tran_data: OosTranData,
}

#[derive(Debug, Serialize)]
pub struct OosTranData {
    #[serde(rename = "bankData")]
    pub bank_data: String,
    #[serde(rename = "merchantData")]
    pub merchant_data: String,
    pub sign: String,
    #[serde(rename = "wpAmount")]
    pub wp_amount: String,
    pub mac: String,
}

#[derive(Debug, Serialize)]
#[serde(rename = "posnetRequest")]
pub struct PosnetSaleRequest {
    pub mid: Secret<String>,
    pub tid: Secret<String>,
    pub sale: PosnetSale,
}

#[derive(Debug, Serialize)]
pub struct PosnetSale {
    #[serde(rename = "orderID")]
    pub order_id: String,
    pub amount: String,
    #[serde(rename = "currencyCode")]
    pub currency_code: String,
    pub ccno: Secret<String>,
    #[serde(rename = "expDate")]
    pub exp_date: Secret<String>,
    pub cvc: Secret<String>,
    pub installment: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PosnetResponse {
    pub approved: Option<String>,
    #[serde(rename = "respCode")]
    pub resp_code: Option<String>,
    #[serde(rename = "respText")]
    pub resp_text: Option<String>,
    #[serde(rename = "authCode")]
    pub auth_code: Option<String>,
    pub hostlogkey: Option<String>,
    #[serde(rename = "oosRequestDataResponse")]
    pub oos_request_data_response: Option<OosRequestDataResponse>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OosRequestDataResponse {
    pub data1: Option<String>,
    pub data2: Option<String>,
    pub sign: Option<String>,
}

impl PosnetResponse {
    /// POSNET approves with `approved == "1"`.
    pub fn is_approved(&self) -> bool {
        self.approved.as_deref().is_some_and(|a| a == "1")
    }

    pub fn error_code(&self) -> String {
        self.resp_code
            .clone()
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn error_message(&self) -> String {
        self.resp_text
            .clone()
            .filter(|msg| !msg.is_empty())
            .unwrap_or_else(|| "declined".to_string())
    }
}

/// The decrypted `MerchantPacket`, split on `;` in protocol order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MerchantPacket {
    pub mid: String,
    pub tid: String,
    pub amount: String,
    pub installment: String,
    pub xid: String,
    pub tds_tx_status: String,
    pub tds_md_status: String,
    pub tds_md_error_message: String,
    pub trantime: String,
    pub currency: String,
}

impl MerchantPacket {
    /// Field order on the wire:
    /// `mid;tid;pay;instcount;xid;totalPoint;totalPointAmount;weburl;
    /// hostip;port;tds_tx_status;tds_md_status;tds_md_errormessage;
    /// trantime;currency`.
    pub fn from_fields(fields: &[String]) -> CustomResult<Self, ConnectorError> {
        if fields.len() < 12 {
            return Err(ConnectorError::PacketDecryptionFailed.into());
        }
        let get = |index: usize| fields.get(index).cloned().unwrap_or_default();
        Ok(Self {
            mid: get(0),
            tid: get(1),
            amount: get(2),
            installment: get(3),
            xid: get(4),
            tds_tx_status: get(10),
            tds_md_status: get(11),
            tds_md_error_message: get(12),
            trantime: get(13),
            currency: get(14),
        })
    }
}

/// The packet cipher key: the first 24 characters of the uppercase MD5
/// hex of the store key, interpreted as UTF-8 bytes.
pub fn packet_key(store_key: &str) -> CustomResult<Vec<u8>, ConnectorError> {
    let digest = md5_hex_upper(store_key.as_bytes())
        .change_context(ConnectorError::PacketDecryptionFailed)?;
    Ok(digest
        .get(..24)
        .ok_or(ConnectorError::PacketDecryptionFailed)?
        .as_bytes()
        .to_vec())
}

/// Strip the POSNET tail padding: raw bytes 0x00..=0x08.
fn strip_padding(mut bytes: Vec<u8>) -> Vec<u8> {
    while matches!(bytes.last(), Some(0x00..=0x08)) {
        bytes.pop();
    }
    bytes
}

/// Decrypt the `MerchantPacket` hex blob.
///
/// Layout: the first 16 hex characters are the 8-byte IV, the remainder
/// is the 3DES-CBC ciphertext. Historical bank-side framing differs, so
/// three data extractions are tried in order - the full remainder, the
/// remainder minus its last 8 hex characters, minus its last 16 - and
/// the first variant whose plaintext carries semicolons and splits into
/// at least 12 fields wins.
pub fn decrypt_merchant_packet(
    packet: &str,
    store_key: &str,
) -> CustomResult<Vec<String>, ConnectorError> {
    if packet.len() < 16 {
        return Err(ConnectorError::PacketDecryptionFailed.into());
    }
    let key = packet_key(store_key)?;
    let iv = hex::decode(&packet[..16])
        .map_err(|_| report!(ConnectorError::PacketDecryptionFailed))?;
    let remainder = &packet[16..];

    let variants = [
        Some(remainder),
        remainder.len().checked_sub(8).map(|end| &remainder[..end]),
        remainder.len().checked_sub(16).map(|end| &remainder[..end]),
    ];

    for data_hex in variants.into_iter().flatten() {
        if data_hex.is_empty() {
            continue;
        }
        let Ok(data) = hex::decode(data_hex) else {
            continue;
        };
        if data.is_empty() || data.len() % 8 != 0 {
            continue;
        }
        let Ok(clear) = tdes_cbc_decrypt(&data, &key, &iv) else {
            continue;
        };
        let stripped = strip_padding(clear);
        let (text, _, _) = encoding_rs::WINDOWS_1254.decode(&stripped);
        if !text.contains(';') {
            continue;
        }
        let fields: Vec<String> = text.split(';').map(|field| field.to_string()).collect();
        if fields.len() >= 12 {
            return Ok(fields);
        }
    }

    Err(ConnectorError::PacketDecryptionFailed.into())
}

/// The provision MAC chain:
/// `hashedStoreKey = sha256_base64(storeKey + ";" + tid)` and
/// `mac = sha256_base64(xid + ";" + amount + ";" + currency + ";" + mid
/// + ";" + hashedStoreKey)`, with `+` URL-escaped to `%2B` in the final
/// string.
pub fn provision_mac(
    auth: &YkbAuthType,
    xid: &str,
    amount: &str,
    currency_alpha: &str,
) -> CustomResult<String, ConnectorError> {
    let hashed_store_key = sha256_base64(
        format!("{};{}", auth.store_key.peek(), auth.terminal_id.peek()).as_bytes(),
    )
    .change_context(ConnectorError::RequestEncodingFailed)?;
    let mac = sha256_base64(
        format!(
            "{xid};{amount};{currency_alpha};{};{hashed_store_key}",
            auth.merchant_id.peek()
        )
        .as_bytes(),
    )
    .change_context(ConnectorError::RequestEncodingFailed)?;
    Ok(mac.replace('+', "%2B"))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use cbc::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};

    use super::*;

    const STORE_KEY: &str = "10,10,10,10,10,10,10,10";

    /// Build a packet the way the bank does: IV hex + 3DES-CBC hex.
    fn build_packet(plaintext: &str, extra_hex: &str) -> String {
        let key = packet_key(STORE_KEY).expect("key");
        let iv = *b"\x11\x22\x33\x44\x55\x66\x77\x88";

        let mut padded = plaintext.as_bytes().to_vec();
        while padded.len() % 8 != 0 {
            padded.push(0x00);
        }
        let encryptor =
            cbc::Encryptor::<des::TdesEde3>::new_from_slices(&key, &iv).expect("cipher");
        let length = padded.len();
        let ciphertext = encryptor
            .encrypt_padded_mut::<NoPadding>(&mut padded, length)
            .expect("encrypt")
            .to_vec();

        format!("{}{}{extra_hex}", hex::encode(iv), hex::encode(ciphertext))
    }

    const PACKET_CLEAR: &str =
        "7000679;30691298;15000;0;00000000000000000042;0;0;;;;1;1;;202403141516;TL";

    #[test]
    fn clean_packet_decrypts_through_the_full_variant() {
        let packet = build_packet(PACKET_CLEAR, "");
        let fields = decrypt_merchant_packet(&packet, STORE_KEY).expect("fields");
        let parsed = MerchantPacket::from_fields(&fields).expect("packet");

        assert_eq!(parsed.mid, "7000679");
        assert_eq!(parsed.tid, "30691298");
        assert_eq!(parsed.xid, "00000000000000000042");
        assert_eq!(parsed.tds_md_status, "1");
        assert_eq!(parsed.trantime, "202403141516");
        assert_eq!(parsed.currency, "TL");
    }

    #[test]
    fn trailing_frame_bytes_fall_back_to_the_shorter_variant() {
        // Eight extra hex characters leave the full remainder misaligned;
        // the minus-8 variant recovers the packet.
        let packet = build_packet(PACKET_CLEAR, "deadbeef");
        let fields = decrypt_merchant_packet(&packet, STORE_KEY).expect("fields");
        let parsed = MerchantPacket::from_fields(&fields).expect("packet");
        assert_eq!(parsed.tds_md_status, "1");
        assert_eq!(parsed.currency, "TL");
    }

    #[test]
    fn packet_shorter_than_iv_is_a_crypto_error() {
        assert!(decrypt_merchant_packet("0011223344", STORE_KEY).is_err());
    }

    #[test]
    fn packet_without_enough_fields_is_a_crypto_error() {
        let packet = build_packet("only;three;fields", "");
        assert!(decrypt_merchant_packet(&packet, STORE_KEY).is_err());
    }

    #[test]
    fn packet_key_is_24_chars_of_upper_md5() {
        let key = packet_key(STORE_KEY).expect("key");
        assert_eq!(key.len(), 24);
        let full = md5_hex_upper(STORE_KEY.as_bytes()).expect("digest");
        assert_eq!(key, full[..24].as_bytes());
    }

    #[test]
    fn xid_is_twenty_chars_zero_padded() {
        assert_eq!(format_xid("42"), "00000000000000000042");
        assert_eq!(format_xid("abcdefghijklmnopqrstuvwx"), "efghijklmnopqrstuvwx");
        assert_eq!(format_xid("").len(), 20);
    }

    #[test]
    fn provision_mac_composition() {
        let auth = YkbAuthType {
            merchant_id: Secret::new("7000679".to_string()),
            terminal_id: Secret::new("30691298".to_string()),
            posnet_id: Secret::new("1010".to_string()),
            store_key: Secret::new(STORE_KEY.to_string()),
        };
        let mac = provision_mac(&auth, "00000000000000000042", "15000", "TL").expect("mac");

        let hashed = sha256_base64(format!("{STORE_KEY};30691298").as_bytes()).expect("digest");
        let expected =
            sha256_base64(format!("00000000000000000042;15000;TL;7000679;{hashed}").as_bytes())
                .expect("digest")
                .replace('+', "%2B");
        assert_eq!(mac, expected);
        assert!(!mac.contains('+'));
    }
}
