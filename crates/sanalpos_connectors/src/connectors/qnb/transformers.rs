//! QNB Finansbank PayFor wire types: the SHA-1 pack-base64 hash with
//! its historical PHP-microtime nonce and the `k=v;;k=v` response
//! coding.

use common_utils::{crypto::sha1_pack_base64, date_time, errors::CustomResult};
use error_stack::ResultExt;
use masking::Secret;
use rand::Rng;
use sanalpos_domain_models::TerminalAuth;

use crate::api::ConnectorError;

/// PayFor member id.
pub const MBR_ID: &str = "5";
pub const TXN_TYPE_AUTH: &str = "Auth";
pub const SECURE_TYPE_3D: &str = "3DModelPayment";
pub const SECURE_TYPE_NON_SECURE: &str = "NonSecure";
pub const PROC_RETURN_APPROVED: &str = "00";

pub struct QnbAuthType {
    pub merchant_id: Secret<String>,
    pub user_code: Secret<String>,
    pub user_pass: Secret<String>,
    pub merchant_pass: Secret<String>,
}

impl TryFrom<&TerminalAuth> for QnbAuthType {
    type Error = error_stack::Report<ConnectorError>;

    fn try_from(auth: &TerminalAuth) -> Result<Self, Self::Error> {
        let user_code = auth
            .username
            .clone()
            .ok_or(ConnectorError::FailedToObtainAuthType)?;
        Ok(Self {
            merchant_id: auth.merchant_id.clone(),
            user_code,
            user_pass: auth.password.clone(),
            merchant_pass: auth.store_key.clone(),
        })
    }
}

/// The historical nonce shape PayFor still expects:
/// `"<fractional>.<8 digits> <unix seconds>"` - PHP's `microtime()`.
pub fn microtime_rnd() -> String {
    let fraction = rand::thread_rng().gen_range(0..100_000_000u32);
    format!("0.{fraction:08} {}", date_time::unix_timestamp())
}

/// Request hash: `base64(hex->bytes(sha1(mbrId + orderId + amount +
/// okUrl + failUrl + txnType + installment + rnd + merchantPass)))`.
#[allow(clippy::too_many_arguments)]
pub fn request_hash(
    order_id: &str,
    amount: &str,
    ok_url: &str,
    fail_url: &str,
    txn_type: &str,
    installment: &str,
    rnd: &str,
    merchant_pass: &str,
) -> CustomResult<String, ConnectorError> {
    let hash_input = format!(
        "{MBR_ID}{order_id}{amount}{ok_url}{fail_url}{txn_type}{installment}{rnd}{merchant_pass}"
    );
    sha1_pack_base64(hash_input.as_bytes()).change_context(ConnectorError::RequestEncodingFailed)
}

/// PayFor single-shot installment coding.
pub fn installment_count(count: u16) -> String {
    if count <= 1 {
        "0".to_string()
    } else {
        count.to_string()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn request_hash_composition() {
        let rnd = "0.12345678 1710423456";
        let hash = request_hash(
            "order-1",
            "150.00",
            "https://gw/cb",
            "https://gw/cb",
            TXN_TYPE_AUTH,
            "0",
            rnd,
            "merchant-pass",
        )
        .expect("hash");

        let expected = sha1_pack_base64(
            format!("5order-1150.00https://gw/cbhttps://gw/cbAuth0{rnd}merchant-pass").as_bytes(),
        )
        .expect("digest");
        assert_eq!(hash, expected);
    }

    #[test]
    fn rnd_keeps_the_php_microtime_shape() {
        let rnd = microtime_rnd();
        let (fraction, seconds) = rnd.split_once(' ').expect("two parts");
        assert!(fraction.starts_with("0."));
        assert_eq!(fraction.len(), 10);
        assert!(fraction[2..].chars().all(|c| c.is_ascii_digit()));
        assert!(seconds.chars().all(|c| c.is_ascii_digit()));
        assert!(seconds.len() >= 10);
    }

    #[test]
    fn installment_coding() {
        assert_eq!(installment_count(1), "0");
        assert_eq!(installment_count(6), "6");
    }
}
