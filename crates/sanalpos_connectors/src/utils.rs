//! Codec helpers shared by the adapters: XML with explicit encoding
//! declarations, ordered form encoding, the iyzico PKI string, the
//! auto-submitting ACS form document and the wire formatters for
//! amounts and installments.

use common_utils::{errors::CustomResult, types::MinorUnit};
use error_stack::ResultExt;
use serde::Serialize;

use crate::api::ConnectorError;

/// Serializes request structs to XML documents with a declaration.
#[derive(Debug)]
pub struct XmlSerializer;

impl XmlSerializer {
    /// Serialize `value`, prepend the `<?xml ...?>` declaration and, when
    /// the label names a non-UTF-8 charset the acquirer insists on
    /// (ISO-8859-9), encode the whole document into that charset.
    pub fn serialize_to_xml_bytes<T: Serialize>(
        value: &T,
        xml_version: &str,
        encoding: Option<&str>,
    ) -> CustomResult<Vec<u8>, ConnectorError> {
        let body = quick_xml::se::to_string(value)
            .change_context(ConnectorError::RequestEncodingFailed)?;
        let declaration = match encoding {
            Some(label) => format!(r#"<?xml version="{xml_version}" encoding="{label}"?>"#),
            None => format!(r#"<?xml version="{xml_version}"?>"#),
        };
        let document = format!("{declaration}{body}");
        Ok(encode_with_charset(&document, encoding))
    }

    /// Same as [`Self::serialize_to_xml_bytes`] but returns the document
    /// as text, for protocols that nest the XML inside a form field.
    pub fn serialize_to_xml_string<T: Serialize>(
        value: &T,
        xml_version: &str,
        encoding: Option<&str>,
    ) -> CustomResult<String, ConnectorError> {
        let body = quick_xml::se::to_string(value)
            .change_context(ConnectorError::RequestEncodingFailed)?;
        let declaration = match encoding {
            Some(label) => format!(r#"<?xml version="{xml_version}" encoding="{label}"?>"#),
            None => format!(r#"<?xml version="{xml_version}"?>"#),
        };
        Ok(format!("{declaration}{body}"))
    }
}

/// Encode text into the charset named by `label`, falling back to UTF-8
/// when the label is absent or unknown.
pub fn encode_with_charset(text: &str, label: Option<&str>) -> Vec<u8> {
    match label.and_then(|l| encoding_rs::Encoding::for_label(l.as_bytes())) {
        Some(encoding) if encoding != encoding_rs::UTF_8 => {
            encoding.encode(text).0.into_owned()
        }
        _ => text.as_bytes().to_vec(),
    }
}

/// Deserialize a connector XML response. Bodies that are not valid UTF-8
/// are decoded as ISO-8859-9 first; the legacy acquirers declare it but
/// reqwest hands us raw bytes.
pub fn deserialize_xml_to_struct<T: serde::de::DeserializeOwned>(
    xml_data: &[u8],
) -> CustomResult<T, ConnectorError> {
    let text = match std::str::from_utf8(xml_data) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1254.decode(xml_data);
            decoded.into_owned()
        }
    };
    let trimmed = text.trim();
    // Strip any declaration; quick-xml deserializes the element tree.
    let body = match trimmed.find("?>") {
        Some(end) if trimmed.starts_with("<?xml") => &trimmed[end + 2..],
        _ => trimmed,
    };
    quick_xml::de::from_str(body.trim())
        .change_context(ConnectorError::ResponseDeserializationFailed)
}

/// URL-encode a field list preserving order, which some gateway hash
/// schemes are sensitive to.
pub fn encode_form_fields(fields: &[(String, String)]) -> CustomResult<String, ConnectorError> {
    serde_urlencoded::to_string(fields).change_context(ConnectorError::RequestEncodingFailed)
}

/// Parse a semicolon-pair response body (`k=v;;k=v`), the QNB coding.
pub fn parse_semicolon_pairs(body: &str) -> std::collections::HashMap<String, String> {
    body.split(";;")
        .filter_map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

/// Render a JSON value as an iyzico PKI string: objects become
/// `[k=v,k=v]`, arrays become `[a, b]`, nulls are omitted and the
/// trailing separator is trimmed by construction.
pub fn pki_string(value: &serde_json::Value) -> String {
    fn render(value: &serde_json::Value) -> Option<String> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(b.to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => Some(format!(
                "[{}]",
                items
                    .iter()
                    .filter_map(render)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            serde_json::Value::Object(map) => Some(format!(
                "[{}]",
                map.iter()
                    .filter_map(|(key, val)| render(val).map(|v| format!("{key}={v}")))
                    .collect::<Vec<_>>()
                    .join(",")
            )),
        }
    }
    render(value).unwrap_or_default()
}

/// Minimal HTML attribute/body escaping for the emitted form documents.
pub fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// The auto-submitting redirect document that carries the cardholder's
/// browser to the issuer ACS.
pub fn build_auto_submit_form(endpoint: &str, fields: &[(String, String)]) -> String {
    let mut inputs = String::new();
    for (name, value) in fields {
        inputs.push_str(&format!(
            r#"      <input type="hidden" name="{}" value="{}" />
"#,
            html_escape(name),
            html_escape(value)
        ));
    }
    format!(
        r#"<!DOCTYPE html>
<html lang="tr">
  <head>
    <meta charset="utf-8" />
    <title>3-D Secure</title>
  </head>
  <body onload="document.forms[0].submit();">
    <form method="POST" action="{}">
{}      <noscript>
        <input type="submit" value="Devam" />
      </noscript>
    </form>
  </body>
</html>
"#,
        html_escape(endpoint),
        inputs
    )
}

/// Decimal two-place major-unit amount: `15000` -> `"150.00"`.
pub fn amount_major_string(amount: MinorUnit) -> String {
    amount.to_major_unit_string()
}

/// Cents-integer amount, also the POSNET two-decimal-with-dot-stripped
/// coding: `15000` -> `"15000"`.
pub fn amount_cents_string(amount: MinorUnit) -> String {
    amount.to_minor_unit_string()
}

/// Installment field omitted (empty) for single shot, numeric otherwise.
pub fn installment_or_empty(count: u16) -> String {
    if count <= 1 {
        String::new()
    } else {
        count.to_string()
    }
}

/// The POSNET installment coding: `"00"` for single shot, zero-padded
/// two digits otherwise.
pub fn installment_two_digit(count: u16) -> String {
    if count <= 1 {
        "00".to_string()
    } else {
        format!("{count:02}")
    }
}

/// Replace a value in logged payloads. Card numbers and CVVs never
/// reach the exchange log in clear.
pub fn redact_form_fields(
    fields: &[(String, String)],
    sensitive: &[&str],
) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|(key, value)| {
            let redacted = if sensitive
                .iter()
                .any(|candidate| key.eq_ignore_ascii_case(candidate))
            {
                serde_json::Value::String("*** redacted ***".to_string())
            } else {
                serde_json::Value::String(value.clone())
            };
            (key.clone(), redacted)
        })
        .collect();
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn pki_string_renders_nested_objects_and_arrays() {
        let value = serde_json::json!({
            "locale": "tr",
            "price": "150.0",
            "paymentCard": {
                "cardHolderName": "AD SOYAD",
                "expireYear": "2028"
            },
            "basketItems": [
                {"id": "item-1", "price": "150.0"},
            ],
            "empty": null,
        });
        assert_eq!(
            pki_string(&value),
            "[locale=tr,price=150.0,paymentCard=[cardHolderName=AD SOYAD,expireYear=2028],\
             basketItems=[[id=item-1,price=150.0]]"
                .to_owned()
                + "]"
        );
    }

    #[test]
    fn pki_string_joins_arrays_with_comma_space() {
        let value = serde_json::json!({"items": ["a", "b", "c"]});
        assert_eq!(pki_string(&value), "[items=[a, b, c]]");
    }

    #[test]
    fn semicolon_pairs_parse() {
        let parsed = parse_semicolon_pairs("ProcReturnCode=00;;AuthCode=123456;;ErrMsg=");
        assert_eq!(parsed.get("ProcReturnCode").map(String::as_str), Some("00"));
        assert_eq!(parsed.get("AuthCode").map(String::as_str), Some("123456"));
        assert_eq!(parsed.get("ErrMsg").map(String::as_str), Some(""));
    }

    #[test]
    fn form_fields_keep_order() {
        let fields = vec![
            ("zfield".to_string(), "1".to_string()),
            ("afield".to_string(), "2 3".to_string()),
        ];
        assert_eq!(
            encode_form_fields(&fields).expect("encode"),
            "zfield=1&afield=2+3"
        );
    }

    #[test]
    fn auto_submit_form_posts_to_endpoint() {
        let html = build_auto_submit_form(
            "https://acs.example/challenge",
            &[("PaReq".to_string(), "AA==".to_string())],
        );
        assert!(html.contains(r#"action="https://acs.example/challenge""#));
        assert!(html.contains(r#"name="PaReq" value="AA==""#));
        assert!(html.contains("document.forms[0].submit()"));
    }

    #[test]
    fn installment_codings() {
        assert_eq!(installment_or_empty(1), "");
        assert_eq!(installment_or_empty(6), "6");
        assert_eq!(installment_two_digit(1), "00");
        assert_eq!(installment_two_digit(6), "06");
        assert_eq!(installment_two_digit(12), "12");
    }

    #[test]
    fn charset_encoding_maps_turkish_letters() {
        // ISO-8859-9 maps ğ to 0xF0 and ş to 0xFE.
        let encoded = encode_with_charset("ğş", Some("ISO-8859-9"));
        assert_eq!(encoded, vec![0xF0, 0xFE]);
        let utf8 = encode_with_charset("ğş", None);
        assert_eq!(utf8, "ğş".as_bytes());
    }

    #[test]
    fn redaction_hides_sensitive_fields() {
        let fields = vec![
            ("cardnumber".to_string(), "4282209004348016".to_string()),
            ("orderid".to_string(), "order-1".to_string()),
        ];
        let logged = redact_form_fields(&fields, &["cardnumber"]);
        assert_eq!(
            logged.get("cardnumber").and_then(|v| v.as_str()),
            Some("*** redacted ***")
        );
        assert_eq!(logged.get("orderid").and_then(|v| v.as_str()), Some("order-1"));
    }
}
