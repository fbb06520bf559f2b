//! Browser-facing HTML: the result page the public callback route
//! renders, with the `postMessage` bridge for iframe integrators.

use sanalpos_connectors::utils::html_escape;

use crate::core::api_models::CallbackOutcome;

/// The result page. Always human-readable, and always posts the
/// structured outcome to the parent window.
pub fn result_page(outcome: &CallbackOutcome) -> String {
    let data = serde_json::to_string(outcome).unwrap_or_else(|_| "{}".to_string());
    let headline = if outcome.success {
        "Ödeme başarılı"
    } else {
        "Ödeme başarısız"
    };
    let message = outcome
        .message
        .clone()
        .unwrap_or_else(|| {
            if outcome.success {
                "İşleminiz onaylandı.".to_string()
            } else {
                "İşleminiz onaylanmadı.".to_string()
            }
        });

    format!(
        r#"<!DOCTYPE html>
<html lang="tr">
  <head>
    <meta charset="utf-8" />
    <title>Ödeme Sonucu</title>
  </head>
  <body>
    <h1>{}</h1>
    <p>{}</p>
    <p>{} - {:.2} {}</p>
    <script>
      window.parent.postMessage({{ type: 'payment_result', data: {} }}, '*');
    </script>
  </body>
</html>
"#,
        html_escape(headline),
        html_escape(&message),
        html_escape(&outcome.masked_card),
        outcome.amount,
        outcome.currency.iso_alpha_code(),
        data,
    )
}

/// An explanatory page for callbacks and form requests that cannot be
/// served (unknown transaction, wrong state). Silent drops are a
/// contract violation - something readable always comes back.
pub fn error_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="tr">
  <head>
    <meta charset="utf-8" />
    <title>Ödeme Sonucu</title>
  </head>
  <body>
    <h1>Ödeme işlenemedi</h1>
    <p>{}</p>
    <script>
      window.parent.postMessage({{ type: 'payment_result', data: {{ success: false, error: {} }} }}, '*');
    </script>
  </body>
</html>
"#,
        html_escape(message),
        serde_json::to_string(message).unwrap_or_else(|_| "\"error\"".to_string()),
    )
}

#[cfg(test)]
mod tests {
    use common_enums::{Currency, TransactionStatus};

    use super::*;

    #[test]
    fn result_page_posts_message_to_parent() {
        let outcome = CallbackOutcome {
            transaction_id: "tx-1".to_string(),
            success: false,
            status: TransactionStatus::Failed,
            code: Some("12".to_string()),
            message: Some("Red-Kart hatali".to_string()),
            amount: 150.0,
            currency: Currency::Try,
            masked_card: "4282 20** **** 8016".to_string(),
        };
        let html = result_page(&outcome);
        assert!(html.contains("payment_result"));
        assert!(html.contains("window.parent.postMessage"));
        assert!(html.contains("Red-Kart hatali"));
        assert!(html.contains(r#""code":"12""#));
    }

    #[test]
    fn error_page_never_drops_silently() {
        let html = error_page("transaction not found");
        assert!(html.contains("transaction not found"));
        assert!(html.contains("payment_result"));
    }
}
