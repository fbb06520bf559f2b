//! Acquirer-selection policy: an ordered rule chain over the company's
//! active terminals.

use common_enums::Currency;
use sanalpos_domain_models::{BinInfo, Terminal};

/// Pick the best terminal among `candidates` for this card.
///
/// `candidates` must already be the active terminals of the company
/// supporting `currency`, sorted by priority descending then insertion
/// order - the storage layer produces exactly that list. The rules, in
/// order:
///
/// 1. on-us: the BIN's issuing bank has a terminal here;
/// 2. card family: a terminal routes the BIN's loyalty family;
/// 3. default-for-currency;
/// 4. plain priority.
///
/// Ties inside a rule are already broken by the candidate order, which
/// keeps the result deterministic for fixed inputs.
pub fn select_terminal<'a>(
    candidates: &'a [Terminal],
    currency: Currency,
    bin_info: Option<&BinInfo>,
) -> Option<&'a Terminal> {
    if candidates.is_empty() {
        return None;
    }

    if let Some(bank_code) = bin_info.and_then(|info| info.bank_code) {
        if let Some(terminal) = candidates
            .iter()
            .find(|terminal| terminal.bank_code == bank_code)
        {
            return Some(terminal);
        }
    }

    if let Some(family) = bin_info.and_then(|info| info.family.as_deref()) {
        if let Some(terminal) = candidates
            .iter()
            .find(|terminal| terminal.matches_card_family(family))
        {
            return Some(terminal);
        }
    }

    if let Some(terminal) = candidates
        .iter()
        .find(|terminal| terminal.is_default_for(currency))
    {
        return Some(terminal);
    }

    candidates.first()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use common_enums::{BankCode, ProviderKind};
    use common_utils::encryption::FieldCipher;
    use masking::Secret;
    use sanalpos_domain_models::{TerminalCredentials, TerminalNew};

    use super::*;

    fn terminal(
        bank_code: BankCode,
        provider: ProviderKind,
        priority: i32,
        defaults: Vec<Currency>,
        families: Vec<&str>,
    ) -> Terminal {
        let cipher = FieldCipher::new("selection-tests");
        TerminalNew {
            company_id: "company-1".to_string(),
            name: format!("{bank_code} terminal"),
            bank_code,
            provider,
            currencies: vec![Currency::Try, Currency::Usd],
            default_currencies: defaults,
            supported_card_families: families.into_iter().map(String::from).collect(),
            credentials: TerminalCredentials {
                merchant_id: Secret::new("m".to_string()),
                terminal_id: Secret::new("t".to_string()),
                username: None,
                password: Some("p".to_string()),
                secret_key: None,
                extra: None,
            },
            three_ds: Default::default(),
            installment: Default::default(),
            limits: Default::default(),
            priority,
            test_mode: true,
            allow_invalid_certs: false,
        }
        .into_terminal(&cipher)
        .expect("terminal")
    }

    fn sort(mut terminals: Vec<Terminal>) -> Vec<Terminal> {
        terminals.sort_by(|a, b| b.priority.cmp(&a.priority));
        terminals
    }

    #[test]
    fn on_us_beats_priority() {
        // S4: Garanti terminal at priority 0, İş Bankası at 10; a
        // Garanti-issued BIN routes on-us regardless.
        let candidates = sort(vec![
            terminal(BankCode::Garanti, ProviderKind::Garanti, 0, vec![Currency::Try], vec![]),
            terminal(BankCode::Isbank, ProviderKind::Payten, 10, vec![], vec![]),
        ]);
        let bin_info = BinInfo {
            bank_code: Some(BankCode::Garanti),
            ..Default::default()
        };

        let selected =
            select_terminal(&candidates, Currency::Try, Some(&bin_info)).expect("terminal");
        assert_eq!(selected.bank_code, BankCode::Garanti);
    }

    #[test]
    fn family_match_when_no_on_us() {
        let candidates = sort(vec![
            terminal(BankCode::Isbank, ProviderKind::Payten, 10, vec![], vec![]),
            terminal(BankCode::Ykb, ProviderKind::Ykb, 0, vec![], vec!["World"]),
        ]);
        let bin_info = BinInfo {
            bank_code: Some(BankCode::Akbank),
            family: Some("world".to_string()),
            ..Default::default()
        };

        let selected =
            select_terminal(&candidates, Currency::Try, Some(&bin_info)).expect("terminal");
        assert_eq!(selected.bank_code, BankCode::Ykb);
    }

    #[test]
    fn default_for_currency_when_no_bin_match() {
        let candidates = sort(vec![
            terminal(BankCode::Isbank, ProviderKind::Payten, 10, vec![], vec![]),
            terminal(BankCode::Vakifbank, ProviderKind::Vakifbank, 0, vec![Currency::Usd], vec![]),
        ]);

        let selected = select_terminal(&candidates, Currency::Usd, None).expect("terminal");
        assert_eq!(selected.bank_code, BankCode::Vakifbank);
    }

    #[test]
    fn priority_fallback() {
        let candidates = sort(vec![
            terminal(BankCode::Isbank, ProviderKind::Payten, 5, vec![], vec![]),
            terminal(BankCode::Qnb, ProviderKind::Qnb, 10, vec![], vec![]),
        ]);

        let selected = select_terminal(&candidates, Currency::Try, None).expect("terminal");
        assert_eq!(selected.bank_code, BankCode::Qnb);
    }

    #[test]
    fn no_candidates_is_none() {
        assert!(select_terminal(&[], Currency::Try, None).is_none());
    }

    #[test]
    fn deterministic_for_fixed_inputs() {
        let candidates = sort(vec![
            terminal(BankCode::Isbank, ProviderKind::Payten, 5, vec![], vec![]),
            terminal(BankCode::Qnb, ProviderKind::Qnb, 5, vec![], vec![]),
        ]);
        let first = select_terminal(&candidates, Currency::Try, None).expect("terminal").id.clone();
        for _ in 0..10 {
            let again = select_terminal(&candidates, Currency::Try, None).expect("terminal");
            assert_eq!(again.id, first);
        }
    }
}
