//! In-memory storage double with the same semantics as the MongoDB
//! store, used by the orchestrator and state-machine tests.

use common_enums::{Currency, TransactionStatus};
use common_utils::{encryption::FieldCipher, errors::CustomResult};
use error_stack::report;
use sanalpos_domain_models::{
    StorageError, Terminal, TerminalStorageInterface, TerminalUpdate, Transaction,
    TransactionLog, TransactionStorageInterface,
};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct MockDb {
    terminals: Arc<Mutex<Vec<Terminal>>>,
    transactions: Arc<Mutex<Vec<Transaction>>>,
    cipher: FieldCipher,
}

impl std::fmt::Debug for MockDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MockDb")
    }
}

impl MockDb {
    pub fn new(cipher: FieldCipher) -> Self {
        Self {
            terminals: Arc::new(Mutex::new(Vec::new())),
            transactions: Arc::new(Mutex::new(Vec::new())),
            cipher,
        }
    }
}

#[async_trait::async_trait]
impl TerminalStorageInterface for MockDb {
    async fn insert_terminal(
        &self,
        mut terminal: Terminal,
    ) -> CustomResult<Terminal, StorageError> {
        terminal
            .encrypt_credentials(&self.cipher)
            .map_err(|report| report.change_context(StorageError::SerializationFailed))?;
        let mut terminals = self.terminals.lock().await;
        if terminals.iter().any(|existing| {
            existing.company_id == terminal.company_id && existing.bank_code == terminal.bank_code
        }) {
            return Err(report!(StorageError::DuplicateValue {
                entity: "terminal (company, bank)",
            }));
        }
        terminals.push(terminal.clone());
        Ok(terminal)
    }

    async fn find_terminal_by_id(&self, id: &str) -> CustomResult<Terminal, StorageError> {
        self.terminals
            .lock()
            .await
            .iter()
            .find(|terminal| terminal.id == id)
            .cloned()
            .ok_or_else(|| report!(StorageError::ValueNotFound(format!("terminal {id}"))))
    }

    async fn find_terminals_for_selection(
        &self,
        company_id: &str,
        currency: Currency,
    ) -> CustomResult<Vec<Terminal>, StorageError> {
        let mut candidates: Vec<Terminal> = self
            .terminals
            .lock()
            .await
            .iter()
            .filter(|terminal| {
                terminal.company_id == company_id
                    && terminal.status
                    && terminal.supports_currency(currency)
            })
            .cloned()
            .collect();
        // Stable sort keeps insertion order inside a priority tier.
        candidates.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(candidates)
    }

    async fn update_terminal(
        &self,
        id: &str,
        update: TerminalUpdate,
    ) -> CustomResult<Terminal, StorageError> {
        let mut terminals = self.terminals.lock().await;
        let terminal = terminals
            .iter_mut()
            .find(|terminal| terminal.id == id)
            .ok_or_else(|| report!(StorageError::ValueNotFound(format!("terminal {id}"))))?;
        update
            .apply(terminal, &self.cipher)
            .map_err(|report| report.change_context(StorageError::SerializationFailed))?;
        Ok(terminal.clone())
    }

    async fn set_default_for_currency(
        &self,
        id: &str,
        currency: Currency,
    ) -> CustomResult<(), StorageError> {
        let mut terminals = self.terminals.lock().await;
        let company_id = terminals
            .iter()
            .find(|terminal| terminal.id == id)
            .map(|terminal| terminal.company_id.clone())
            .ok_or_else(|| report!(StorageError::ValueNotFound(format!("terminal {id}"))))?;

        for terminal in terminals.iter_mut() {
            if terminal.company_id == company_id {
                if terminal.id == id {
                    if !terminal.default_currencies.contains(&currency) {
                        terminal.default_currencies.push(currency);
                    }
                } else {
                    terminal.default_currencies.retain(|c| *c != currency);
                }
            }
        }
        Ok(())
    }

    async fn delete_terminal(&self, id: &str) -> CustomResult<bool, StorageError> {
        let mut terminals = self.terminals.lock().await;
        let before = terminals.len();
        terminals.retain(|terminal| terminal.id != id);
        Ok(terminals.len() < before)
    }
}

#[async_trait::async_trait]
impl TransactionStorageInterface for MockDb {
    async fn insert_transaction(
        &self,
        transaction: Transaction,
    ) -> CustomResult<Transaction, StorageError> {
        self.transactions.lock().await.push(transaction.clone());
        Ok(transaction)
    }

    async fn find_transaction_by_id(&self, id: &str) -> CustomResult<Transaction, StorageError> {
        self.transactions
            .lock()
            .await
            .iter()
            .find(|transaction| transaction.id == id)
            .cloned()
            .ok_or_else(|| report!(StorageError::ValueNotFound(format!("transaction {id}"))))
    }

    async fn append_transaction_log(
        &self,
        id: &str,
        log: TransactionLog,
    ) -> CustomResult<(), StorageError> {
        let mut transactions = self.transactions.lock().await;
        let transaction = transactions
            .iter_mut()
            .find(|transaction| transaction.id == id)
            .ok_or_else(|| report!(StorageError::ValueNotFound(format!("transaction {id}"))))?;
        transaction.logs.push(log);
        Ok(())
    }

    async fn update_transaction_status(
        &self,
        id: &str,
        expected: &[TransactionStatus],
        target: TransactionStatus,
    ) -> CustomResult<bool, StorageError> {
        let mut transactions = self.transactions.lock().await;
        let transaction = transactions
            .iter_mut()
            .find(|transaction| transaction.id == id)
            .ok_or_else(|| report!(StorageError::ValueNotFound(format!("transaction {id}"))))?;
        if !expected.contains(&transaction.status) {
            return Ok(false);
        }
        transaction.status = target;
        Ok(true)
    }

    async fn save_secure(&self, updated: &Transaction) -> CustomResult<(), StorageError> {
        let mut transactions = self.transactions.lock().await;
        let transaction = transactions
            .iter_mut()
            .find(|transaction| transaction.id == updated.id)
            .ok_or_else(|| {
                report!(StorageError::ValueNotFound(format!(
                    "transaction {}",
                    updated.id
                )))
            })?;
        transaction.secure = updated.secure.clone();
        transaction.logs = updated.logs.clone();
        Ok(())
    }

    async fn finalize_transaction(
        &self,
        updated: &Transaction,
        expected: &[TransactionStatus],
    ) -> CustomResult<bool, StorageError> {
        let mut transactions = self.transactions.lock().await;
        let transaction = transactions
            .iter_mut()
            .find(|transaction| transaction.id == updated.id)
            .ok_or_else(|| {
                report!(StorageError::ValueNotFound(format!(
                    "transaction {}",
                    updated.id
                )))
            })?;
        if !expected.contains(&transaction.status) {
            return Ok(false);
        }
        transaction.status = updated.status;
        transaction.result = updated.result.clone();
        transaction.completed_at = updated.completed_at;
        transaction.refunded_at = updated.refunded_at;
        transaction.cancelled_at = updated.cancelled_at;
        transaction.card.cvv = updated.card.cvv.clone();
        Ok(true)
    }

    async fn clear_cvv(&self, id: &str) -> CustomResult<(), StorageError> {
        let mut transactions = self.transactions.lock().await;
        let transaction = transactions
            .iter_mut()
            .find(|transaction| transaction.id == id)
            .ok_or_else(|| report!(StorageError::ValueNotFound(format!("transaction {id}"))))?;
        transaction.card.cvv = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use common_enums::{BankCode, ProviderKind};
    use masking::Secret;
    use sanalpos_domain_models::{TerminalCredentials, TerminalNew};

    use super::*;

    fn terminal_new(bank_code: BankCode) -> TerminalNew {
        TerminalNew {
            company_id: "company-1".to_string(),
            name: format!("{bank_code}"),
            bank_code,
            provider: ProviderKind::Garanti,
            currencies: vec![Currency::Try],
            default_currencies: vec![],
            supported_card_families: vec![],
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
            priority: 0,
            test_mode: true,
            allow_invalid_certs: false,
        }
    }

    #[tokio::test]
    async fn duplicate_company_bank_is_a_conflict() {
        let cipher = FieldCipher::new("mock-db-tests");
        let db = MockDb::new(cipher.clone());

        db.insert_terminal(terminal_new(BankCode::Garanti).into_terminal(&cipher).expect("t"))
            .await
            .expect("first insert");
        let error = db
            .insert_terminal(terminal_new(BankCode::Garanti).into_terminal(&cipher).expect("t"))
            .await
            .expect_err("duplicate");
        assert!(matches!(
            error.current_context(),
            StorageError::DuplicateValue { .. }
        ));
    }

    #[tokio::test]
    async fn default_for_currency_clears_peers() {
        let cipher = FieldCipher::new("mock-db-tests");
        let db = MockDb::new(cipher.clone());

        let mut first = terminal_new(BankCode::Garanti);
        first.default_currencies = vec![Currency::Try];
        let first = db
            .insert_terminal(first.into_terminal(&cipher).expect("t"))
            .await
            .expect("insert");
        let second = db
            .insert_terminal(terminal_new(BankCode::Isbank).into_terminal(&cipher).expect("t"))
            .await
            .expect("insert");

        db.set_default_for_currency(&second.id, Currency::Try)
            .await
            .expect("set default");

        let first = db.find_terminal_by_id(&first.id).await.expect("find");
        let second = db.find_terminal_by_id(&second.id).await.expect("find");
        assert!(!first.is_default_for(Currency::Try));
        assert!(second.is_default_for(Currency::Try));
    }

    #[tokio::test]
    async fn status_cas_rejects_unexpected_state() {
        let cipher = FieldCipher::new("mock-db-tests");
        let db = MockDb::new(cipher.clone());

        let card = sanalpos_domain_models::PaymentCard {
            holder: Secret::new("AD SOYAD".to_string()),
            number: Secret::new("4282209004348016".to_string()),
            exp_month: Secret::new("03".to_string()),
            exp_year: Secret::new("28".to_string()),
            cvv: Secret::new("358".to_string()),
        };
        let tx = Transaction::from_new(
            sanalpos_domain_models::NewTransaction {
                company_id: "company-1".to_string(),
                terminal_id: "terminal-1".to_string(),
                kind: Default::default(),
                parent_id: None,
                amount: common_utils::types::MinorUnit::new(15000),
                currency: Currency::Try,
                installment: 1,
                card,
                bin_info: None,
                customer: None,
                external_id: None,
                gateway_user: None,
            },
            &cipher,
        )
        .expect("transaction");
        let tx = db.insert_transaction(tx).await.expect("insert");

        assert!(db
            .update_transaction_status(
                &tx.id,
                &[TransactionStatus::Pending],
                TransactionStatus::Processing
            )
            .await
            .expect("cas"));
        // Replay of the same transition loses.
        assert!(!db
            .update_transaction_status(
                &tx.id,
                &[TransactionStatus::Pending],
                TransactionStatus::Processing
            )
            .await
            .expect("cas"));
    }
}
