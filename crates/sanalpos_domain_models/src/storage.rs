//! Storage interfaces the orchestrator works against. The router crate
//! provides the MongoDB implementation and an in-memory double for tests.

use common_enums::{Currency, TransactionStatus};
use common_utils::errors::CustomResult;

use crate::{
    terminal::{Terminal, TerminalUpdate},
    transaction::{Transaction, TransactionLog},
};

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Requested entity does not exist
    #[error("Value not found: {0}")]
    ValueNotFound(String),
    /// A uniqueness constraint was violated
    #[error("Duplicate value for {entity}")]
    DuplicateValue {
        /// Which constraint fired
        entity: &'static str,
    },
    /// Underlying database failure
    #[error("Database error")]
    DatabaseError,
    /// Document could not be (de)serialized
    #[error("Serialization failure")]
    SerializationFailed,
}

/// Persistence of terminals.
#[async_trait::async_trait]
pub trait TerminalStorageInterface: Send + Sync {
    /// Insert a terminal. Fails with [`StorageError::DuplicateValue`]
    /// when the company already has a terminal at the same bank.
    async fn insert_terminal(&self, terminal: Terminal) -> CustomResult<Terminal, StorageError>;

    /// Fetch by id.
    async fn find_terminal_by_id(&self, id: &str) -> CustomResult<Terminal, StorageError>;

    /// Active terminals of a company supporting the currency, sorted by
    /// priority descending then insertion order - the selection
    /// candidate list.
    async fn find_terminals_for_selection(
        &self,
        company_id: &str,
        currency: Currency,
    ) -> CustomResult<Vec<Terminal>, StorageError>;

    /// Apply a patch.
    async fn update_terminal(
        &self,
        id: &str,
        update: TerminalUpdate,
    ) -> CustomResult<Terminal, StorageError>;

    /// Make the terminal the company default for a currency,
    /// transactionally clearing the flag from its company peers.
    async fn set_default_for_currency(
        &self,
        id: &str,
        currency: Currency,
    ) -> CustomResult<(), StorageError>;

    /// Delete by id; `true` when something was removed.
    async fn delete_terminal(&self, id: &str) -> CustomResult<bool, StorageError>;
}

/// Persistence of transactions.
#[async_trait::async_trait]
pub trait TransactionStorageInterface: Send + Sync {
    /// Insert a freshly created transaction.
    async fn insert_transaction(
        &self,
        transaction: Transaction,
    ) -> CustomResult<Transaction, StorageError>;

    /// Fetch by id.
    async fn find_transaction_by_id(&self, id: &str) -> CustomResult<Transaction, StorageError>;

    /// Append a single log entry without touching the rest of the record.
    async fn append_transaction_log(
        &self,
        id: &str,
        log: TransactionLog,
    ) -> CustomResult<(), StorageError>;

    /// Compare-and-swap on the status field alone. Returns `false` when
    /// the current status was not in `expected` - the loser of a
    /// duplicate-callback race observes that and re-reads.
    async fn update_transaction_status(
        &self,
        id: &str,
        expected: &[TransactionStatus],
        target: TransactionStatus,
    ) -> CustomResult<bool, StorageError>;

    /// Re-persist the mixed-shape mutable subtree - secure bundle and
    /// logs - wholesale. Never a shallow field diff: adapters mutate the
    /// bundle in place and a partial write would silently drop nested
    /// state.
    async fn save_secure(&self, transaction: &Transaction) -> CustomResult<(), StorageError>;

    /// Finalize under a status CAS: status, result, completion/refund/
    /// cancel stamps and CVV zeroization land in one guarded update.
    /// Returns `false` when the CAS lost.
    async fn finalize_transaction(
        &self,
        transaction: &Transaction,
        expected: &[TransactionStatus],
    ) -> CustomResult<bool, StorageError>;

    /// Zeroize the stored CVV.
    async fn clear_cvv(&self, id: &str) -> CustomResult<(), StorageError>;
}
