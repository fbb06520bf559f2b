//! MongoDB-backed stores for terminals and transactions.

use common_enums::{Currency, TransactionStatus};
use common_utils::{encryption::FieldCipher, errors::CustomResult};
use error_stack::{report, ResultExt};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson, Bson},
    options::{FindOptions, IndexOptions},
    Client, Collection, IndexModel,
};
use sanalpos_domain_models::{
    StorageError, Terminal, TerminalStorageInterface, TerminalUpdate, Transaction,
    TransactionLog, TransactionStorageInterface,
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

const TERMINALS: &str = "terminals";
const TRANSACTIONS: &str = "transactions";
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone, Debug)]
pub struct MongoStore {
    client: Client,
    terminals: Collection<Terminal>,
    transactions: Collection<Transaction>,
    cipher: FieldCipher,
}

impl MongoStore {
    pub async fn new(uri: &str, cipher: FieldCipher) -> CustomResult<Self, StorageError> {
        let client = Client::with_uri_str(uri)
            .await
            .change_context(StorageError::DatabaseError)
            .attach_printable("failed to connect to MongoDB")?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database("sanalpos"));
        let store = Self {
            terminals: database.collection(TERMINALS),
            transactions: database.collection(TRANSACTIONS),
            client,
            cipher,
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> CustomResult<(), StorageError> {
        // One terminal per (company, bank) pairing.
        let index = IndexModel::builder()
            .keys(doc! { "company_id": 1, "bank_code": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.terminals
            .create_index(index, None)
            .await
            .change_context(StorageError::DatabaseError)?;
        Ok(())
    }

    fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
        match error.kind.as_ref() {
            mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(write)) => {
                write.code == DUPLICATE_KEY_CODE
            }
            _ => false,
        }
    }

    fn datetime_bson(value: Option<OffsetDateTime>) -> Bson {
        value
            .and_then(|dt| dt.format(&Rfc3339).ok())
            .map(Bson::String)
            .unwrap_or(Bson::Null)
    }

    fn status_filter(statuses: &[TransactionStatus]) -> CustomResult<Bson, StorageError> {
        let encoded: Vec<Bson> = statuses
            .iter()
            .map(to_bson)
            .collect::<Result<_, _>>()
            .change_context(StorageError::SerializationFailed)?;
        Ok(Bson::Document(doc! { "$in": encoded }))
    }
}

#[async_trait::async_trait]
impl TerminalStorageInterface for MongoStore {
    async fn insert_terminal(
        &self,
        mut terminal: Terminal,
    ) -> CustomResult<Terminal, StorageError> {
        terminal
            .encrypt_credentials(&self.cipher)
            .change_context(StorageError::SerializationFailed)?;
        self.terminals
            .insert_one(&terminal, None)
            .await
            .map_err(|error| {
                if Self::is_duplicate_key(&error) {
                    report!(StorageError::DuplicateValue {
                        entity: "terminal (company, bank)",
                    })
                } else {
                    report!(StorageError::DatabaseError)
                }
            })?;
        Ok(terminal)
    }

    async fn find_terminal_by_id(&self, id: &str) -> CustomResult<Terminal, StorageError> {
        self.terminals
            .find_one(doc! { "_id": id }, None)
            .await
            .change_context(StorageError::DatabaseError)?
            .ok_or_else(|| report!(StorageError::ValueNotFound(format!("terminal {id}"))))
    }

    async fn find_terminals_for_selection(
        &self,
        company_id: &str,
        currency: Currency,
    ) -> CustomResult<Vec<Terminal>, StorageError> {
        let currency_bson =
            to_bson(&currency).change_context(StorageError::SerializationFailed)?;
        let options = FindOptions::builder()
            .sort(doc! { "priority": -1, "created_at": 1 })
            .build();
        let cursor = self
            .terminals
            .find(
                doc! {
                    "company_id": company_id,
                    "status": true,
                    "currencies": currency_bson,
                },
                options,
            )
            .await
            .change_context(StorageError::DatabaseError)?;
        cursor
            .try_collect()
            .await
            .change_context(StorageError::DatabaseError)
    }

    async fn update_terminal(
        &self,
        id: &str,
        update: TerminalUpdate,
    ) -> CustomResult<Terminal, StorageError> {
        let mut terminal = self.find_terminal_by_id(id).await?;
        update
            .apply(&mut terminal, &self.cipher)
            .change_context(StorageError::SerializationFailed)?;
        self.terminals
            .replace_one(doc! { "_id": id }, &terminal, None)
            .await
            .change_context(StorageError::DatabaseError)?;
        Ok(terminal)
    }

    async fn set_default_for_currency(
        &self,
        id: &str,
        currency: Currency,
    ) -> CustomResult<(), StorageError> {
        let terminal = self.find_terminal_by_id(id).await?;
        let currency_bson =
            to_bson(&currency).change_context(StorageError::SerializationFailed)?;

        // Clearing the flag from company peers and setting it on the
        // target must land together, otherwise a crash in between
        // leaves two defaults for the currency.
        let mut session = self
            .client
            .start_session(None)
            .await
            .change_context(StorageError::DatabaseError)?;
        session
            .start_transaction(None)
            .await
            .change_context(StorageError::DatabaseError)?;

        let writes = async {
            self.terminals
                .update_many_with_session(
                    doc! { "company_id": &terminal.company_id, "_id": { "$ne": id } },
                    doc! { "$pull": { "default_currencies": currency_bson.clone() } },
                    None,
                    &mut session,
                )
                .await?;
            self.terminals
                .update_one_with_session(
                    doc! { "_id": id },
                    doc! { "$addToSet": { "default_currencies": currency_bson } },
                    None,
                    &mut session,
                )
                .await?;
            Ok::<_, mongodb::error::Error>(())
        }
        .await;

        match writes {
            Ok(()) => session
                .commit_transaction()
                .await
                .change_context(StorageError::DatabaseError),
            Err(error) => {
                let _ = session.abort_transaction().await;
                Err(error).change_context(StorageError::DatabaseError)
            }
        }
    }

    async fn delete_terminal(&self, id: &str) -> CustomResult<bool, StorageError> {
        let result = self
            .terminals
            .delete_one(doc! { "_id": id }, None)
            .await
            .change_context(StorageError::DatabaseError)?;
        Ok(result.deleted_count > 0)
    }
}

#[async_trait::async_trait]
impl TransactionStorageInterface for MongoStore {
    async fn insert_transaction(
        &self,
        transaction: Transaction,
    ) -> CustomResult<Transaction, StorageError> {
        self.transactions
            .insert_one(&transaction, None)
            .await
            .change_context(StorageError::DatabaseError)?;
        Ok(transaction)
    }

    async fn find_transaction_by_id(&self, id: &str) -> CustomResult<Transaction, StorageError> {
        self.transactions
            .find_one(doc! { "_id": id }, None)
            .await
            .change_context(StorageError::DatabaseError)?
            .ok_or_else(|| report!(StorageError::ValueNotFound(format!("transaction {id}"))))
    }

    async fn append_transaction_log(
        &self,
        id: &str,
        log: TransactionLog,
    ) -> CustomResult<(), StorageError> {
        let log_bson = to_bson(&log).change_context(StorageError::SerializationFailed)?;
        let result = self
            .transactions
            .update_one(
                doc! { "_id": id },
                doc! { "$push": { "logs": log_bson } },
                None,
            )
            .await
            .change_context(StorageError::DatabaseError)?;
        if result.matched_count == 0 {
            return Err(report!(StorageError::ValueNotFound(format!(
                "transaction {id}"
            ))));
        }
        Ok(())
    }

    async fn update_transaction_status(
        &self,
        id: &str,
        expected: &[TransactionStatus],
        target: TransactionStatus,
    ) -> CustomResult<bool, StorageError> {
        let target_bson = to_bson(&target).change_context(StorageError::SerializationFailed)?;
        let result = self
            .transactions
            .update_one(
                doc! { "_id": id, "status": Self::status_filter(expected)? },
                doc! { "$set": { "status": target_bson } },
                None,
            )
            .await
            .change_context(StorageError::DatabaseError)?;
        Ok(result.matched_count > 0)
    }

    async fn save_secure(&self, transaction: &Transaction) -> CustomResult<(), StorageError> {
        // The 3-D bundle is mixed-shape and adapter-private: always
        // re-persist the whole subtree, never a field diff.
        let secure =
            to_bson(&transaction.secure).change_context(StorageError::SerializationFailed)?;
        let logs =
            to_bson(&transaction.logs).change_context(StorageError::SerializationFailed)?;
        self.transactions
            .update_one(
                doc! { "_id": &transaction.id },
                doc! { "$set": { "secure": secure, "logs": logs } },
                None,
            )
            .await
            .change_context(StorageError::DatabaseError)?;
        Ok(())
    }

    async fn finalize_transaction(
        &self,
        transaction: &Transaction,
        expected: &[TransactionStatus],
    ) -> CustomResult<bool, StorageError> {
        let status =
            to_bson(&transaction.status).change_context(StorageError::SerializationFailed)?;
        let result_bson =
            to_bson(&transaction.result).change_context(StorageError::SerializationFailed)?;
        let cvv = transaction
            .card
            .cvv
            .clone()
            .map(Bson::String)
            .unwrap_or(Bson::Null);

        let update_result = self
            .transactions
            .update_one(
                doc! { "_id": &transaction.id, "status": Self::status_filter(expected)? },
                doc! { "$set": {
                    "status": status,
                    "result": result_bson,
                    "completed_at": Self::datetime_bson(transaction.completed_at),
                    "refunded_at": Self::datetime_bson(transaction.refunded_at),
                    "cancelled_at": Self::datetime_bson(transaction.cancelled_at),
                    "card.cvv": cvv,
                } },
                None,
            )
            .await
            .change_context(StorageError::DatabaseError)?;
        Ok(update_result.matched_count > 0)
    }

    async fn clear_cvv(&self, id: &str) -> CustomResult<(), StorageError> {
        self.transactions
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "card.cvv": Bson::Null } },
                None,
            )
            .await
            .change_context(StorageError::DatabaseError)?;
        Ok(())
    }
}
