//! Domain entities of the payment core - terminals (merchant×acquirer
//! bindings) and transactions (single payment attempts) - together with
//! the storage interfaces the orchestrator drives them through.

pub mod bin_info;
pub mod storage;
pub mod terminal;
pub mod transaction;

pub use bin_info::{BinInfo, BinLookupError, BinResolver};
pub use storage::{StorageError, TerminalStorageInterface, TransactionStorageInterface};
pub use terminal::{
    CommissionPeriod, InstallmentCampaign, InstallmentPolicy, Terminal, TerminalAuth,
    TerminalCredentials, TerminalNew, TerminalUpdate, ThreeDsConfig, TransactionLimits,
};
pub use transaction::{
    Customer, NewTransaction, PaymentCard, SecureData, StoredCard, Transaction, TransactionLog,
    TransactionResponse, TransactionResult,
};
