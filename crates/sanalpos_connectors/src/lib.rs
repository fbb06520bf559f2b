//! Acquirer protocol adapters.
//!
//! Every Turkish VPOS speaks its own wire dialect - ISO-8859-9 XML,
//! form-encoded hash chains, Triple-DES callback packets, JSON with
//! PKI-string signatures - but all of them fit the same four-phase
//! shape: initialize, serve the ACS form, verify the issuer callback,
//! provision. [`api::ProviderAdapter`] is that shared contract; the
//! modules under [`connectors`] are the bit-exact per-bank
//! implementations.

pub mod api;
pub mod connectors;
pub mod http;
pub mod types;
pub mod utils;

pub use api::{get_connector, Capabilities, ConnectorError, ProviderAdapter};
pub use http::HttpClient;
pub use types::{AttemptOutcome, PaymentFlowData, SessionContext};
