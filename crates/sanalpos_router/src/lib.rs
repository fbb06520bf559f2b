//! The sanalpos router: payment orchestration over the provider-adapter
//! framework, acquirer selection, MongoDB persistence and the HTTP
//! surface.

pub mod configs;
pub mod core;
pub mod db;
pub mod routes;
pub mod services;

pub use routes::app::AppState;
