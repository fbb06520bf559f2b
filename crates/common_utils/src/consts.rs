//! Consts module

/// Base64 engine used everywhere a wire format wants standard
/// (padded) base64.
pub const BASE64_ENGINE: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Outbound acquirer call timeout, seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// BIN lookup timeout, seconds.
pub const BIN_LOOKUP_TIMEOUT_SECS: u64 = 5;

/// Number of leading PAN digits that make up the BIN.
pub const BIN_LENGTH: usize = 8;
