//! BIN lookup client with an in-process memo cache.
//!
//! The cache is shared across request tasks behind an async RwLock;
//! entries are immutable once inserted, so a stale double-insert under
//! races is harmless.

use std::collections::HashMap;
use std::time::Duration;

use common_utils::errors::CustomResult;
use error_stack::{report, ResultExt};
use sanalpos_domain_models::{BinInfo, BinLookupError, BinResolver};
use tokio::sync::RwLock;

pub struct BinService {
    client: reqwest::Client,
    base_url: String,
    cache: RwLock<HashMap<String, BinInfo>>,
}

impl std::fmt::Debug for BinService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinService")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl BinService {
    pub fn new(base_url: String, timeout_secs: u64) -> CustomResult<Self, BinLookupError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .change_context(BinLookupError::LookupFailed)?;
        Ok(Self {
            client,
            base_url,
            cache: RwLock::new(HashMap::new()),
        })
    }

    fn validate(bin: &str) -> CustomResult<String, BinLookupError> {
        let digits: String = bin.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() < 6 || digits.len() > 8 || digits.len() != bin.len() {
            return Err(report!(BinLookupError::InvalidBin));
        }
        Ok(digits)
    }
}

#[async_trait::async_trait]
impl BinResolver for BinService {
    async fn resolve(&self, bin: &str) -> CustomResult<BinInfo, BinLookupError> {
        let bin = Self::validate(bin)?;

        if let Some(cached) = self.cache.read().await.get(&bin) {
            return Ok(cached.clone());
        }

        let url = format!("{}/{bin}", self.base_url.trim_end_matches('/'));
        tracing::info!(%bin, "bin lookup");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .change_context(BinLookupError::LookupFailed)?;
        if !response.status().is_success() {
            return Err(report!(BinLookupError::LookupFailed))
                .attach_printable(format!("upstream returned {}", response.status()));
        }
        let info: BinInfo = response
            .json()
            .await
            .change_context(BinLookupError::LookupFailed)?;

        self.cache.write().await.insert(bin, info.clone());
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_validation() {
        assert!(BinService::validate("428220").is_ok());
        assert!(BinService::validate("42822090").is_ok());
        assert!(BinService::validate("12345").is_err());
        assert!(BinService::validate("123456789").is_err());
        assert!(BinService::validate("4282ab").is_err());
    }
}
