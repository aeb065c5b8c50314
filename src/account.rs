use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::AccountConfig;
use crate::error::GatewayError;

/// Bearer credential for one upstream call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub account_name: String,
    pub access_token: String,
}

/// Source of upstream credentials.
pub trait AccountProvider: Send + Sync {
    /// Pick an account for the next upstream call.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Account`] when no usable account exists.
    fn acquire(&self) -> Result<Credential, GatewayError>;
}

/// Round-robin over the enabled accounts from config.
#[derive(Debug)]
pub struct StaticAccountPool {
    accounts: Vec<AccountConfig>,
    cursor: AtomicUsize,
}

impl StaticAccountPool {
    /// Disabled accounts are dropped here and never handed out.
    #[must_use]
    pub fn new(accounts: &[AccountConfig]) -> Self {
        Self {
            accounts: accounts.iter().filter(|a| a.enabled).cloned().collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn enabled_count(&self) -> usize {
        self.accounts.len()
    }
}

impl AccountProvider for StaticAccountPool {
    fn acquire(&self) -> Result<Credential, GatewayError> {
        if self.accounts.is_empty() {
            return Err(GatewayError::Account("no account available".to_string()));
        }
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % self.accounts.len();
        let account = &self.accounts[slot];
        if account.access_token.trim().is_empty() {
            return Err(GatewayError::Account(format!(
                "token missing for account '{}'",
                account.name
            )));
        }
        Ok(Credential {
            account_name: account.name.clone(),
            access_token: account.access_token.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str, token: &str, enabled: bool) -> AccountConfig {
        AccountConfig {
            name: name.to_string(),
            access_token: token.to_string(),
            enabled,
        }
    }

    #[test]
    fn test_round_robin_skips_disabled() {
        let pool = StaticAccountPool::new(&[
            account("a", "ta", true),
            account("off", "tx", false),
            account("b", "tb", true),
        ]);
        assert_eq!(pool.enabled_count(), 2);
        let names: Vec<String> = (0..4)
            .map(|_| pool.acquire().unwrap().account_name)
            .collect();
        assert_eq!(names, ["a", "b", "a", "b"]);
    }

    #[test]
    fn test_empty_pool_is_account_error() {
        let pool = StaticAccountPool::new(&[account("off", "t", false)]);
        let err = pool.acquire().unwrap_err();
        assert!(matches!(err, GatewayError::Account(ref m) if m == "no account available"));
    }

    #[test]
    fn test_blank_token_is_account_error() {
        let pool = StaticAccountPool::new(&[account("a", "  ", true)]);
        let err = pool.acquire().unwrap_err();
        assert!(err.to_string().contains("token missing"));
    }
}
