//! Admin credential checks.

use std::sync::Arc;

use futures::future::{self, BoxFuture};
use thiserror::Error;

use crate::config::{AdminCredentials, AppConfig};

/// Reasons an admin sign-in is refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid admin credentials")]
    InvalidCredentials,
    #[error("no admin account is configured")]
    NotConfigured,
}

/// Verifies admin credentials. Implementations may call out to an identity provider.
pub trait AdminAuthenticator: Send + Sync {
    fn sign_in(&self, email: String, password: String) -> BoxFuture<'static, Result<(), AuthError>>;
}

/// Authenticator backed by the accounts listed in [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ConfigAuthenticator {
    admins: Arc<[AdminCredentials]>,
}

impl ConfigAuthenticator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            admins: config.admins().into(),
        }
    }

    fn check(&self, email: &str, password: &str) -> Result<(), AuthError> {
        if self.admins.is_empty() {
            return Err(AuthError::NotConfigured);
        }
        let email = email.trim();
        self.admins
            .iter()
            .any(|admin| admin.email.eq_ignore_ascii_case(email) && admin.password == password)
            .then_some(())
            .ok_or(AuthError::InvalidCredentials)
    }
}

impl AdminAuthenticator for ConfigAuthenticator {
    fn sign_in(&self, email: String, password: String) -> BoxFuture<'static, Result<(), AuthError>> {
        Box::pin(future::ready(self.check(&email, &password)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticator() -> ConfigAuthenticator {
        ConfigAuthenticator::new(&AppConfig::new(
            vec![AdminCredentials {
                email: "front.man@squid.test".into(),
                password: "mask".into(),
            }],
            6,
        ))
    }

    #[tokio::test]
    async fn accepts_configured_admin_case_insensitively() {
        let auth = authenticator();
        assert_eq!(
            auth.sign_in(" Front.Man@squid.test".into(), "mask".into()).await,
            Ok(())
        );
    }

    #[tokio::test]
    async fn rejects_wrong_password() {
        let auth = authenticator();
        assert_eq!(
            auth.sign_in("front.man@squid.test".into(), "MASK".into()).await,
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn refuses_everything_without_accounts() {
        let auth = ConfigAuthenticator::new(&AppConfig::default());
        assert_eq!(
            auth.sign_in("a@b.c".into(), "x".into()).await,
            Err(AuthError::NotConfigured)
        );
    }
}
