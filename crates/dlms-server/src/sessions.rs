//! Admin login and session checks.
//!
//! Tokens are verified statelessly with the key derived from the admin
//! secret. Logout adds the token id to a revocation cache that is kept until
//! the token would have expired anyway.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dlms_shared::error::SessionError;
use dlms_shared::session::{SessionSigner, SessionToken};
use subtle::ConstantTimeEq;
use tokio::sync::RwLock;
use tracing::{debug, info};

fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.ct_eq(b).unwrap_u8() == 1
}

#[derive(Clone)]
pub struct SessionManager {
    signer: SessionSigner,
    admin_secret: Arc<str>,
    admin_email: Arc<str>,
    /// token_id -> expiry of the revoked token.
    revoked: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl SessionManager {
    pub fn new(admin_secret: &str, admin_email: &str) -> Self {
        Self {
            signer: SessionSigner::from_secret(admin_secret),
            admin_secret: Arc::from(admin_secret),
            admin_email: Arc::from(admin_email.trim().to_lowercase()),
            revoked: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Check the credential and, on match, issue a 24-hour token.
    pub fn login(&self, email: Option<&str>, password: &str) -> Result<SessionToken, SessionError> {
        let password_ok = ct_eq(password.as_bytes(), self.admin_secret.as_bytes());
        let email_ok = match email {
            Some(email) => ct_eq(
                email.trim().to_lowercase().as_bytes(),
                self.admin_email.as_bytes(),
            ),
            None => true,
        };

        if !(password_ok && email_ok) {
            return Err(SessionError::InvalidCredentials);
        }

        let token = self.signer.issue();
        info!(expires_at = %token.expires_at, "Admin session issued");
        Ok(token)
    }

    /// Verify signature and expiry, then consult the revocation cache.
    pub async fn check(&self, bearer: &str) -> Result<SessionToken, SessionError> {
        let token = self.signer.verify(bearer)?;
        if self.revoked.read().await.contains_key(&token.token_id) {
            debug!("Rejected revoked session");
            return Err(SessionError::Revoked);
        }
        Ok(token)
    }

    pub async fn revoke(&self, token: &SessionToken) {
        self.revoked
            .write()
            .await
            .insert(token.token_id.clone(), token.expires_at);
        info!("Admin session revoked");
    }

    /// Forget revoked tokens that have expired on their own.
    pub async fn purge_expired(&self) {
        let now = Utc::now();
        let mut revoked = self.revoked.write().await;
        let before = revoked.len();
        revoked.retain(|_, expires_at| *expires_at > now);
        let removed = before - revoked.len();
        if removed > 0 {
            debug!(removed, "Purged expired revocations");
        }
    }

    #[cfg(test)]
    pub(crate) fn signer(&self) -> &SessionSigner {
        &self.signer
    }
}
