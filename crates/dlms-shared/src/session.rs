//! Admin session tokens.
//!
//! A bearer token is `{token_id}.{expiry_unix}.{signature_hex}`, where the
//! token id is 32 random bytes (hex) and the signature is Ed25519 over
//! `token_id || expiry (rfc3339)`. The signing key is derived from the admin
//! secret, so any server instance sharing the secret can verify a token
//! without shared state.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::constants::{KDF_CONTEXT_SESSION_KEY, SESSION_TOKEN_BYTES, SESSION_TTL_HOURS};
use crate::error::SessionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
    pub signature: Vec<u8>,
}

impl SessionToken {
    /// Wire form handed to clients.
    pub fn encode(&self) -> String {
        format!(
            "{}.{}.{}",
            self.token_id,
            self.expires_at.timestamp(),
            hex::encode(&self.signature)
        )
    }

    pub fn parse(bearer: &str) -> Result<Self, SessionError> {
        let mut parts = bearer.trim().splitn(3, '.');
        let (Some(token_id), Some(expiry), Some(signature)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(SessionError::Malformed);
        };

        if token_id.len() != SESSION_TOKEN_BYTES * 2
            || !token_id.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(SessionError::Malformed);
        }

        let expiry: i64 = expiry.parse().map_err(|_| SessionError::Malformed)?;
        let expires_at = DateTime::from_timestamp(expiry, 0).ok_or(SessionError::Malformed)?;
        let signature = hex::decode(signature).map_err(|_| SessionError::Malformed)?;

        Ok(Self {
            token_id: token_id.to_string(),
            expires_at,
            signature,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// `token_id || expiry (rfc3339)`
fn signing_payload(token_id: &str, expires_at: DateTime<Utc>) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(token_id.as_bytes());
    payload.extend_from_slice(
        expires_at
            .to_rfc3339_opts(SecondsFormat::Secs, true)
            .as_bytes(),
    );
    payload
}

pub fn generate_token_id() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues and checks admin session tokens.
#[derive(Clone)]
pub struct SessionSigner {
    signing_key: SigningKey,
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("verifying_key", &hex::encode(self.verifying_key().to_bytes()))
            .finish()
    }
}

impl SessionSigner {
    /// BLAKE3 KDF with domain separation over the admin secret.
    pub fn from_secret(admin_secret: &str) -> Self {
        let seed = blake3::derive_key(KDF_CONTEXT_SESSION_KEY, admin_secret.as_bytes());
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// New token valid for 24 hours from `now`.
    pub fn issue_at(&self, now: DateTime<Utc>) -> SessionToken {
        // Whole seconds, so the wire expiry and the signed expiry agree.
        let expires_at = DateTime::from_timestamp(
            (now + Duration::hours(SESSION_TTL_HOURS)).timestamp(),
            0,
        )
        .unwrap_or(now);
        self.issue_until(expires_at)
    }

    pub fn issue(&self) -> SessionToken {
        self.issue_at(Utc::now())
    }

    pub fn issue_until(&self, expires_at: DateTime<Utc>) -> SessionToken {
        let token_id = generate_token_id();
        let signature = self
            .signing_key
            .sign(&signing_payload(&token_id, expires_at));

        SessionToken {
            token_id,
            expires_at,
            signature: signature.to_bytes().to_vec(),
        }
    }

    /// Parse a bearer string and check its signature and expiry.
    pub fn verify_at(&self, bearer: &str, now: DateTime<Utc>) -> Result<SessionToken, SessionError> {
        let token = SessionToken::parse(bearer)?;

        let signature =
            Signature::from_slice(&token.signature).map_err(|_| SessionError::InvalidSignature)?;
        self.verifying_key()
            .verify(&signing_payload(&token.token_id, token.expires_at), &signature)
            .map_err(|_| SessionError::InvalidSignature)?;

        if token.is_expired_at(now) {
            return Err(SessionError::Expired);
        }

        Ok(token)
    }

    pub fn verify(&self, bearer: &str) -> Result<SessionToken, SessionError> {
        self.verify_at(bearer, Utc::now())
    }
}
