//! ES256 bearer tokens for signing-key authentication.
//!
//! The gateway rejects tokens older than an hour and throttles clients that
//! re-sign too often, so one token is reused until it turns 55 minutes old.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use tracing::debug;

use crate::errors::{BuildError, GatewayError};

const REFRESH_AFTER_SECS: i64 = 55 * 60;

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    iat: i64,
}

struct IssuedToken {
    jwt: String,
    issued_at: DateTime<Utc>,
}

impl IssuedToken {
    fn usable_at(&self, now: DateTime<Utc>) -> bool {
        (now - self.issued_at).num_seconds() < REFRESH_AFTER_SECS
    }
}

/// Signs bearer tokens for one signing key, reusing the last one while it is fresh.
pub(crate) struct TokenSigner {
    key_id: String,
    team_id: String,
    encoding_key: EncodingKey,
    issued: Mutex<Option<IssuedToken>>,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("key_id", &self.key_id)
            .field("team_id", &self.team_id)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Parse the PEM key once, up front.
    pub(crate) fn new(key_pem: &[u8], key_id: &str, team_id: &str) -> Result<Self, BuildError> {
        if key_id.trim().is_empty() || team_id.trim().is_empty() {
            return Err(BuildError::SigningKey {
                reason: "key id and team id are required".into(),
            });
        }
        let encoding_key = EncodingKey::from_ec_pem(key_pem).map_err(|e| BuildError::SigningKey {
            reason: e.to_string(),
        })?;
        Ok(Self {
            key_id: key_id.to_string(),
            team_id: team_id.to_string(),
            encoding_key,
            issued: Mutex::new(None),
        })
    }

    /// Token for a request sent now.
    pub(crate) fn bearer(&self) -> Result<String, GatewayError> {
        self.bearer_at(Utc::now())
    }

    fn bearer_at(&self, now: DateTime<Utc>) -> Result<String, GatewayError> {
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = issued.as_ref().filter(|t| t.usable_at(now)) {
            return Ok(token.jwt.clone());
        }

        let jwt = self.sign(now)?;
        debug!(key_id = %self.key_id, iat = now.timestamp(), "signed bearer token");
        *issued = Some(IssuedToken {
            jwt: jwt.clone(),
            issued_at: now,
        });
        Ok(jwt)
    }

    fn sign(&self, issued_at: DateTime<Utc>) -> Result<String, GatewayError> {
        let mut header = Header::new(Algorithm::ES256);
        header.kid = Some(self.key_id.clone());
        let claims = Claims {
            iss: &self.team_id,
            iat: issued_at.timestamp(),
        };
        jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(|e| {
            GatewayError::Signing {
                reason: e.to_string(),
            }
        })
    }
}
