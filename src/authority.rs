//! Minting discharges once an election is approved.

use chrono::{serde::ts_seconds, DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// The credential authority whose caveats this service discharges.
#[rocket::async_trait]
pub trait CredentialAuthority: Send + Sync {
    /// Mint the discharge for `caveat_id`. The result is opaque to us and is
    /// handed back to the waiting client verbatim.
    async fn mint_discharge(&self, caveat_id: &str) -> Result<Vec<u8>>;
}

/// What a discharge token asserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DischargeClaims {
    #[serde(rename = "cav")]
    pub caveat_id: String,
    #[serde(rename = "iat", with = "ts_seconds")]
    pub issued_at: DateTime<Utc>,
    #[serde(rename = "exp", with = "ts_seconds")]
    pub expire_at: DateTime<Utc>,
}

/// Mints discharges as HS256 JWTs signed with a shared secret.
pub struct JwtAuthority {
    secret: Vec<u8>,
    ttl: Duration,
}

impl JwtAuthority {
    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }
}

#[cfg(test)]
impl JwtAuthority {
    /// Check a discharge minted by this authority and return its claims.
    pub fn verify(&self, token: &[u8]) -> Result<DischargeClaims> {
        use jsonwebtoken::{DecodingKey, TokenData, Validation};

        let token = String::from_utf8_lossy(token);
        let claims = jsonwebtoken::decode(
            &token,
            &DecodingKey::from_secret(&self.secret),
            &Validation::default(),
        )
        .map(|data: TokenData<DischargeClaims>| data.claims)?;
        Ok(claims)
    }
}

#[rocket::async_trait]
impl CredentialAuthority for JwtAuthority {
    async fn mint_discharge(&self, caveat_id: &str) -> Result<Vec<u8>> {
        let now = Utc::now();
        let claims = DischargeClaims {
            caveat_id: caveat_id.to_string(),
            issued_at: now,
            expire_at: now + self.ttl,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )?;
        Ok(token.into_bytes())
    }
}
