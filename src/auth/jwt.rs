use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims carried by a host credential.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user ID as a decimal string.
    pub sub: String,
    /// Display name of the credential holder.
    pub username: String,
    /// User role: `"host"` or `"admin"`.
    pub role: String,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
    /// Issued-at time (Unix timestamp).
    pub iat: i64,
    /// Unique JWT identifier.
    pub jti: String,
}

/// Verified identity extracted from a presented credential.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub role: String,
}

/// Issue a host credential for the given identity.
///
/// Used by dev tooling and tests; production tokens come from the external
/// auth service sharing the same secret.
///
/// # Errors
///
/// Returns an error if JWT encoding fails.
pub fn issue_host_token(
    user_id: i64,
    username: &str,
    secret: &str,
    expiration_secs: u64,
) -> anyhow::Result<String> {
    let now = Utc::now();

    #[allow(clippy::cast_possible_wrap)]
    let exp = now.timestamp() + expiration_secs as i64;

    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        role: "host".to_string(),
        exp,
        iat: now.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };

    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), &claims, &key)
        .map_err(|e| anyhow::anyhow!("Failed to encode host token: {e}"))
}

/// Validate a credential and return the identity it asserts.
///
/// # Errors
///
/// Returns an error if the token is invalid, expired, or carries a
/// malformed subject.
pub fn verify_credential(token: &str, secret: &str) -> anyhow::Result<Identity> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<Claims>(token, &key, &validation)
        .map_err(|e| anyhow::anyhow!("Invalid credential: {e}"))?;

    let id: i64 = token_data
        .claims
        .sub
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid credential subject"))?;

    Ok(Identity {
        id,
        username: token_data.claims.username,
        role: token_data.claims.role,
    })
}
