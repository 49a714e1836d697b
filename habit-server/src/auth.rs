use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use habit_types::AccountInfo;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Failed to fetch signing keys")]
    JwksFetch,
    #[error("Signing key not found")]
    KeyNotFound,
    #[error("Invalid signing key")]
    InvalidKey,
}

/// Claims we consume from the identity provider's RS256 tokens. The
/// provider owns sign-up, sign-in and password reset; this service only
/// validates the tokens it issues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub exp: u64,
    pub email: Option<String>,
    pub name: Option<String>,
    pub preferred_username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct JwksKey {
    kid: String,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct JwksResponse {
    keys: Vec<JwksKey>,
}

#[derive(Debug, Deserialize)]
struct DevClaims {
    user_id: Uuid,
    email: String,
    username: Option<String>,
}

pub struct AuthService {
    client: Client,
    jwks_url: String,
    audience: String,
    keys: Arc<RwLock<HashMap<String, (DecodingKey, SystemTime)>>>,
    dev_mode: bool,
}

impl AuthService {
    pub fn new(jwks_url: String, audience: String) -> Self {
        Self {
            client: Client::new(),
            jwks_url,
            audience,
            keys: Arc::new(RwLock::new(HashMap::new())),
            dev_mode: false,
        }
    }

    /// Dev mode skips signature checks and accepts `uid:email:name`
    /// strings or raw JSON claims. Never enable outside local testing.
    pub fn new_dev_mode() -> Self {
        Self {
            client: Client::new(),
            jwks_url: "dev".to_string(),
            audience: "dev".to_string(),
            keys: Arc::new(RwLock::new(HashMap::new())),
            dev_mode: true,
        }
    }

    pub async fn validate_token(&self, token: &str) -> Result<AccountInfo, AuthError> {
        if self.dev_mode {
            return self.validate_dev_token(token);
        }

        let header = decode_header(token).map_err(|err| {
            tracing::warn!("Failed to decode JWT header: {:?}", err);
            AuthError::InvalidToken
        })?;
        let kid = header.kid.ok_or_else(|| {
            tracing::warn!("JWT header missing 'kid' field");
            AuthError::InvalidToken
        })?;

        let decoding_key = self.decoding_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.audience]);

        let token_data =
            decode::<IdentityClaims>(token, &decoding_key, &validation).map_err(|err| {
                tracing::warn!("JWT validation failed: {:?}", err);
                match err.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken,
                }
            })?;

        let claims = token_data.claims;
        let user_id = claims.sub.parse::<Uuid>().map_err(|_| {
            tracing::warn!("Token subject is not a valid user id: {}", claims.sub);
            AuthError::InvalidToken
        })?;

        Ok(AccountInfo {
            user_id,
            email: claims
                .email
                .unwrap_or_else(|| "unknown@example.com".to_string()),
            display_name: claims
                .name
                .or(claims.preferred_username)
                .unwrap_or_else(|| "Unknown User".to_string()),
        })
    }

    async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let keys = self.keys.read().await;
            if let Some((key, cached_at)) = keys.get(kid) {
                // Keys rotate rarely; an hour of caching is plenty.
                let age = cached_at.elapsed().unwrap_or(Duration::from_secs(3600));
                if age < Duration::from_secs(3600) {
                    return Ok(key.clone());
                }
            }
        }

        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|err| {
                tracing::warn!("Failed to fetch JWKS from {}: {:?}", self.jwks_url, err);
                AuthError::JwksFetch
            })?;

        if !response.status().is_success() {
            tracing::warn!("JWKS fetch returned status: {}", response.status());
            return Err(AuthError::JwksFetch);
        }

        let jwks: JwksResponse = response.json().await.map_err(|err| {
            tracing::warn!("Failed to parse JWKS response: {:?}", err);
            AuthError::JwksFetch
        })?;

        let jwks_key = jwks
            .keys
            .iter()
            .find(|key| key.kid == kid)
            .ok_or_else(|| {
                tracing::warn!("Key '{}' not present in JWKS; token from a rotated key?", kid);
                AuthError::KeyNotFound
            })?;

        let (n, e) = match (&jwks_key.n, &jwks_key.e) {
            (Some(n), Some(e)) => (n, e),
            _ => {
                tracing::warn!("JWKS key '{}' is missing RSA components", kid);
                return Err(AuthError::InvalidKey);
            }
        };
        let decoding_key = DecodingKey::from_rsa_components(n, e).map_err(|err| {
            tracing::warn!("Failed to build decoding key: {:?}", err);
            AuthError::InvalidKey
        })?;

        let mut keys = self.keys.write().await;
        keys.insert(kid.to_string(), (decoding_key.clone(), SystemTime::now()));
        Ok(decoding_key)
    }

    fn validate_dev_token(&self, token: &str) -> Result<AccountInfo, AuthError> {
        if token.trim_start().starts_with('{') {
            let claims: DevClaims =
                serde_json::from_str(token).map_err(|_| AuthError::InvalidToken)?;
            return Ok(AccountInfo {
                user_id: claims.user_id,
                email: claims.email,
                display_name: claims.username.unwrap_or_else(|| "Dev User".to_string()),
            });
        }

        let parts: Vec<&str> = token.splitn(3, ':').collect();
        if parts.len() != 3 {
            return Err(AuthError::InvalidToken);
        }
        let user_id = parts[0].parse().map_err(|_| AuthError::InvalidToken)?;
        Ok(AccountInfo {
            user_id,
            email: parts[1].to_string(),
            display_name: parts[2].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dev_mode_colon_token() {
        let auth = AuthService::new_dev_mode();
        let user_id = Uuid::new_v4();

        let account = auth
            .validate_token(&format!("{}:alice@example.com:Alice", user_id))
            .await
            .unwrap();
        assert_eq!(account.user_id, user_id);
        assert_eq!(account.email, "alice@example.com");
        assert_eq!(account.display_name, "Alice");
    }

    #[tokio::test]
    async fn test_dev_mode_json_token() {
        let auth = AuthService::new_dev_mode();
        let user_id = Uuid::new_v4();

        let token = format!(
            r#"{{"user_id":"{}","email":"bob@example.com","username":"Bob"}}"#,
            user_id
        );
        let account = auth.validate_token(&token).await.unwrap();
        assert_eq!(account.user_id, user_id);
        assert_eq!(account.display_name, "Bob");
    }

    #[tokio::test]
    async fn test_dev_mode_rejects_malformed_tokens() {
        let auth = AuthService::new_dev_mode();
        assert!(auth.validate_token("not-a-token").await.is_err());
        assert!(auth.validate_token("also:not-enough").await.is_err());
        assert!(
            auth.validate_token("not-a-uuid:a@example.com:Name")
                .await
                .is_err()
        );
    }
}
