use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;

use crate::utils::{AppError, AppResult};

/// Minimum spacing between two JWKS downloads (at most 5 per minute).
const JWKS_REFRESH_INTERVAL: Duration = Duration::from_secs(12);
const JWKS_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Claims read from a verified identity-provider access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdentityClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    pub exp: usize,
}

impl IdentityClaims {
    pub fn new(sub: impl Into<String>, ttl: chrono::Duration) -> Self {
        IdentityClaims {
            sub: sub.into(),
            email: None,
            nickname: None,
            name: None,
            picture: None,
            exp: (chrono::Utc::now() + ttl).timestamp() as usize,
        }
    }
}

#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Validates signature, expiry, audience and issuer.
    async fn verify(&self, token: &str) -> AppResult<IdentityClaims>;
}

fn invalid_token(e: jsonwebtoken::errors::Error) -> AppError {
    AppError::Unauthorized(format!("Invalid token: {}", e))
}

/// HS256 verifier for local development against a shared secret.
pub struct SecretVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SecretVerifier {
    pub fn new(secret: &str, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        SecretVerifier {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl TokenVerifier for SecretVerifier {
    async fn verify(&self, token: &str) -> AppResult<IdentityClaims> {
        decode::<IdentityClaims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(invalid_token)
    }
}

/// Signs an HS256 token that `SecretVerifier` accepts.
#[cfg(any(test, feature = "test-support"))]
pub fn sign_with_secret(secret: &str, claims: &IdentityClaims) -> AppResult<String> {
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(Algorithm::HS256),
        claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

/// RS256 verifier backed by the provider's published JWK set.
pub struct JwksVerifier {
    jwks_uri: String,
    validation: Validation,
    http: reqwest::Client,
    keys: RwLock<JwkSet>,
    // Time of the last download attempt, successful or not. Held while
    // fetching so concurrent misses share one request.
    last_attempt: Mutex<Option<Instant>>,
}

impl JwksVerifier {
    pub fn new(domain: &str, audience: &str) -> Self {
        let domain = domain
            .trim()
            .trim_start_matches("https://")
            .trim_end_matches('/');

        JwksVerifier::with_jwks_uri(
            format!("https://{}/.well-known/jwks.json", domain),
            &format!("https://{}/", domain),
            audience,
        )
    }

    /// Verifier reading keys from an explicit JWKS endpoint.
    pub fn with_jwks_uri(jwks_uri: impl Into<String>, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        validation.set_issuer(&[issuer]);

        JwksVerifier {
            jwks_uri: jwks_uri.into(),
            validation,
            http: reqwest::Client::new(),
            keys: RwLock::new(JwkSet { keys: Vec::new() }),
            last_attempt: Mutex::new(None),
        }
    }

    #[cfg(test)]
    fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    async fn cached_key(&self, kid: &str) -> AppResult<Option<DecodingKey>> {
        let keys = self.keys.read().await;
        match keys.find(kid) {
            Some(jwk) => DecodingKey::from_jwk(jwk).map(Some).map_err(invalid_token),
            None => Ok(None),
        }
    }

    async fn fetch(&self) -> AppResult<JwkSet> {
        let request = async {
            self.http
                .get(&self.jwks_uri)
                .send()
                .await?
                .error_for_status()?
                .json::<JwkSet>()
                .await
        };

        match timeout(JWKS_FETCH_TIMEOUT, request).await {
            Ok(Ok(keys)) => Ok(keys),
            Ok(Err(e)) => {
                log::error!("❌ JWKS fetch failed: {}", e);
                Err(AppError::Unauthorized("Unable to verify token".to_string()))
            }
            Err(_) => {
                log::warn!("⏱️ JWKS fetch timed out after {}s", JWKS_FETCH_TIMEOUT.as_secs());
                Err(AppError::Unauthorized("Unable to verify token".to_string()))
            }
        }
    }

    async fn refresh(&self) -> AppResult<()> {
        let mut last_attempt = self.last_attempt.lock().await;
        if let Some(at) = *last_attempt {
            if at.elapsed() < JWKS_REFRESH_INTERVAL {
                return Ok(());
            }
        }
        *last_attempt = Some(Instant::now());

        log::info!("🔑 Fetching signing keys from {}", self.jwks_uri);
        let keys = self.fetch().await?;
        log::info!("✅ Loaded {} signing keys", keys.keys.len());

        *self.keys.write().await = keys;
        Ok(())
    }

    async fn key_for(&self, kid: &str) -> AppResult<DecodingKey> {
        if let Some(key) = self.cached_key(kid).await? {
            return Ok(key);
        }
        // Unknown kid: the provider may have rotated keys.
        self.refresh().await?;
        self.cached_key(kid)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unknown signing key".to_string()))
    }
}

#[async_trait]
impl TokenVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> AppResult<IdentityClaims> {
        let header = decode_header(token).map_err(invalid_token)?;
        if header.alg != Algorithm::RS256 {
            return Err(AppError::Unauthorized("Unsupported token algorithm".to_string()));
        }
        let kid = header
            .kid
            .ok_or_else(|| AppError::Unauthorized("Token has no key id".to_string()))?;

        let key = self.key_for(&kid).await?;
        decode::<IdentityClaims>(token, &key, &self.validation)
            .map(|data| data.claims)
            .map_err(invalid_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[tokio::test]
    async fn shared_secret_round_trip() {
        let mut claims = IdentityClaims::new("auth0|abc", chrono::Duration::minutes(5));
        claims.email = Some("cook@example.com".into());
        let token = sign_with_secret(SECRET, &claims).unwrap();

        let verified = SecretVerifier::new(SECRET, None).verify(&token).await.unwrap();
        assert_eq!(verified.sub, "auth0|abc");
        assert_eq!(verified.email.as_deref(), Some("cook@example.com"));
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let claims = IdentityClaims::new("auth0|abc", chrono::Duration::minutes(-10));
        let token = sign_with_secret(SECRET, &claims).unwrap();

        let err = SecretVerifier::new(SECRET, None).verify(&token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let claims = IdentityClaims::new("auth0|abc", chrono::Duration::minutes(5));
        let token = sign_with_secret("another-secret", &claims).unwrap();

        let err = SecretVerifier::new(SECRET, None).verify(&token).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn audience_is_enforced_when_configured() {
        let claims = IdentityClaims::new("auth0|abc", chrono::Duration::minutes(5));
        let token = sign_with_secret(SECRET, &claims).unwrap();

        let err = SecretVerifier::new(SECRET, Some("https://api.smartrecipe.com"))
            .verify(&token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn jwks_uri_is_derived_from_domain() {
        let verifier = JwksVerifier::new("https://tenant.auth0.com/", "aud");
        assert_eq!(verifier.jwks_uri(), "https://tenant.auth0.com/.well-known/jwks.json");
    }

    #[tokio::test]
    async fn jwks_verifier_rejects_before_fetching_keys() {
        let verifier = JwksVerifier::new("tenant.auth0.com", "aud");

        let garbage = verifier.verify("not-a-jwt").await.unwrap_err();
        assert!(matches!(garbage, AppError::Unauthorized(_)));

        // HS256 tokens never reach the key lookup.
        let claims = IdentityClaims::new("auth0|abc", chrono::Duration::minutes(5));
        let hs = sign_with_secret(SECRET, &claims).unwrap();
        let err = verifier.verify(&hs).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(ref m) if m == "Unsupported token algorithm"));
    }

    // `{"alg":"RS256","kid":"k1"}` with an empty payload; only the header is read
    // before the key lookup.
    const RS256_K1_TOKEN: &str = "eyJhbGciOiJSUzI1NiIsImtpZCI6ImsxIn0.e30.c2ln";

    #[tokio::test]
    async fn failed_key_download_is_not_retried_within_interval() {
        use std::net::TcpListener;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connections);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });

        let verifier = JwksVerifier::with_jwks_uri(
            format!("http://127.0.0.1:{}/.well-known/jwks.json", port),
            "http://127.0.0.1/",
            "aud",
        );

        for _ in 0..5 {
            let err = verifier.verify(RS256_K1_TOKEN).await.unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)));
        }
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }
}
