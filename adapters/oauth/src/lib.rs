//! oauth — identity providers for the voting service.
//!
//! Purpose
//! - Resolve a bearer token into a [`UserIdentity`] (provider + subject +
//!   email + display name) without any server-side session state.
//! - Google: verifies an ID token's RS256 signature against Google's JWKS
//!   and validates core claims (audience, expiry, issuer).
//! - LinkedIn: resolves an access token via the OIDC userinfo endpoint.
//!
//! API
//! - `GoogleProvider::new(client_id)`, `LinkedInProvider::new()` — stateless
//!   provider values, composed into app state at startup (no global
//!   registry).
//! - `provider.authenticate(token)` → `Result<UserIdentity, AuthError>`
//!
//! Notes
//! - For development the Google signature check can be disabled with
//!   `OAUTH_INSECURE_SKIP_SIGNATURE=1|true|yes`; claims are still validated.
//! - JWKS keys are cached in memory for a short TTL to handle key rotation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{LazyLock, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use domain::{Provider, UserIdentity};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::{trace, warn};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing or malformed token")]
    Malformed,
    #[error("invalid token payload: {0}")]
    InvalidPayload(&'static str),
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("token expired")]
    Expired,
    #[error("audience mismatch")]
    BadAudience,
    #[error("email not verified")]
    EmailNotVerified,
    #[error("token rejected by provider")]
    Rejected,
    #[error("network error talking to provider")]
    Network,
}

/// A stateless authentication strategy: token in, identity out.
pub trait IdentityProvider: Send + Sync {
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<UserIdentity, AuthError>> + Send;
}

// ---- Google ----

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    aud: serde_json::Value, // can be string or array
    exp: Option<u64>,
    #[allow(dead_code)] // Part of JWT structure, used for deserialization
    iss: Option<String>,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

/// Google ID token verifier.
#[derive(Clone, Debug)]
pub struct GoogleProvider {
    client_id: String,
}

impl GoogleProvider {
    pub fn new<S: Into<String>>(client_id: S) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }
}

impl IdentityProvider for GoogleProvider {
    async fn authenticate(&self, token: &str) -> Result<UserIdentity, AuthError> {
        if is_truthy_env("OAUTH_INSECURE_SKIP_SIGNATURE") {
            trace!("oauth: insecure mode - skipping google signature verification");
            return verify_claims_only(token, &self.client_id);
        }

        let header = decode_header(token).map_err(|_| AuthError::Malformed)?;
        if header.alg != Algorithm::RS256 {
            // Only RS256 supported for Google ID tokens
            return Err(AuthError::Malformed);
        }
        let kid = header.kid.ok_or(AuthError::Malformed)?;
        let key = jwks_get_key_async(&kid)
            .await
            .map_err(|_| AuthError::Network)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&["accounts.google.com", "https://accounts.google.com"]);

        let token_data =
            decode::<GoogleClaims>(token, &key, &validation).map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidToken
                | jsonwebtoken::errors::ErrorKind::InvalidSignature => AuthError::SignatureInvalid,
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidAudience => AuthError::BadAudience,
                _ => AuthError::Malformed,
            })?;

        claims_to_identity(token_data.claims)
    }
}

fn verify_claims_only(token: &str, expected_aud: &str) -> Result<UserIdentity, AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::Malformed);
    }
    let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].as_bytes())
        .map_err(|_| AuthError::Malformed)?;
    let claims: GoogleClaims =
        serde_json::from_slice(&payload_bytes).map_err(|_| AuthError::InvalidPayload("json"))?;

    // Audience check (string or array)
    match &claims.aud {
        serde_json::Value::String(s) if s == expected_aud => {}
        serde_json::Value::Array(arr) if arr.iter().any(|v| v.as_str() == Some(expected_aud)) => {}
        _ => return Err(AuthError::BadAudience),
    }

    // Expiry check
    if let Some(exp) = claims.exp {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        if exp <= now {
            return Err(AuthError::Expired);
        }
    }

    claims_to_identity(claims)
}

fn claims_to_identity(claims: GoogleClaims) -> Result<UserIdentity, AuthError> {
    if claims.email.is_some() && claims.email_verified == Some(false) {
        return Err(AuthError::EmailNotVerified);
    }
    Ok(UserIdentity {
        provider: Provider::Google,
        subject: claims.sub,
        email: claims.email,
        display_name: claims.name,
    })
}

// ---- LinkedIn ----

const LINKEDIN_USERINFO_URL: &str = "https://api.linkedin.com/v2/userinfo";

#[derive(Debug, Deserialize)]
struct LinkedInUserInfo {
    sub: String,
    name: Option<String>,
    email: Option<String>,
}

/// LinkedIn access token resolver via the OIDC userinfo endpoint.
#[derive(Clone, Debug)]
pub struct LinkedInProvider {
    userinfo_url: String,
    client: reqwest::Client,
}

impl LinkedInProvider {
    pub fn new() -> Self {
        Self {
            userinfo_url: LINKEDIN_USERINFO_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point userinfo lookups at another endpoint (test seam).
    pub fn with_userinfo_url<S: Into<String>>(mut self, url: S) -> Self {
        self.userinfo_url = url.into();
        self
    }
}

impl Default for LinkedInProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for LinkedInProvider {
    async fn authenticate(&self, token: &str) -> Result<UserIdentity, AuthError> {
        if token.is_empty() {
            return Err(AuthError::Malformed);
        }
        let resp = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                warn!(err = %e, "linkedin userinfo fetch failed");
                AuthError::Network
            })?;

        if resp.status() == reqwest::StatusCode::UNAUTHORIZED
            || resp.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AuthError::Rejected);
        }
        if !resp.status().is_success() {
            return Err(AuthError::Network);
        }

        let info: LinkedInUserInfo = resp
            .json()
            .await
            .map_err(|_| AuthError::InvalidPayload("userinfo json"))?;

        Ok(UserIdentity {
            provider: Provider::LinkedIn,
            subject: info.sub,
            email: info.email,
            display_name: info.name,
        })
    }
}

// ---- JWKS cache & fetch ----

const JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const JWKS_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    #[allow(dead_code)] // Part of JWKS structure, used for deserialization
    alg: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

struct JwksCache {
    fetched_at: SystemTime,
    keys: HashMap<String, DecodingKey>,
}

static CACHE: LazyLock<Mutex<JwksCache>> = LazyLock::new(|| {
    Mutex::new(JwksCache {
        fetched_at: UNIX_EPOCH,
        keys: HashMap::new(),
    })
});

async fn jwks_get_key_async(kid: &str) -> Result<DecodingKey, ()> {
    // Test/dev override takes precedence if present
    if let Some(map) = jwks_override() {
        let mut cache = CACHE.lock().map_err(|_| ())?;
        cache.keys = map;
        cache.fetched_at = SystemTime::now();
        return cache.keys.get(kid).cloned().ok_or(());
    }

    // First, check cache without holding async work under the mutex.
    {
        let cache = CACHE.lock().map_err(|_| ())?;
        let fresh = cache.fetched_at + JWKS_TTL > SystemTime::now();
        if fresh {
            if let Some(k) = cache.keys.get(kid) {
                return Ok(k.clone());
            }
        }
    }

    // Fetch outside the lock
    let new_map = fetch_jwks_map_async().await.map_err(|_| ())?;
    let mut cache = CACHE.lock().map_err(|_| ())?;
    cache.keys = new_map;
    cache.fetched_at = SystemTime::now();
    cache.keys.get(kid).cloned().ok_or(())
}

fn jwks_override() -> Option<HashMap<String, DecodingKey>> {
    let val = std::env::var("OAUTH_JWKS_OVERRIDE").ok()?;
    let jwks: Jwks = serde_json::from_str(&val).ok()?;
    Some(jwks_to_map(jwks))
}

async fn fetch_jwks_map_async() -> Result<HashMap<String, DecodingKey>, reqwest::Error> {
    let resp = reqwest::Client::new().get(JWKS_URL).send().await?;
    let jwks: Jwks = resp.json().await?;
    Ok(jwks_to_map(jwks))
}

fn jwks_to_map(jwks: Jwks) -> HashMap<String, DecodingKey> {
    let mut map = HashMap::new();
    for k in jwks.keys.into_iter() {
        if k.kty == "RSA" {
            if let (Some(n), Some(e)) = (k.n.as_deref(), k.e.as_deref()) {
                if let Ok(key) = DecodingKey::from_rsa_components(n, e) {
                    map.insert(k.kid, key);
                }
            }
        }
    }
    map
}

fn is_truthy_env(name: &str) -> bool {
    match std::env::var(name) {
        Ok(v) => ["1", "true", "yes", "on"]
            .iter()
            .any(|t| v.eq_ignore_ascii_case(t)),
        Err(_) => false,
    }
}

#[cfg(test)]
fn reset_jwks_cache() {
    let mut cache = CACHE.lock().expect("cache mutex");
    cache.fetched_at = UNIX_EPOCH;
    cache.keys.clear();
}
