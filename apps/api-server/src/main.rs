//! api-server — HTTP surface for the single-candidate voting service.
//!
//! Routes (all JSON):
//! - `GET  /api/health`               — liveness probe
//! - `GET  /api/user`                 — current user + profile-gate flag
//! - `GET  /api/candidates`           — candidate list
//! - `POST /api/vote`                 — cast the caller's single vote
//! - `GET  /api/voters`               — public registry of voters
//! - `GET  /api/results`              — vote tally, highest first
//! - `POST /api/update-linkedin-url`  — verify + persist a profile URL
//! - `POST /api/test-linkedin-verify` — dry-run verification, no persistence
//!
//! Authentication is stateless: every request resolves its bearer token (or
//! the X-Debug-User header in debug mode) to a fresh profile row, so there
//! is no session snapshot to go stale after a profile update.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use domain::adapters::memory_store::InMemoryStore;
use domain::{
    gate, CandidateRepository, CoreError, Provider, UserIdentity, UserProfile, UserRepository,
    VerificationResult, VoteRepository,
};
use http_common::{json_err, json_error_with_message, system_time_to_rfc3339};
use linkedin_verify::LinkedInVerifier;
use oauth::{GoogleProvider, IdentityProvider, LinkedInProvider};

mod config;

use config::{AuthProvider, Config, LogFormat, StorageProvider};

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

// ============================================================================
// App state
// ============================================================================

/// Storage backend selected at startup.
#[derive(Clone)]
enum AnyStore {
    Memory(Arc<InMemoryStore>),
    #[cfg(feature = "sqlite")]
    Sqlite(Arc<sqlite_store::SqliteStore>),
}

impl AnyStore {
    fn users(&self) -> &dyn UserRepository {
        match self {
            AnyStore::Memory(s) => s.as_ref(),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.as_ref(),
        }
    }

    fn candidates(&self) -> &dyn CandidateRepository {
        match self {
            AnyStore::Memory(s) => s.as_ref(),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.as_ref(),
        }
    }

    fn votes(&self) -> &dyn VoteRepository {
        match self {
            AnyStore::Memory(s) => s.as_ref(),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.as_ref(),
        }
    }
}

struct AuthState {
    mode: AuthProvider,
    google: Option<GoogleProvider>,
    linkedin: LinkedInProvider,
}

#[derive(Clone)]
struct AppState {
    store: AnyStore,
    verifier: Arc<LinkedInVerifier>,
    auth: Arc<AuthState>,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserOut {
    id: i64,
    google_id: Option<String>,
    linkedin_id: Option<String>,
    display_name: Option<String>,
    email: Option<String>,
    linkedin_profile_url: Option<String>,
    providers: Vec<&'static str>,
}

impl From<&UserProfile> for UserOut {
    fn from(p: &UserProfile) -> Self {
        Self {
            id: p.id.as_i64(),
            google_id: p.google_id.clone(),
            linkedin_id: p.linkedin_id.clone(),
            display_name: p.display_name.clone(),
            email: p.email.clone(),
            linkedin_profile_url: p.linkedin_profile_url.clone(),
            providers: p.providers().iter().map(Provider::as_str).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CandidateOut {
    id: i64,
    name: String,
    description: Option<String>,
    linkedin_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TallyOut {
    candidate_id: i64,
    name: String,
    votes: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoterOut {
    display_name: Option<String>,
    linkedin_profile_url: Option<String>,
    providers: Vec<&'static str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VoteIn {
    candidate_id: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkedInUrlIn {
    linkedin_url: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyOut {
    is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

// ============================================================================
// Authentication
// ============================================================================

enum AuthFailure {
    Unauthorized,
    Internal,
}

/// Resolve the request's credentials to a persisted profile, creating or
/// linking a user row on first sight of an identity.
async fn resolve_user(state: &AppState, headers: &HeaderMap) -> Result<UserProfile, AuthFailure> {
    let identity = resolve_identity(state, headers)
        .await
        .ok_or(AuthFailure::Unauthorized)?;
    upsert_identity(&state.store, &identity).map_err(|e| {
        error!(err = %e, "user upsert failed");
        AuthFailure::Internal
    })
}

async fn resolve_identity(state: &AppState, headers: &HeaderMap) -> Option<UserIdentity> {
    match state.auth.mode {
        AuthProvider::None => {
            let email = headers.get("x-debug-user")?.to_str().ok()?.trim().to_string();
            if email.is_empty() {
                return None;
            }
            let name = email.split('@').next().unwrap_or(&email).to_string();
            Some(UserIdentity {
                provider: Provider::Google,
                subject: format!("debug-{email}"),
                email: Some(email),
                display_name: Some(name),
            })
        }
        AuthProvider::OAuth => {
            let token = bearer_token(headers)?;
            let provider = headers
                .get("x-auth-provider")
                .and_then(|v| v.to_str().ok())
                .and_then(Provider::parse)
                .unwrap_or(Provider::Google);
            let outcome = match provider {
                Provider::Google => state.auth.google.as_ref()?.authenticate(token).await,
                Provider::LinkedIn => state.auth.linkedin.authenticate(token).await,
            };
            match outcome {
                Ok(identity) => Some(identity),
                Err(e) => {
                    debug!(provider = provider.as_str(), err = %e, "token rejected");
                    None
                }
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get("authorization")?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Find-or-create flow: provider subject first, then email linking, then a
/// fresh row. Re-reads after linking so the caller sees the updated row.
fn upsert_identity(store: &AnyStore, identity: &UserIdentity) -> Result<UserProfile, CoreError> {
    let users = store.users();
    if let Some(profile) = users.find_by_provider(identity.provider, &identity.subject)? {
        return Ok(profile);
    }
    if let Some(email) = identity.email.as_deref() {
        if let Some(existing) = users.find_by_email(email)? {
            users.link_provider(existing.id, identity.provider, &identity.subject)?;
            return users.get(existing.id)?.ok_or(CoreError::NotFound);
        }
    }
    users.create(identity)
}

// ============================================================================
// Handlers
// ============================================================================

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, Json(json_err("internal"))).into_response()
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json_err("unauthorized"))).into_response()
}

async fn get_health() -> Response {
    Json(json!({
        "status": "ok",
        "timestamp": system_time_to_rfc3339(SystemTime::now()),
    }))
    .into_response()
}

async fn get_user(State(state): State<AppState>, headers: HeaderMap) -> Response {
    match resolve_user(&state, &headers).await {
        Ok(profile) => {
            let decision = gate::evaluate(&profile);
            Json(json!({
                "authenticated": true,
                "user": UserOut::from(&profile),
                "mustCompleteProfile": decision.must_complete_profile,
            }))
            .into_response()
        }
        Err(AuthFailure::Unauthorized) => Json(json!({ "authenticated": false })).into_response(),
        Err(AuthFailure::Internal) => internal_error(),
    }
}

async fn get_candidates(State(state): State<AppState>) -> Response {
    match state.store.candidates().list() {
        Ok(list) => {
            let out: Vec<CandidateOut> = list
                .into_iter()
                .map(|c| CandidateOut {
                    id: c.id,
                    name: c.name,
                    description: c.description,
                    linkedin_url: c.linkedin_url,
                })
                .collect();
            Json(out).into_response()
        }
        Err(e) => {
            error!(err = %e, "candidate list failed");
            internal_error()
        }
    }
}

async fn post_vote(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<VoteIn>,
) -> Response {
    let user = match resolve_user(&state, &headers).await {
        Ok(u) => u,
        Err(AuthFailure::Unauthorized) => return unauthorized(),
        Err(AuthFailure::Internal) => return internal_error(),
    };
    let Some(candidate_id) = body.candidate_id else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json_error_with_message("Candidate ID required")),
        )
            .into_response();
    };
    match state.store.votes().cast(user.id, candidate_id) {
        Ok(()) => Json(json!({ "message": "Support recorded!" })).into_response(),
        Err(CoreError::AlreadyVoted) => {
            (StatusCode::BAD_REQUEST, Json(json_err("already_voted"))).into_response()
        }
        Err(CoreError::NotFound) => (
            StatusCode::BAD_REQUEST,
            Json(json_error_with_message("Unknown candidate")),
        )
            .into_response(),
        Err(e) => {
            error!(err = %e, user = user.id.as_i64(), "vote insert failed");
            internal_error()
        }
    }
}

async fn get_voters(State(state): State<AppState>) -> Response {
    match state.store.votes().voters() {
        Ok(rows) => {
            let out: Vec<VoterOut> = rows
                .iter()
                .map(|v| VoterOut {
                    display_name: v.display_name.clone(),
                    linkedin_profile_url: v.linkedin_profile_url.clone(),
                    providers: v.providers.iter().map(Provider::as_str).collect(),
                })
                .collect();
            Json(out).into_response()
        }
        Err(e) => {
            error!(err = %e, "voter registry query failed");
            internal_error()
        }
    }
}

async fn get_results(State(state): State<AppState>) -> Response {
    match state.store.votes().tally() {
        Ok(rows) => {
            let out: Vec<TallyOut> = rows
                .into_iter()
                .map(|t| TallyOut {
                    candidate_id: t.candidate_id,
                    name: t.name,
                    votes: t.votes,
                })
                .collect();
            Json(out).into_response()
        }
        Err(e) => {
            error!(err = %e, "tally query failed");
            internal_error()
        }
    }
}

async fn post_update_linkedin_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LinkedInUrlIn>,
) -> Response {
    let user = match resolve_user(&state, &headers).await {
        Ok(u) => u,
        Err(AuthFailure::Unauthorized) => return unauthorized(),
        Err(AuthFailure::Internal) => return internal_error(),
    };
    let Some(raw) = body.linkedin_url else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json_error_with_message("LinkedIn URL required")),
        )
            .into_response();
    };

    match state.verifier.verify(&raw).await {
        VerificationResult::Valid(canonical) => {
            if let Err(e) = state.store.users().update_linkedin_url(user.id, &canonical) {
                error!(err = %e, user = user.id.as_i64(), "profile url update failed");
                return internal_error();
            }
            // Re-read the row; the response must reflect what was stored,
            // not the pre-update snapshot.
            match state.store.users().get(user.id) {
                Ok(Some(fresh)) => Json(json!({
                    "message": "Profile updated successfully",
                    "user": UserOut::from(&fresh),
                }))
                .into_response(),
                Ok(None) => internal_error(),
                Err(e) => {
                    error!(err = %e, user = user.id.as_i64(), "profile re-read failed");
                    internal_error()
                }
            }
        }
        VerificationResult::Rejected(err) => (
            StatusCode::BAD_REQUEST,
            Json(json_error_with_message(&err.to_string())),
        )
            .into_response(),
    }
}

async fn post_test_linkedin_verify(
    State(state): State<AppState>,
    Json(body): Json<LinkedInUrlIn>,
) -> Response {
    let Some(raw) = body.linkedin_url else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json_error_with_message("LinkedIn URL required")),
        )
            .into_response();
    };
    let out = match state.verifier.verify(&raw).await {
        VerificationResult::Valid(canonical) => VerifyOut {
            is_valid: true,
            url: Some(canonical.into_string()),
            error: None,
        },
        VerificationResult::Rejected(err) => VerifyOut {
            is_valid: false,
            url: None,
            error: Some(err.to_string()),
        },
    };
    Json(out).into_response()
}

// ============================================================================
// Router & startup
// ============================================================================

fn app(state: AppState, cors_allow_origin: HeaderValue) -> Router {
    let cors = if cors_allow_origin == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::exact(cors_allow_origin))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/api/health", get(get_health))
        .route("/api/user", get(get_user))
        .route("/api/candidates", get(get_candidates))
        .route("/api/vote", post(post_vote))
        .route("/api/voters", get(get_voters))
        .route("/api/results", get(get_results))
        .route("/api/update-linkedin-url", post(post_update_linkedin_url))
        .route("/api/test-linkedin-verify", post(post_test_linkedin_verify))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                    let request_id = req
                        .headers()
                        .get(X_REQUEST_ID)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http",
                        method = %req.method(),
                        uri = %req.uri(),
                        request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                .layer(cors),
        )
        .with_state(state)
}

fn init_tracing(format: &LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

fn build_state(config: &Config) -> Result<AppState, Box<dyn std::error::Error>> {
    let store = match config.storage_provider {
        StorageProvider::Memory => {
            AnyStore::Memory(Arc::new(InMemoryStore::with_sample_candidates()))
        }
        #[cfg(feature = "sqlite")]
        StorageProvider::Sqlite => {
            AnyStore::Sqlite(Arc::new(sqlite_store::SqliteStore::from_env()?))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageProvider::Sqlite => {
            return Err("STORAGE_PROVIDER=sqlite requires the 'sqlite' feature".into());
        }
    };

    let verifier = Arc::new(LinkedInVerifier::new(
        config.verify_policy,
        config.verify_timeout,
    )?);

    let google = config
        .google_oauth_client_id
        .as_ref()
        .map(|id| GoogleProvider::new(id.clone()));

    Ok(AppState {
        store,
        verifier,
        auth: Arc::new(AuthState {
            mode: config.auth_provider.clone(),
            google,
            linkedin: LinkedInProvider::new(),
        }),
    })
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    init_tracing(&config.log_format);
    config.warn_if_insecure();

    let state = match build_state(&config) {
        Ok(s) => s,
        Err(e) => {
            error!(err = %e, "startup failed");
            std::process::exit(1);
        }
    };

    let router = app(state, config.cors_allow_origin.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(err = %e, %addr, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(%addr, policy = config.verify_policy.as_str(), "api-server listening");

    if let Err(e) = axum::serve(listener, router).await {
        error!(err = %e, "server exited with error");
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
