//! Domain library for the voting service.
//!
//! Holds the domain types, ports (traits), and error definitions, plus the
//! pure pieces of the profile-verification core (URL normalization, format
//! validation, profile gating). Keep network and storage adapters out of
//! this crate.

/// Identifier of a persisted user row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UserId(pub i64);

impl UserId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

/// OAuth provider a user authenticated with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Provider {
    Google,
    LinkedIn,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::LinkedIn => "linkedin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "google" => Some(Provider::Google),
            "linkedin" => Some(Provider::LinkedIn),
            _ => None,
        }
    }
}

/// Identity resolved by an OAuth provider for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserIdentity {
    pub provider: Provider,
    /// Provider-specific subject (stable user id at the provider).
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// Persisted user profile.
///
/// A row is created at the first successful login for a provider subject, or
/// an existing row matched by email gets the new subject linked onto it. The
/// only field this subsystem mutates afterwards is `linkedin_profile_url`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub google_id: Option<String>,
    pub linkedin_id: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub linkedin_profile_url: Option<String>,
}

impl UserProfile {
    /// Providers this profile has linked, in a stable order.
    pub fn providers(&self) -> Vec<Provider> {
        let mut out = Vec::new();
        if self.google_id.is_some() {
            out.push(Provider::Google);
        }
        if self.linkedin_id.is_some() {
            out.push(Provider::LinkedIn);
        }
        out
    }
}

/// A candidate users can vote for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub linkedin_url: Option<String>,
}

/// Aggregated vote count for one candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteTally {
    pub candidate_id: i64,
    pub name: String,
    pub votes: u64,
}

/// One row of the public voter registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoterEntry {
    pub display_name: Option<String>,
    pub linkedin_profile_url: Option<String>,
    pub providers: Vec<Provider>,
}

/// Canonical form of a LinkedIn profile URL.
///
/// Only produced by [`validate::validate_profile_url`], so holding one
/// implies: absolute https/http URL, linkedin.com host, `/in/<slug>` path,
/// no query string or fragment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    pub(crate) fn from_validated(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why the existence verifier judged a format-valid URL implausible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ImplausibleReason {
    #[error("redirected away from profile")]
    RedirectedAway,
    #[error("profile not found")]
    NotFound,
    #[error("profile unverifiable")]
    Unverifiable,
    #[error("network error during verification")]
    NetworkError,
}

/// Verdict of the existence verifier. Advisory only; never a guarantee.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Plausibility {
    Plausible,
    Implausible(ImplausibleReason),
}

/// Everything that can reject a candidate URL on the way to a canonical one.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("The provided string is not a valid URL")]
    Parse,
    #[error("{0}")]
    Format(String),
    #[error("{0}")]
    Implausible(ImplausibleReason),
}

/// Tagged outcome of the verification orchestrator. Immutable once produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerificationResult {
    Valid(CanonicalUrl),
    Rejected(VerifyError),
}

impl VerificationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationResult::Valid(_))
    }
}

/// Repository port for user profiles.
pub trait UserRepository: Send + Sync {
    fn get(&self, id: UserId) -> Result<Option<UserProfile>, CoreError>;
    fn find_by_provider(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<Option<UserProfile>, CoreError>;
    fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, CoreError>;
    /// Insert a new row for a first-time identity.
    fn create(&self, identity: &UserIdentity) -> Result<UserProfile, CoreError>;
    /// Attach a provider subject to an existing row (matched by email).
    fn link_provider(
        &self,
        id: UserId,
        provider: Provider,
        subject: &str,
    ) -> Result<(), CoreError>;
    /// Persist a verified canonical URL. Callers must re-read the row via
    /// `get` afterwards instead of trusting in-memory copies.
    fn update_linkedin_url(&self, id: UserId, url: &CanonicalUrl) -> Result<(), CoreError>;
}

/// Repository port for candidates.
pub trait CandidateRepository: Send + Sync {
    fn list(&self) -> Result<Vec<Candidate>, CoreError>;
    fn get(&self, id: i64) -> Result<Option<Candidate>, CoreError>;
}

/// Repository port for votes and their aggregates.
pub trait VoteRepository: Send + Sync {
    /// Record a vote. One vote per user; a second attempt is `AlreadyVoted`.
    fn cast(&self, user: UserId, candidate: i64) -> Result<(), CoreError>;
    /// Vote counts per candidate, highest first.
    fn tally(&self) -> Result<Vec<VoteTally>, CoreError>;
    /// Registry of users who have voted.
    fn voters(&self) -> Result<Vec<VoterEntry>, CoreError>;
}

/// Core domain errors surfaced by the repository ports.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("not found")]
    NotFound,
    #[error("already voted")]
    AlreadyVoted,
    #[error("resource already exists")]
    AlreadyExists,
    #[error("repository error: {0}")]
    Repository(String),
}

pub mod adapters;
pub mod gate;
pub mod normalize;
pub mod validate;
