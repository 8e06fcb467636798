//! sqlite-store — SQLite implementation of the voting repository ports.
//!
//! Purpose
//! - Provide a lightweight, file-based store to run the service locally
//!   without external database dependencies.
//! - Implements `UserRepository`, `CandidateRepository`, and
//!   `VoteRepository` from the `domain` crate.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - `UNIQUE(user_id)` on the votes table enforces the one-vote rule at the
//!   storage level; the constraint violation surfaces as `AlreadyVoted`.
//! - Reads and writes go through one connection, so a `get` immediately
//!   after `update_linkedin_url` observes the committed row.

use std::path::Path;
use std::sync::Mutex;

use domain::{
    Candidate, CandidateRepository, CanonicalUrl, CoreError, Provider, UserId, UserIdentity,
    UserProfile, UserRepository, VoteRepository, VoteTally, VoterEntry,
};
use rusqlite::{params, Connection, OptionalExtension};

/// SQLite-backed store for local deployments.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at the given path, ensure schema,
    /// and seed the sample candidates when the table is empty.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let conn = Connection::open(path).map_err(map_sqerr)?;
        init_schema(&conn)?;
        seed_candidates(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Construct from env var `DB_PATH` (defaults to `./data/voting.db`).
    pub fn from_env() -> Result<Self, CoreError> {
        let path = std::env::var("DB_PATH").unwrap_or_else(|_| "./data/voting.db".to_string());
        if let Some(dir) = Path::new(&path).parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        Self::new(path)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            google_id TEXT UNIQUE,
            linkedin_id TEXT UNIQUE,
            display_name TEXT,
            email TEXT,
            linkedin_profile_url TEXT
        );
        CREATE TABLE IF NOT EXISTS candidates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            linkedin_url TEXT
        );
        CREATE TABLE IF NOT EXISTS votes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES users(id),
            candidate_id INTEGER NOT NULL REFERENCES candidates(id),
            UNIQUE(user_id)
        );
        "#,
    )
    .map_err(map_sqerr)
}

fn seed_candidates(conn: &Connection) -> Result<(), CoreError> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM candidates", [], |row| row.get(0))
        .map_err(map_sqerr)?;
    if count == 0 {
        conn.execute(
            "INSERT INTO candidates (name, description) VALUES ('Candidate A', 'Description for A')",
            [],
        )
        .map_err(map_sqerr)?;
        conn.execute(
            "INSERT INTO candidates (name, description) VALUES ('Candidate B', 'Description for B')",
            [],
        )
        .map_err(map_sqerr)?;
    }
    Ok(())
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Repository(format!("sqlite error: {e}"))
}

fn row_to_profile(row: &rusqlite::Row) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        id: UserId(row.get(0)?),
        google_id: row.get(1)?,
        linkedin_id: row.get(2)?,
        display_name: row.get(3)?,
        email: row.get(4)?,
        linkedin_profile_url: row.get(5)?,
    })
}

const PROFILE_COLS: &str =
    "id, google_id, linkedin_id, display_name, email, linkedin_profile_url";

impl UserRepository for SqliteStore {
    fn get(&self, id: UserId) -> Result<Option<UserProfile>, CoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {PROFILE_COLS} FROM users WHERE id = ?1"),
            params![id.as_i64()],
            row_to_profile,
        )
        .optional()
        .map_err(map_sqerr)
    }

    fn find_by_provider(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<Option<UserProfile>, CoreError> {
        let col = match provider {
            Provider::Google => "google_id",
            Provider::LinkedIn => "linkedin_id",
        };
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {PROFILE_COLS} FROM users WHERE {col} = ?1"),
            params![subject],
            row_to_profile,
        )
        .optional()
        .map_err(map_sqerr)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, CoreError> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {PROFILE_COLS} FROM users WHERE email = ?1 LIMIT 1"),
            params![email],
            row_to_profile,
        )
        .optional()
        .map_err(map_sqerr)
    }

    fn create(&self, identity: &UserIdentity) -> Result<UserProfile, CoreError> {
        let (google_id, linkedin_id) = match identity.provider {
            Provider::Google => (Some(identity.subject.as_str()), None),
            Provider::LinkedIn => (None, Some(identity.subject.as_str())),
        };
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (google_id, linkedin_id, display_name, email) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                google_id,
                linkedin_id,
                identity.display_name,
                identity.email
            ],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                CoreError::AlreadyExists
            }
            other => map_sqerr(other),
        })?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            &format!("SELECT {PROFILE_COLS} FROM users WHERE id = ?1"),
            params![id],
            row_to_profile,
        )
        .map_err(map_sqerr)
    }

    fn link_provider(
        &self,
        id: UserId,
        provider: Provider,
        subject: &str,
    ) -> Result<(), CoreError> {
        let col = match provider {
            Provider::Google => "google_id",
            Provider::LinkedIn => "linkedin_id",
        };
        let conn = self.lock()?;
        let changed = conn
            .execute(
                &format!("UPDATE users SET {col} = ?1 WHERE id = ?2"),
                params![subject, id.as_i64()],
            )
            .map_err(map_sqerr)?;
        if changed == 0 {
            return Err(CoreError::NotFound);
        }
        Ok(())
    }

    fn update_linkedin_url(&self, id: UserId, url: &CanonicalUrl) -> Result<(), CoreError> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE users SET linkedin_profile_url = ?1 WHERE id = ?2",
                params![url.as_str(), id.as_i64()],
            )
            .map_err(map_sqerr)?;
        if changed == 0 {
            return Err(CoreError::NotFound);
        }
        Ok(())
    }
}

impl CandidateRepository for SqliteStore {
    fn list(&self) -> Result<Vec<Candidate>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, name, description, linkedin_url FROM candidates ORDER BY id")
            .map_err(map_sqerr)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Candidate {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    linkedin_url: row.get(3)?,
                })
            })
            .map_err(map_sqerr)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqerr)
    }

    fn get(&self, id: i64) -> Result<Option<Candidate>, CoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, description, linkedin_url FROM candidates WHERE id = ?1",
            params![id],
            |row| {
                Ok(Candidate {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    linkedin_url: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(map_sqerr)
    }
}

impl VoteRepository for SqliteStore {
    fn cast(&self, user: UserId, candidate: i64) -> Result<(), CoreError> {
        let conn = self.lock()?;
        let exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM candidates WHERE id = ?1",
                params![candidate],
                |row| row.get(0),
            )
            .map_err(map_sqerr)?;
        if exists == 0 {
            return Err(CoreError::NotFound);
        }
        conn.execute(
            "INSERT INTO votes (user_id, candidate_id) VALUES (?1, ?2)",
            params![user.as_i64(), candidate],
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                CoreError::AlreadyVoted
            }
            other => map_sqerr(other),
        })?;
        Ok(())
    }

    fn tally(&self) -> Result<Vec<VoteTally>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT candidates.id, candidates.name, COUNT(votes.id) AS votes \
                 FROM candidates \
                 LEFT JOIN votes ON candidates.id = votes.candidate_id \
                 GROUP BY candidates.id, candidates.name \
                 ORDER BY votes DESC, candidates.id ASC",
            )
            .map_err(map_sqerr)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(VoteTally {
                    candidate_id: row.get(0)?,
                    name: row.get(1)?,
                    votes: row.get::<_, i64>(2)? as u64,
                })
            })
            .map_err(map_sqerr)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqerr)
    }

    fn voters(&self) -> Result<Vec<VoterEntry>, CoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT users.display_name, users.linkedin_profile_url, \
                        users.google_id, users.linkedin_id \
                 FROM users JOIN votes ON users.id = votes.user_id \
                 ORDER BY votes.id",
            )
            .map_err(map_sqerr)?;
        let rows = stmt
            .query_map([], |row| {
                let google_id: Option<String> = row.get(2)?;
                let linkedin_id: Option<String> = row.get(3)?;
                let mut providers = Vec::new();
                if google_id.is_some() {
                    providers.push(Provider::Google);
                }
                if linkedin_id.is_some() {
                    providers.push(Provider::LinkedIn);
                }
                Ok(VoterEntry {
                    display_name: row.get(0)?,
                    linkedin_profile_url: row.get(1)?,
                    providers,
                })
            })
            .map_err(map_sqerr)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqerr)
    }
}
