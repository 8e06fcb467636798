use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{
    Candidate, CandidateRepository, CoreError, Provider, UserId, UserIdentity, UserProfile,
    UserRepository, VoteRepository, VoteTally, VoterEntry,
};

/// Simple in-memory store for tests and the `memory` storage provider. Not
/// intended for high concurrency beyond the internal mutex guarding state.
pub struct InMemoryStore {
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    next_user_id: i64,
    users: BTreeMap<i64, UserProfile>,
    candidates: Vec<Candidate>,
    /// user id -> candidate id; one entry per user enforces the single vote.
    votes: BTreeMap<i64, i64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                next_user_id: 1,
                users: BTreeMap::new(),
                candidates: Vec::new(),
                votes: BTreeMap::new(),
            }),
        }
    }

    /// Store pre-seeded with the two sample candidates.
    pub fn with_sample_candidates() -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock().expect("fresh mutex");
            inner.candidates = vec![
                Candidate {
                    id: 1,
                    name: "Candidate A".into(),
                    description: Some("Description for A".into()),
                    linkedin_url: None,
                },
                Candidate {
                    id: 2,
                    name: "Candidate B".into(),
                    description: Some("Description for B".into()),
                    linkedin_url: None,
                },
            ];
        }
        store
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, CoreError> {
        self.inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserRepository for InMemoryStore {
    fn get(&self, id: UserId) -> Result<Option<UserProfile>, CoreError> {
        Ok(self.lock()?.users.get(&id.0).cloned())
    }

    fn find_by_provider(
        &self,
        provider: Provider,
        subject: &str,
    ) -> Result<Option<UserProfile>, CoreError> {
        let inner = self.lock()?;
        Ok(inner
            .users
            .values()
            .find(|u| match provider {
                Provider::Google => u.google_id.as_deref() == Some(subject),
                Provider::LinkedIn => u.linkedin_id.as_deref() == Some(subject),
            })
            .cloned())
    }

    fn find_by_email(&self, email: &str) -> Result<Option<UserProfile>, CoreError> {
        let inner = self.lock()?;
        Ok(inner
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    fn create(&self, identity: &UserIdentity) -> Result<UserProfile, CoreError> {
        let mut inner = self.lock()?;
        let id = inner.next_user_id;
        inner.next_user_id += 1;
        let profile = UserProfile {
            id: UserId(id),
            google_id: (identity.provider == Provider::Google).then(|| identity.subject.clone()),
            linkedin_id: (identity.provider == Provider::LinkedIn)
                .then(|| identity.subject.clone()),
            display_name: identity.display_name.clone(),
            email: identity.email.clone(),
            linkedin_profile_url: None,
        };
        inner.users.insert(id, profile.clone());
        Ok(profile)
    }

    fn link_provider(
        &self,
        id: UserId,
        provider: Provider,
        subject: &str,
    ) -> Result<(), CoreError> {
        let mut inner = self.lock()?;
        let user = inner.users.get_mut(&id.0).ok_or(CoreError::NotFound)?;
        match provider {
            Provider::Google => user.google_id = Some(subject.to_string()),
            Provider::LinkedIn => user.linkedin_id = Some(subject.to_string()),
        }
        Ok(())
    }

    fn update_linkedin_url(
        &self,
        id: UserId,
        url: &crate::CanonicalUrl,
    ) -> Result<(), CoreError> {
        let mut inner = self.lock()?;
        let user = inner.users.get_mut(&id.0).ok_or(CoreError::NotFound)?;
        user.linkedin_profile_url = Some(url.as_str().to_string());
        Ok(())
    }
}

impl CandidateRepository for InMemoryStore {
    fn list(&self) -> Result<Vec<Candidate>, CoreError> {
        Ok(self.lock()?.candidates.clone())
    }

    fn get(&self, id: i64) -> Result<Option<Candidate>, CoreError> {
        Ok(self.lock()?.candidates.iter().find(|c| c.id == id).cloned())
    }
}

impl VoteRepository for InMemoryStore {
    fn cast(&self, user: UserId, candidate: i64) -> Result<(), CoreError> {
        let mut inner = self.lock()?;
        if !inner.candidates.iter().any(|c| c.id == candidate) {
            return Err(CoreError::NotFound);
        }
        if inner.votes.contains_key(&user.0) {
            return Err(CoreError::AlreadyVoted);
        }
        inner.votes.insert(user.0, candidate);
        Ok(())
    }

    fn tally(&self) -> Result<Vec<VoteTally>, CoreError> {
        let inner = self.lock()?;
        let mut out: Vec<VoteTally> = inner
            .candidates
            .iter()
            .map(|c| VoteTally {
                candidate_id: c.id,
                name: c.name.clone(),
                votes: inner.votes.values().filter(|&&v| v == c.id).count() as u64,
            })
            .collect();
        out.sort_by(|a, b| b.votes.cmp(&a.votes).then(a.candidate_id.cmp(&b.candidate_id)));
        Ok(out)
    }

    fn voters(&self) -> Result<Vec<VoterEntry>, CoreError> {
        let inner = self.lock()?;
        Ok(inner
            .votes
            .keys()
            .filter_map(|uid| inner.users.get(uid))
            .map(|u| VoterEntry {
                display_name: u.display_name.clone(),
                linkedin_profile_url: u.linkedin_profile_url.clone(),
                providers: u.providers(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate_profile_url;

    fn google_identity(subject: &str, email: &str) -> UserIdentity {
        UserIdentity {
            provider: Provider::Google,
            subject: subject.into(),
            email: Some(email.into()),
            display_name: Some("Jane".into()),
        }
    }

    #[test]
    fn create_then_find_by_provider() {
        let store = InMemoryStore::new();
        let created = store
            .create(&google_identity("g1", "jane@example.com"))
            .expect("create");
        let found = store
            .find_by_provider(Provider::Google, "g1")
            .expect("query")
            .expect("present");
        assert_eq!(found, created);
        assert!(store
            .find_by_provider(Provider::LinkedIn, "g1")
            .expect("query")
            .is_none());
    }

    #[test]
    fn link_provider_onto_existing_row() {
        let store = InMemoryStore::new();
        let created = store
            .create(&google_identity("g1", "jane@example.com"))
            .expect("create");
        store
            .link_provider(created.id, Provider::LinkedIn, "l1")
            .expect("link");
        let reread = UserRepository::get(&store, created.id)
            .expect("query")
            .expect("present");
        assert_eq!(reread.linkedin_id.as_deref(), Some("l1"));
        assert_eq!(reread.google_id.as_deref(), Some("g1"));
    }

    #[test]
    fn update_url_visible_after_reread() {
        let store = InMemoryStore::new();
        let created = store
            .create(&google_identity("g1", "jane@example.com"))
            .expect("create");
        let url = validate_profile_url(
            &url::Url::parse("https://www.linkedin.com/in/jane").expect("parses"),
        )
        .expect("valid");
        store
            .update_linkedin_url(created.id, &url)
            .expect("update");
        let reread = UserRepository::get(&store, created.id)
            .expect("query")
            .expect("present");
        assert_eq!(
            reread.linkedin_profile_url.as_deref(),
            Some("https://www.linkedin.com/in/jane")
        );
    }

    #[test]
    fn one_vote_per_user() {
        let store = InMemoryStore::with_sample_candidates();
        let u = store
            .create(&google_identity("g1", "jane@example.com"))
            .expect("create");
        store.cast(u.id, 1).expect("first vote");
        assert!(matches!(store.cast(u.id, 2), Err(CoreError::AlreadyVoted)));
    }

    #[test]
    fn vote_for_unknown_candidate_is_not_found() {
        let store = InMemoryStore::with_sample_candidates();
        let u = store
            .create(&google_identity("g1", "jane@example.com"))
            .expect("create");
        assert!(matches!(store.cast(u.id, 99), Err(CoreError::NotFound)));
    }

    #[test]
    fn tally_orders_by_votes_descending() {
        let store = InMemoryStore::with_sample_candidates();
        for i in 0..3 {
            let u = store
                .create(&google_identity(&format!("g{i}"), &format!("u{i}@x.com")))
                .expect("create");
            store.cast(u.id, 2).expect("vote");
        }
        let u = store
            .create(&google_identity("gx", "x@x.com"))
            .expect("create");
        store.cast(u.id, 1).expect("vote");

        let tally = store.tally().expect("tally");
        assert_eq!(tally[0].candidate_id, 2);
        assert_eq!(tally[0].votes, 3);
        assert_eq!(tally[1].votes, 1);
    }

    #[test]
    fn voters_lists_only_users_who_voted() {
        let store = InMemoryStore::with_sample_candidates();
        let voter = store
            .create(&google_identity("g1", "jane@example.com"))
            .expect("create");
        let _bystander = store
            .create(&google_identity("g2", "joe@example.com"))
            .expect("create");
        store.cast(voter.id, 1).expect("vote");

        let voters = store.voters().expect("voters");
        assert_eq!(voters.len(), 1);
        assert_eq!(voters[0].display_name.as_deref(), Some("Jane"));
        assert_eq!(voters[0].providers, vec![Provider::Google]);
    }
}
