//! Profile-completion gate.

use crate::UserProfile;

/// Derived per-request decision; never stored or cached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProfileGateDecision {
    pub must_complete_profile: bool,
}

/// Decide whether an authenticated user must complete their profile before
/// reaching the voting flow.
///
/// Any user without a stored LinkedIn URL is gated, regardless of which
/// provider they signed in with. Callers must pass profile state re-read
/// from the store after any update; this function is pure and trusts its
/// input.
pub fn evaluate(profile: &UserProfile) -> ProfileGateDecision {
    ProfileGateDecision {
        must_complete_profile: profile.linkedin_profile_url.is_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserId;

    fn profile(linkedin_profile_url: Option<&str>) -> UserProfile {
        UserProfile {
            id: UserId(1),
            google_id: Some("g1".into()),
            linkedin_id: None,
            display_name: Some("Jane".into()),
            email: Some("jane@example.com".into()),
            linkedin_profile_url: linkedin_profile_url.map(str::to_string),
        }
    }

    #[test]
    fn gates_user_without_url() {
        assert!(evaluate(&profile(None)).must_complete_profile);
    }

    #[test]
    fn passes_user_with_url() {
        let p = profile(Some("https://www.linkedin.com/in/jane"));
        assert!(!evaluate(&p).must_complete_profile);
    }

    #[test]
    fn gates_linkedin_user_without_url_too() {
        let mut p = profile(None);
        p.google_id = None;
        p.linkedin_id = Some("l1".into());
        assert!(evaluate(&p).must_complete_profile);
    }
}
