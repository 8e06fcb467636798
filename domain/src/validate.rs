//! Format validation for normalized LinkedIn profile URLs.

use url::Url;

use crate::{CanonicalUrl, VerifyError};

const HOST_MESSAGE: &str = "Must be a valid linkedin.com URL";
const FORMAT_MESSAGE: &str = "Invalid format. Use: https://www.linkedin.com/in/your-profile";

/// Validate a normalized URL against the accepted profile shape and produce
/// the canonical form.
///
/// Accepted: `http(s)://<host>/in/<slug>[/]` where the host is
/// `linkedin.com` or a subdomain of it, and `<slug>` is one or more of
/// `[A-Za-z0-9_-]`. The `in` segment is matched case-insensitively; the slug
/// is accepted in any case and preserved byte-for-byte.
pub fn validate_profile_url(url: &Url) -> Result<CanonicalUrl, VerifyError> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(VerifyError::Format(HOST_MESSAGE.to_string()));
    }

    let host = url
        .host_str()
        .ok_or_else(|| VerifyError::Format(HOST_MESSAGE.to_string()))?;
    if !is_linkedin_host(host) {
        return Err(VerifyError::Format(HOST_MESSAGE.to_string()));
    }

    if !is_profile_path(url.path()) {
        return Err(VerifyError::Format(FORMAT_MESSAGE.to_string()));
    }

    Ok(CanonicalUrl::from_validated(url.to_string()))
}

/// Host is the LinkedIn domain itself or a subdomain. The dot boundary
/// matters: `notlinkedin.com` must not pass.
pub fn is_linkedin_host(host: &str) -> bool {
    host.eq_ignore_ascii_case("linkedin.com")
        || host
            .to_ascii_lowercase()
            .ends_with(".linkedin.com")
}

/// Path is exactly `/in/<slug>` with an optional trailing slash.
pub fn is_profile_path(path: &str) -> bool {
    let mut segments = path.trim_start_matches('/').split('/');
    let first = match segments.next() {
        Some(s) => s,
        None => return false,
    };
    if !first.eq_ignore_ascii_case("in") {
        return false;
    }
    let slug = match segments.next() {
        Some(s) => s,
        None => return false,
    };
    if slug.is_empty() || !is_valid_slug(slug) {
        return false;
    }
    // Only a single empty trailing segment (trailing slash) may follow.
    match segments.next() {
        None => true,
        Some("") => segments.next().is_none(),
        Some(_) => false,
    }
}

fn is_valid_slug(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_url;

    fn validate(raw: &str) -> Result<CanonicalUrl, VerifyError> {
        validate_profile_url(&normalize_url(raw).expect("normalizes"))
    }

    #[test]
    fn accepts_standard_profile_urls() {
        assert_eq!(
            validate("https://www.linkedin.com/in/jane-doe123/")
                .expect("valid")
                .as_str(),
            "https://www.linkedin.com/in/jane-doe123/"
        );
        assert!(validate("https://linkedin.com/in/jane").is_ok());
        assert!(validate("linkedin.com/in/j_d-99").is_ok());
    }

    #[test]
    fn rejects_non_profile_paths() {
        assert!(matches!(
            validate("https://linkedin.com/company/acme"),
            Err(VerifyError::Format(_))
        ));
        assert!(validate("https://linkedin.com/in/").is_err());
        assert!(validate("https://linkedin.com/in/jane/details").is_err());
        assert!(validate("https://linkedin.com/").is_err());
    }

    #[test]
    fn rejects_foreign_hosts_with_dot_boundary() {
        assert!(matches!(
            validate("https://notlinkedin.com/in/jane"),
            Err(VerifyError::Format(msg)) if msg == HOST_MESSAGE
        ));
        assert!(validate("https://linkedin.com.evil.org/in/jane").is_err());
        assert!(validate("https://www.linkedin.com/in/jane").is_ok());
    }

    #[test]
    fn rejects_slug_with_invalid_characters() {
        assert!(validate("https://linkedin.com/in/jane%20doe").is_err());
        assert!(validate("https://linkedin.com/in/jane.doe").is_err());
    }

    #[test]
    fn in_segment_is_case_insensitive_slug_preserved() {
        let c = validate("https://linkedin.com/IN/Jane-Doe").expect("valid");
        assert_eq!(c.as_str(), "https://linkedin.com/IN/Jane-Doe");
    }

    #[test]
    fn rejects_non_http_schemes() {
        let u = url::Url::parse("ftp://linkedin.com/in/jane").expect("parses");
        assert!(validate_profile_url(&u).is_err());
    }
}
