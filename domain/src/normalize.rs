//! Candidate URL normalization. Deterministic and pure: no I/O here.

use url::Url;

use crate::VerifyError;

/// Normalize a raw, user-controlled URL string.
///
/// Trims whitespace, infers `https://` when no scheme prefix is present,
/// parses, and strips the query string and fragment. The parser lowercases
/// the host. Returns [`VerifyError::Parse`] for anything `url` cannot parse.
pub fn normalize_url(raw: &str) -> Result<Url, VerifyError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(VerifyError::Parse);
    }

    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let mut url = Url::parse(&with_scheme).map_err(|_| VerifyError::Parse)?;
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_https_when_scheme_missing() {
        let u = normalize_url("linkedin.com/in/jane").expect("parses");
        assert_eq!(u.as_str(), "https://linkedin.com/in/jane");
    }

    #[test]
    fn strips_query_and_fragment() {
        let u = normalize_url("https://www.linkedin.com/in/jane?utm=1#x").expect("parses");
        assert_eq!(u.as_str(), "https://www.linkedin.com/in/jane");
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let u = normalize_url("  https://www.linkedin.com/in/jane  ").expect("parses");
        assert_eq!(u.as_str(), "https://www.linkedin.com/in/jane");
    }

    #[test]
    fn lowercases_host_but_not_path() {
        let u = normalize_url("https://WWW.LinkedIn.com/in/Jane-Doe").expect("parses");
        assert_eq!(u.host_str(), Some("www.linkedin.com"));
        assert_eq!(u.path(), "/in/Jane-Doe");
    }

    #[test]
    fn rejects_unparseable_input() {
        assert_eq!(normalize_url(""), Err(VerifyError::Parse));
        assert_eq!(normalize_url("   "), Err(VerifyError::Parse));
        assert_eq!(normalize_url("http://"), Err(VerifyError::Parse));
        assert_eq!(normalize_url("https://exa mple.com"), Err(VerifyError::Parse));
    }

    #[test]
    fn existing_scheme_is_kept() {
        let u = normalize_url("http://linkedin.com/in/jane").expect("parses");
        assert_eq!(u.scheme(), "http");
    }
}
