//! Heuristic response classification for profile pages.
//!
//! LinkedIn offers no stable contract to automated clients: markup changes,
//! automation blocks, and generic sign-in interstitials are all expected.
//! Every scraping pattern lives in [`ContentClassifier`] so the lists can be
//! updated without touching the verifier's control flow.

use domain::{ImplausibleReason, Plausibility};
use reqwest::StatusCode;

/// Pattern lists driving the heuristic classification. All matching happens
/// on the lowercased body.
#[derive(Clone, Debug)]
pub struct ContentClassifier {
    /// Phrases that identify an error/404 page.
    pub error_patterns: Vec<String>,
    /// Structured-data markers that identify a person/profile entity.
    pub strong_indicators: Vec<String>,
    /// Title fragments of generic sign-in/join pages.
    pub generic_titles: Vec<String>,
    /// Markers proving a page is the service's own (private-profile
    /// allowance on client errors).
    pub service_markers: Vec<String>,
    /// Bare page title that identifies the service's landing page.
    pub service_name: String,
}

impl Default for ContentClassifier {
    fn default() -> Self {
        Self {
            error_patterns: [
                "profile not found",
                "page not found",
                "this page doesn't exist",
                "page doesn't exist",
                "couldn't find that page",
            ]
            .map(str::to_string)
            .to_vec(),
            strong_indicators: [
                "\"@type\":\"person\"",
                "\"@type\": \"person\"",
                "profilepage",
                "og:type\" content=\"profile",
            ]
            .map(str::to_string)
            .to_vec(),
            generic_titles: ["sign up", "sign in", "log in", "join linkedin"]
                .map(str::to_string)
                .to_vec(),
            service_markers: vec!["linkedin".to_string()],
            service_name: "linkedin".to_string(),
        }
    }
}

impl ContentClassifier {
    /// Classify a fetched response body. The redirect check happens before
    /// this, in the verifier; network failures never reach here.
    pub fn classify(&self, status: StatusCode, body: &str) -> Plausibility {
        let lower = body.to_lowercase();

        if self
            .error_patterns
            .iter()
            .any(|p| lower.contains(p.as_str()))
        {
            return Plausibility::Implausible(ImplausibleReason::NotFound);
        }

        // Client errors without an error phrase can still be a private
        // profile, as long as the page is recognizably the service's own.
        if status.is_client_error() {
            return if self
                .service_markers
                .iter()
                .any(|m| lower.contains(m.as_str()))
            {
                Plausibility::Plausible
            } else {
                Plausibility::Implausible(ImplausibleReason::Unverifiable)
            };
        }

        // A generic title is independently disqualifying.
        if let Some(title) = extract_title(&lower) {
            let title = title.trim();
            if title == self.service_name
                || self
                    .generic_titles
                    .iter()
                    .any(|g| title.contains(g.as_str()))
            {
                return Plausibility::Implausible(ImplausibleReason::Unverifiable);
            }
        }

        if self
            .strong_indicators
            .iter()
            .any(|p| lower.contains(&p.to_lowercase()))
        {
            Plausibility::Plausible
        } else {
            Plausibility::Implausible(ImplausibleReason::Unverifiable)
        }
    }
}

/// First `<title>` element content, if any. `body` is already lowercased.
fn extract_title(body: &str) -> Option<&str> {
    let open = body.find("<title")?;
    let rest = &body[open..];
    let gt = rest.find('>')?;
    let after = &rest[gt + 1..];
    let close = after.find("</title>")?;
    Some(&after[..close])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> ContentClassifier {
        ContentClassifier::default()
    }

    #[test]
    fn error_phrase_means_not_found() {
        let body = "<html><body>Sorry, this profile not found.</body></html>";
        assert_eq!(
            classifier().classify(StatusCode::OK, body),
            Plausibility::Implausible(ImplausibleReason::NotFound)
        );
    }

    #[test]
    fn client_error_from_service_is_private_profile_allowance() {
        let body = "<html><title>LinkedIn Member</title>Restricted LinkedIn page</html>";
        assert_eq!(
            classifier().classify(StatusCode::FORBIDDEN, body),
            Plausibility::Plausible
        );
    }

    #[test]
    fn client_error_from_elsewhere_is_implausible() {
        let body = "<html><body>blocked by corporate proxy</body></html>";
        assert_eq!(
            classifier().classify(StatusCode::FORBIDDEN, body),
            Plausibility::Implausible(ImplausibleReason::Unverifiable)
        );
    }

    #[test]
    fn generic_title_overrides_indicators() {
        let body = r#"<html><title>Sign Up | LinkedIn</title>"@type":"Person"</html>"#;
        assert_eq!(
            classifier().classify(StatusCode::OK, body),
            Plausibility::Implausible(ImplausibleReason::Unverifiable)
        );
    }

    #[test]
    fn bare_service_name_title_is_generic() {
        let body = "<html><title>LinkedIn</title>some content</html>";
        assert_eq!(
            classifier().classify(StatusCode::OK, body),
            Plausibility::Implausible(ImplausibleReason::Unverifiable)
        );
    }

    #[test]
    fn strong_indicator_required_for_plausible() {
        let with = r#"<html><title>Jane Doe | LinkedIn</title>{"@type":"Person"}</html>"#;
        assert_eq!(
            classifier().classify(StatusCode::OK, with),
            Plausibility::Plausible
        );

        let without = "<html><title>Jane Doe | LinkedIn</title><p>hello</p></html>";
        assert_eq!(
            classifier().classify(StatusCode::OK, without),
            Plausibility::Implausible(ImplausibleReason::Unverifiable)
        );
    }

    #[test]
    fn custom_pattern_lists_are_honored() {
        let c = ContentClassifier {
            error_patterns: vec!["totally gone".into()],
            strong_indicators: vec!["person-marker".into()],
            generic_titles: vec![],
            ..ContentClassifier::default()
        };
        assert_eq!(
            c.classify(StatusCode::OK, "this profile is totally gone"),
            Plausibility::Implausible(ImplausibleReason::NotFound)
        );
        assert_eq!(
            c.classify(StatusCode::OK, "has person-marker inside"),
            Plausibility::Plausible
        );
    }

    #[test]
    fn service_identity_markers_are_configurable() {
        let c = ContentClassifier {
            service_markers: vec!["examplehub".into()],
            service_name: "examplehub".into(),
            ..ContentClassifier::default()
        };
        // Client-error allowance keys off the configured markers.
        assert_eq!(
            c.classify(StatusCode::FORBIDDEN, "restricted ExampleHub page"),
            Plausibility::Plausible
        );
        assert_eq!(
            c.classify(StatusCode::FORBIDDEN, "restricted LinkedIn page"),
            Plausibility::Implausible(ImplausibleReason::Unverifiable)
        );
        // So does the bare-title check.
        assert_eq!(
            c.classify(StatusCode::OK, "<html><title>ExampleHub</title>x</html>"),
            Plausibility::Implausible(ImplausibleReason::Unverifiable)
        );
    }
}
