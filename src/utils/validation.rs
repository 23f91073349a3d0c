//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;

/// Regex for validating service identifiers (provider names)
static SERVICE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]*$").unwrap()
});

/// Validate a service identifier such as `openai` or `google-gemini`
pub fn validate_service(service: &str) -> bool {
    !service.is_empty() && service.len() <= 100 && SERVICE_REGEX.is_match(service)
}

/// A secret must contain at least one non-whitespace character
pub fn validate_secret(secret: &str) -> bool {
    !secret.trim().is_empty()
}

/// Normalize an optional display name: trimmed, empty becomes `None`
pub fn normalize_name(name: Option<&str>) -> Option<String> {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}
