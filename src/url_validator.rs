use crate::error::ValidationError;
use url::Url;

/// Validate user supplied URL text before anything touches the network.
///
/// Checks run in order and stop at the first failure: presence, non-empty
/// after trimming, an explicit `http://` or `https://` scheme, and finally a
/// full parse that must yield a host.
pub fn validate_url(input: Option<&str>) -> Result<Url, ValidationError> {
    let trimmed = input.map(str::trim).unwrap_or_default();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyInput);
    }

    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(ValidationError::MissingScheme);
    }

    let parsed = Url::parse(trimmed).map_err(|e| {
        log::debug!("URL parse failed for '{trimmed}': {e}");
        ValidationError::MalformedUrl
    })?;

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed),
        _ => Err(ValidationError::MalformedUrl),
    }
}

/// Convenience wrapper for the common case of a plain string.
pub fn validate(input: &str) -> Result<Url, ValidationError> {
    validate_url(Some(input))
}
