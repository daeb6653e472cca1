use std::collections::HashMap;
use std::time::Duration;

use crate::error::GatewayError;

/// Backend-specific hook that pulls a readable message out of an error body.
pub type ErrorMessageExtractor = fn(&str) -> Option<String>;

const MAX_RAW_MESSAGE_CHARS: usize = 512;

/// Extracts the `Retry-After` header (in seconds) if present.
///
/// HTTP-date values are ignored because backends use the numeric form.
pub(crate) fn retry_after_from_headers(headers: &HashMap<String, String>) -> Option<Duration> {
    headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("retry-after"))
        .and_then(|(_, value)| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Maps a non-2xx response onto the error taxonomy.
///
/// The mapping is shared by every backend; only `extract` differs.
pub(crate) fn classify_status(
    provider: &str,
    status: u16,
    headers: &HashMap<String, String>,
    body: &str,
    extract: ErrorMessageExtractor,
) -> GatewayError {
    let message = extract(body).unwrap_or_else(|| raw_message(status, body));
    let provider = provider.to_string();
    match status {
        401 => GatewayError::Auth { provider, message },
        429 => GatewayError::RateLimit {
            provider,
            message,
            retry_after: retry_after_from_headers(headers),
        },
        402 | 403 => GatewayError::Quota { provider, message },
        422 => GatewayError::InvalidResponse { provider, message },
        _ => GatewayError::Provider {
            provider,
            status: Some(status),
            message,
        },
    }
}

fn raw_message(status: u16, body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return format!("HTTP {status}");
    }
    trimmed.chars().take(MAX_RAW_MESSAGE_CHARS).collect()
}

/// Re-labels errors raised below the provider layer with the provider's name.
pub(crate) fn rescope(err: GatewayError, provider: &str, timeout: Duration) -> GatewayError {
    match err {
        GatewayError::Provider {
            status, message, ..
        } => GatewayError::Provider {
            provider: provider.to_string(),
            status,
            message,
        },
        GatewayError::Timeout { .. } => GatewayError::Timeout {
            provider: provider.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        },
        GatewayError::InvalidResponse { message, .. } => GatewayError::InvalidResponse {
            provider: provider.to_string(),
            message,
        },
        other => other,
    }
}
