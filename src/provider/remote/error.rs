use serde_json::Value;

use super::types::{RemoteErrorBody, RemoteErrorEnvelope};

/// Reads `{"error":{"message":..,"metadata":{"raw":..}}}`, preferring the upstream text.
pub(crate) fn extract_remote_error(body: &str) -> Option<String> {
    let envelope: RemoteErrorEnvelope = serde_json::from_str(body).ok()?;
    describe_error(&envelope.error)
}

pub(crate) fn describe_error(error: &RemoteErrorBody) -> Option<String> {
    let message = error
        .message
        .as_deref()
        .map(str::trim)
        .filter(|message| !message.is_empty());
    let metadata = error.metadata.as_ref();
    let raw = metadata.and_then(|meta| meta.raw.as_ref()).and_then(|raw| match raw {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    });
    let upstream = metadata.and_then(|meta| meta.provider_name.as_deref());

    match (message, raw.filter(|raw| !raw.is_empty())) {
        (Some(message), Some(raw)) if message != raw => Some(match upstream {
            Some(name) => format!("{message} ({name}: {raw})"),
            None => format!("{message} ({raw})"),
        }),
        (Some(message), _) => Some(message.to_string()),
        (None, Some(raw)) => Some(raw),
        (None, None) => None,
    }
}
