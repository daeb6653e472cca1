use serde::Deserialize;
use serde_json::Value;

/// Pulls the message out of `{"error": "..."}` or `{"error": {"message": "..."}}`.
pub(crate) fn extract_local_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<Value>,
        message: Option<String>,
    }
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.error {
        Some(Value::String(message)) => Some(message),
        Some(Value::Object(inner)) => inner
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => parsed.message,
    }
    .filter(|message| !message.trim().is_empty())
}
