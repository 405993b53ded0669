// Logging macros that pass the formatted message through the default redactor.
// The message is formatted before entering tracing's macro so caller arguments
// resolve against the caller's imports.
#[macro_export]
macro_rules! redacted_info {
    ($($arg:tt)*) => {{
        let message = $crate::redact_text(&format!($($arg)*));
        tracing::info!("{}", message)
    }};
}

#[macro_export]
macro_rules! redacted_warn {
    ($($arg:tt)*) => {{
        let message = $crate::redact_text(&format!($($arg)*));
        tracing::warn!("{}", message)
    }};
}

#[macro_export]
macro_rules! redacted_error {
    ($($arg:tt)*) => {{
        let message = $crate::redact_text(&format!($($arg)*));
        tracing::error!("{}", message)
    }};
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    fn metadata() -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("email".to_string(), json!("jane.doe@example.com"));
        metadata.insert("path".to_string(), json!("/patients"));
        metadata
    }

    #[test]
    fn test_macros_accept_json_value_arguments() {
        redacted_info!("event metadata {}", Value::Object(metadata()));
        redacted_warn!("event metadata {}", Value::Object(metadata()));
        redacted_error!("event metadata {} for {}", Value::Object(metadata()), "user@example.com");
    }

    #[test]
    fn test_macro_message_is_redacted_before_logging() {
        let formatted = format!("event metadata {}", Value::Object(metadata()));
        let message = crate::redact_text(&formatted);
        assert!(!message.contains("jane.doe@example.com"));
        assert!(message.contains("/patients"));
    }
}
