//! Typed backend failures

use serde_json::Value;

/// Failure talking to the mail backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Non-success HTTP status
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, TLS or timeout failure
    #[error("request failed: {0}")]
    Transport(#[source] ureq::Error),

    /// Response body did not match the expected shape
    #[error("invalid response: {0}")]
    Decode(String),

    /// Unknown email or endpoint
    #[error("{0} not found")]
    NotFound(String),
}

impl BackendError {
    /// Build a status error, preferring the server's `message`/`error` field
    pub fn status(status: u16, body: &str) -> Self {
        let body = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|json| {
                ["message", "error"]
                    .into_iter()
                    .find_map(|key| json.get(key).and_then(Value::as_str).map(str::to_string))
            })
            .unwrap_or_else(|| body.trim().to_string());
        BackendError::Status { status, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_prefers_json_message() {
        let err = BackendError::status(500, r#"{"error": "服务器内部错误", "message": "db locked"}"#);
        assert_eq!(err.to_string(), "backend returned 500: db locked");

        let err = BackendError::status(404, r#"{"error": ".env 文件未找到"}"#);
        assert_eq!(err.to_string(), "backend returned 404: .env 文件未找到");

        let err = BackendError::status(502, "Bad Gateway\n");
        assert_eq!(err.to_string(), "backend returned 502: Bad Gateway");
    }
}
