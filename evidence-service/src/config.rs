use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub handbook_api_url: String,
    /// Load documents from this markdown directory instead of the backend.
    pub handbook_dir: Option<String>,
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            handbook_api_url: std::env::var("HANDBOOK_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:9481".to_string()),
            handbook_dir: std::env::var("HANDBOOK_DIR")
                .ok()
                .filter(|dir| !dir.trim().is_empty()),
            request_timeout: Duration::from_secs(
                std::env::var("REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60),
            ),
            log_format: match std::env::var("LOG_FORMAT").as_deref() {
                Ok("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}
