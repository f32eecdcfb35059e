#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("connectivity check failed: {0}")]
    Connectivity(String),
    #[error("issue creation rejected (status {status}): {body}")]
    IssueRejected { status: u16, body: String },
    #[error("mailbox error: {0}")]
    Mailbox(String),
}
