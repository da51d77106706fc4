use thiserror::Error;


pub type AgentResult<T> = Result<T, AgentError>;


#[derive(Debug, Error)]
pub enum AgentError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("json failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("database connection error: {0}")]
    Connection(#[from] diesel::result::ConnectionError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote rejected the request: {0}")]
    Remote(String),

    #[error("invalid photo: {0}")]
    InvalidPhoto(String),

    #[error("configuration error: {0}")]
    Config(String),
}
