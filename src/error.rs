use thiserror::Error;

#[derive(Error, Debug)]
pub enum MinesetError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Unknown block `{block}` in action `{action}`")]
    UnknownBlock { action: String, block: String },
    #[error("Unknown function `{function}` in action `{action}`")]
    UnknownFunction { action: String, function: String },
    #[error("Collaborator error: {0}")]
    Collaborator(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MinesetError>;

// Helper conversions
impl From<config::ConfigError> for MinesetError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl From<regex::Error> for MinesetError {
    fn from(e: regex::Error) -> Self { Self::Config(e.to_string()) }
}
