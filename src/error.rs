// ⚠️ Error types
//
// Only boundary operations fail. The parse/match/merge/query core recovers
// locally with documented defaults and never returns these.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FinderError>;

#[derive(Error, Debug)]
pub enum FinderError {
    #[error("Location is required to find schools")]
    MissingLocation,

    #[error("Search query is required to find schools")]
    MissingQuery,

    #[error("A topic is required to search the resource library")]
    MissingTopic,

    #[error("You can compare up to {limit} schools at a time")]
    CompareLimit { limit: usize },

    #[error("Search provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
