//! Error types for deploy-platforms

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Front matter error: {0}")]
    FrontMatter(#[from] serde_yaml::Error),

    #[error("{platform} does not support {kind} components")]
    UnsupportedKind { platform: String, kind: String },

    #[error("Cannot render {path}: {message}")]
    Render { path: String, message: String },
}
