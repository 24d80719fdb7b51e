//! Error types for deploy-security

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Rule {rule} has an invalid pattern: {message}")]
    InvalidPattern { rule: String, message: String },

    #[error("Unknown violation category: {category}")]
    UnknownCategory { category: String },

    #[error("Duplicate rule id: {rule}")]
    DuplicateRule { rule: String },
}
