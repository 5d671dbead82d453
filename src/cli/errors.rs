use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Path '{path}' does not exist.")]
    PathNotFound { path: String },

    #[error("Path must not be empty")]
    EmptyPath,
}
