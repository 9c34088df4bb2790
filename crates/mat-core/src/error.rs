//! Error types for mat-core

/// Result type for mat-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in mat-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A generator module failed to produce its output
    #[error("Generator '{module}' failed: {message}")]
    Generator { module: String, message: String },

    /// Module dependencies could not be resolved
    #[error("Dependency resolution failed: {message}")]
    DependencyResolution { message: String },

    /// Invalid engine configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from mat-fs
    #[error(transparent)]
    Fs(#[from] mat_fs::Error),

    /// Merge error from mat-pragma
    #[error(transparent)]
    Pragma(#[from] mat_pragma::Error),
}

impl Error {
    pub fn generator(module: impl Into<String>, message: impl ToString) -> Self {
        Self::Generator {
            module: module.into(),
            message: message.to_string(),
        }
    }
}
