use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed signature at offset {offset}: {message}")]
    MalformedSignature { offset: usize, message: String },

    #[error("Malformed mask at offset {offset}: {message}")]
    MalformedMask { offset: usize, message: String },

    #[error("Read out of image bounds at offset {offset:#x}")]
    OutOfBounds { offset: u64 },

    #[error("Embedded pattern matched nothing: {0}")]
    UnresolvedEmbeddedPattern(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error was produced while compiling a signature or mask
    pub fn is_compile_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedSignature { .. } | Error::MalformedMask { .. }
        )
    }
}
