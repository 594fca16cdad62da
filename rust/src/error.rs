use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Transport(String),
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("malformed success response")]
    MalformedResponse,
}

impl GenerationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Transport(_) => "transport",
            Self::Api { .. } => "api",
            Self::MalformedResponse => "malformed_response",
        }
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("stored credential could not be decrypted: {0}")]
    Decryption(String),
    #[error("credential storage error: {0}")]
    Storage(String),
}
