use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The session credential was rejected and could not be renewed.
    #[error("Session expired: {0}")]
    AuthExpired(String),

    #[error("HTTP status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the host must force re-authentication.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, BridgeError::AuthExpired(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
