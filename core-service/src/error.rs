use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    /// Terminal for the session; the host must sign in again
    #[error("Session expired: {0}")]
    AuthExpired(String),

    /// The page call failed; listed items are kept and `retry` reissues it
    #[error("Listing failed: {0}")]
    ListingFailed(BridgeError),

    #[error("Write failed: {0}")]
    WriteFailed(BridgeError),
}

impl CoreError {
    /// Listing error, unless the provider reported an ended session
    pub fn listing(error: BridgeError) -> Self {
        match error {
            BridgeError::AuthExpired(message) => CoreError::AuthExpired(message),
            other => CoreError::ListingFailed(other),
        }
    }

    /// Write error, unless the provider reported an ended session
    pub fn write(error: BridgeError) -> Self {
        match error {
            BridgeError::AuthExpired(message) => CoreError::AuthExpired(message),
            other => CoreError::WriteFailed(other),
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, CoreError::AuthExpired(_))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
