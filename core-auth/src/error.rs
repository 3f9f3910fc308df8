use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// The credential is gone and could not be renewed; the host must
    /// re-authenticate interactively.
    #[error("Session expired: {0}")]
    AuthExpired(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Operation timed out: {operation}")]
    OperationTimeout { operation: String },

    #[error("Transport error: {0}")]
    Transport(BridgeError),

    #[error("{0}")]
    Other(String),
}

impl AuthError {
    /// Whether the failure requires interactive re-authentication
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, AuthError::AuthExpired(_) | AuthError::NotAuthenticated)
    }
}

impl From<AuthError> for BridgeError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::AuthExpired(message) => BridgeError::AuthExpired(message),
            AuthError::NotAuthenticated => {
                BridgeError::AuthExpired("No credential available".to_string())
            }
            AuthError::Transport(inner) => inner,
            other => BridgeError::OperationFailed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
