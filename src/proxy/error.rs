//! Gateway-style request errors

use thiserror::Error;

/// Why a request never reached (or came back from) the backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    /// No route matched, or the route needs a signature and none was sent
    #[error("Missing Authentication Token")]
    MissingAuthenticationToken,

    #[error("Authorization header requires {0}")]
    IncompleteSignature(String),

    #[error("Missing required request parameters: [{}]", .0.join(", "))]
    MissingParameter(Vec<String>),

    #[error("Invalid request target: {0}")]
    InvalidRequest(String),

    /// The integration could not be rendered (misconfigured stack)
    #[error("Internal server error: {0}")]
    Integration(String),
}

impl ProxyError {
    pub fn status_code(&self) -> u16 {
        match self {
            ProxyError::MissingAuthenticationToken | ProxyError::IncompleteSignature(_) => 403,
            ProxyError::MissingParameter(_) | ProxyError::InvalidRequest(_) => 400,
            ProxyError::Integration(_) => 500,
        }
    }

    /// Value of the `x-amzn-ErrorType` header
    pub fn error_type(&self) -> &'static str {
        match self {
            ProxyError::MissingAuthenticationToken => "MissingAuthenticationTokenException",
            ProxyError::IncompleteSignature(_) => "IncompleteSignatureException",
            ProxyError::MissingParameter(_) | ProxyError::InvalidRequest(_) => "BadRequestException",
            ProxyError::Integration(_) => "InternalServerErrorException",
        }
    }
}
