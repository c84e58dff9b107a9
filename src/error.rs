use std::fmt;

use crate::dispatch::DispatchError;

#[derive(Debug)]
pub enum GatewayError {
    DispatchError(String),
    ConfigurationError(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::DispatchError(msg) => write!(f, "Dispatch error: {msg}"),
            GatewayError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for GatewayError {}

impl From<DispatchError> for GatewayError {
    fn from(error: DispatchError) -> Self {
        GatewayError::DispatchError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
