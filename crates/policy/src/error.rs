//! Policy error types.

use thiserror::Error;

/// Policy errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The user is not allowed to perform the action on the resource.
    #[error("unauthorized")]
    Unauthorized,

    /// A role name did not match any known role.
    #[error("unknown role: {0}")]
    UnknownRole(String),

    /// An action name did not match any known action.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The policy configuration is invalid.
    #[error("invalid policy: {0}")]
    Invalid(String),

    /// Failed to parse a policy file.
    #[error("failed to parse policy: {0}")]
    Parse(String),

    /// An I/O error occurred while reading policy.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
