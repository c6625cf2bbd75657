//! Error taxonomy for parameter retrieval and injection.

use std::borrow::Cow;

/// Result type alias for library operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can abort a wrapper setup.
///
/// Store-facing variants carry the parameter path that was being read when
/// the failure happened so the build log can name it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Permission or credential failure.
    #[error("access denied reading '{path}': {message}")]
    Access { path: String, message: String },

    /// Invalid or unreachable region.
    #[error("region error reading '{path}': {message}")]
    Region { path: String, message: String },

    /// Rate limited and out of retries.
    #[error("throttled reading '{path}' after {attempts} attempts: {message}")]
    Throttling {
        path: String,
        attempts: u32,
        message: String,
    },

    /// Malformed path, naming strategy or name prefixes.
    #[error("configuration error: {0}")]
    Configuration(Cow<'static, str>),

    /// Any other service failure.
    #[error("parameter store error reading '{path}': {message}")]
    Store { path: String, message: String },

    /// The enclosing build was aborted mid-fetch.
    #[error("fetch of '{path}' cancelled")]
    Cancelled { path: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn configuration(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Configuration(message.into())
    }

    /// Short, stable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Access { .. } => "AccessError",
            Error::Region { .. } => "RegionError",
            Error::Throttling { .. } => "ThrottlingError",
            Error::Configuration(_) => "ConfigurationError",
            Error::Store { .. } => "StoreError",
            Error::Cancelled { .. } => "Cancelled",
            Error::Io(_) => "IoError",
        }
    }

    /// The parameter path involved, when there is one.
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::Access { path, .. }
            | Error::Region { path, .. }
            | Error::Throttling { path, .. }
            | Error::Store { path, .. }
            | Error::Cancelled { path } => Some(path),
            Error::Configuration(_) | Error::Io(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_names_path_and_kind() {
        let err = Error::Throttling {
            path: "/service/db".to_string(),
            attempts: 5,
            message: "Rate exceeded".to_string(),
        };
        assert_eq!(err.kind(), "ThrottlingError");
        assert_eq!(err.path(), Some("/service/db"));
        assert!(err.to_string().contains("/service/db"));
        assert!(err.to_string().contains("5 attempts"));
    }

    #[test]
    fn test_configuration_has_no_path() {
        let err = Error::configuration("bad naming");
        assert_eq!(err.kind(), "ConfigurationError");
        assert!(err.path().is_none());
    }
}
