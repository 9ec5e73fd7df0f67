//! Error types for the `domain` layer.
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure with
/// `domain::error::Error` as the root type holding a tree of `error_kind` enums
/// that represent the kinds of errors that can occur in the domain layer or in
/// the backend it talks to. The `source` field holds the original error. The
/// `web` layer uses the `error_kind`s to pick HTTP status codes and bodies.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    /// No valid bearer credential could be produced for the caller.
    Unauthenticated,
    /// The caller supplied input that cannot be forwarded.
    Invalid,
    Config,
    Other(String),
}

/// Enum representing the various kinds of errors caused by the backend.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    /// Transport-level failure talking to the backend.
    Network,
    /// The backend answered, but not with a success status.
    Upstream { status: u16, body: Option<String> },
    Other(String),
}

impl Error {
    pub fn unauthenticated() -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Unauthenticated),
        }
    }

    pub fn upstream(status: u16, body: Option<String>) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::External(ExternalErrorKind::Upstream { status, body }),
        }
    }

    pub fn invalid() -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Invalid),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(message.into())),
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        self.error_kind == DomainErrorKind::Internal(InternalErrorKind::Unauthenticated)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            DomainErrorKind::External(ExternalErrorKind::Upstream { status, .. }) => {
                write!(f, "Domain Error: upstream responded with status {status}")
            }
            kind => write!(f, "Domain Error: {kind:?}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Errors that result from issues building the reqwest::Client instance. This
        // type of error will occur prior to any network calls being made.
        if err.is_builder() {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::Internal(InternalErrorKind::Other(
                    "Failed to build reqwest request".to_string(),
                )),
            }
        // Errors that result from issues with the network call itself.
        } else {
            Error {
                source: Some(Box::new(err)),
                error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
            }
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::External(ExternalErrorKind::Other(
                "Malformed backend response".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_constructor() {
        let err = Error::unauthenticated();
        assert!(err.is_unauthenticated());
        assert!(err.source.is_none());
    }

    #[test]
    fn test_upstream_display_mentions_status() {
        let err = Error::upstream(503, Some("down".to_string()));
        assert_eq!(
            err.to_string(),
            "Domain Error: upstream responded with status 503"
        );
        assert!(!err.is_unauthenticated());
    }

    #[test]
    fn test_json_error_maps_to_external_other() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(
            err.error_kind,
            DomainErrorKind::External(ExternalErrorKind::Other(_))
        ));
        assert!(StdError::source(&err).is_some());
    }
}
