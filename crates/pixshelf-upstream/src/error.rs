//! Upstream HTTP status classification.

use pixshelf_core::Error;

/// Upstream failure classes derived from an HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorCode {
    /// Artwork deleted or never existed.
    NotFound,
    /// Credential missing, expired, or lacking access.
    Unauthorized,
    /// Rate limit exceeded.
    RateLimited,
    /// Server error.
    ServerError,
    /// Any other non-success status.
    Unknown,
}

impl UpstreamErrorCode {
    /// Determine error code from HTTP status.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => Self::NotFound,
            401 | 403 => Self::Unauthorized,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::ServerError)
    }
}

/// Convert an upstream failure to a pixshelf Error.
///
/// `resource` names what was requested, e.g. `artwork pid 7`.
pub fn to_pixshelf_error(
    code: UpstreamErrorCode,
    resource: &str,
    status: u16,
    message: &str,
) -> Error {
    match code {
        UpstreamErrorCode::NotFound => Error::NotFound(resource.to_string()),
        UpstreamErrorCode::RateLimited => {
            Error::Transient(format!("rate limited fetching {}: {}", resource, message))
        }
        UpstreamErrorCode::ServerError => Error::Transient(format!(
            "server error {} fetching {}: {}",
            status, resource, message
        )),
        UpstreamErrorCode::Unauthorized | UpstreamErrorCode::Unknown => Error::UpstreamStatus {
            status,
            message: message.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_from_404() {
        assert_eq!(UpstreamErrorCode::from_status(404), UpstreamErrorCode::NotFound);
    }

    #[test]
    fn test_error_code_from_429() {
        assert_eq!(
            UpstreamErrorCode::from_status(429),
            UpstreamErrorCode::RateLimited
        );
    }

    #[test]
    fn test_error_code_from_5xx() {
        assert_eq!(
            UpstreamErrorCode::from_status(500),
            UpstreamErrorCode::ServerError
        );
        assert_eq!(
            UpstreamErrorCode::from_status(503),
            UpstreamErrorCode::ServerError
        );
    }

    #[test]
    fn test_error_code_from_unknown() {
        assert_eq!(UpstreamErrorCode::from_status(418), UpstreamErrorCode::Unknown);
        assert_eq!(
            UpstreamErrorCode::from_status(403),
            UpstreamErrorCode::Unauthorized
        );
    }

    #[test]
    fn test_retryable() {
        assert!(UpstreamErrorCode::RateLimited.is_retryable());
        assert!(UpstreamErrorCode::ServerError.is_retryable());
        assert!(!UpstreamErrorCode::NotFound.is_retryable());
        assert!(!UpstreamErrorCode::Unauthorized.is_retryable());
    }

    #[test]
    fn test_to_pixshelf_error_variants() {
        let err = to_pixshelf_error(UpstreamErrorCode::NotFound, "artwork pid 7", 404, "");
        assert!(matches!(err, Error::NotFound(ref r) if r == "artwork pid 7"));

        let err = to_pixshelf_error(
            UpstreamErrorCode::ServerError,
            "following of user 5",
            502,
            "bad gateway",
        );
        assert!(err.to_string().contains("following of user 5"));
        assert!(matches!(err, Error::Transient(_)));
        assert!(err.is_retryable());

        let err = to_pixshelf_error(
            UpstreamErrorCode::Unauthorized,
            "artwork pid 7",
            403,
            "forbidden",
        );
        assert!(matches!(err, Error::UpstreamStatus { status: 403, .. }));
        assert!(!err.is_retryable());
    }
}
