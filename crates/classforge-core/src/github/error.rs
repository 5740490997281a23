//! Remote API error classification.

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias for hosting-provider calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Longest response body kept in an error message.
const MAX_BODY_CHARS: usize = 512;

/// Failure of a single hosting-provider request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials were rejected or lack the needed scope.
    #[error("authentication failed for {path} (HTTP {status}): {message}")]
    Auth {
        path: String,
        status: u16,
        message: String,
    },

    /// The addressed resource does not exist (or is hidden from this token).
    #[error("not found: {path}")]
    NotFound { path: String },

    /// Primary or secondary (abuse) rate limit hit.
    #[error("rate limited on {path}")]
    RateLimited {
        path: String,
        retry_after: Option<u64>,
    },

    /// Connection, timeout or protocol failure before a status was received.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Gateway-level failure that usually clears on its own.
    #[error("service unavailable for {path} (HTTP {status})")]
    Unavailable { path: String, status: u16 },

    /// Any other non-success status.
    #[error("unexpected HTTP {status} from {path}: {body}")]
    UnexpectedStatus {
        path: String,
        status: u16,
        body: String,
    },

    /// Response body did not match the expected payload.
    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A request URL could not be built.
    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ApiError {
    /// Classify a non-success response.
    pub fn from_response(
        path: &str,
        status: StatusCode,
        ratelimit_remaining: Option<&str>,
        retry_after: Option<u64>,
        body: &str,
    ) -> Self {
        let path = path.to_string();
        let lowered = body.to_ascii_lowercase();
        let throttled = ratelimit_remaining.map(str::trim) == Some("0")
            || lowered.contains("rate limit")
            || lowered.contains("abuse");

        match status.as_u16() {
            429 => Self::RateLimited { path, retry_after },
            403 if throttled => Self::RateLimited { path, retry_after },
            401 | 403 => Self::Auth {
                path,
                status: status.as_u16(),
                message: truncate(body),
            },
            404 => Self::NotFound { path },
            502..=504 => Self::Unavailable {
                path,
                status: status.as_u16(),
            },
            code => Self::UnexpectedStatus {
                path,
                status: code,
                body: truncate(body),
            },
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. }
            | Self::Unavailable { status, .. }
            | Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            Self::RateLimited { .. } => Some(429),
            Self::Network(err) => err.status().map(|s| s.as_u16()),
            Self::Decode { .. } | Self::InvalidUrl(_) => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// GitHub reports "name already exists" as 422 Unprocessable Entity.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::UnexpectedStatus { status: 422, .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Unavailable { .. } | Self::RateLimited { .. }
        )
    }
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut short: String = trimmed.chars().take(MAX_BODY_CHARS).collect();
    short.push_str("...");
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_auth_failures() {
        let err = ApiError::from_response(
            "orgs/acme/repos",
            StatusCode::UNAUTHORIZED,
            None,
            None,
            "Bad credentials",
        );
        assert!(matches!(err, ApiError::Auth { status: 401, .. }));
    }

    #[test]
    fn forbidden_with_exhausted_quota_is_rate_limit() {
        let err = ApiError::from_response(
            "orgs/acme/repos",
            StatusCode::FORBIDDEN,
            Some("0"),
            Some(60),
            "API rate limit exceeded",
        );
        match err {
            ApiError::RateLimited { retry_after, .. } => assert_eq!(retry_after, Some(60)),
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[test]
    fn forbidden_abuse_message_is_rate_limit() {
        let err = ApiError::from_response(
            "orgs/acme/repos",
            StatusCode::FORBIDDEN,
            Some("4999"),
            None,
            "You have triggered an abuse detection mechanism.",
        );
        assert!(matches!(err, ApiError::RateLimited { .. }));
    }

    #[test]
    fn plain_forbidden_is_auth() {
        let err = ApiError::from_response(
            "teams/1",
            StatusCode::FORBIDDEN,
            Some("4999"),
            None,
            "Must have admin rights",
        );
        assert!(matches!(err, ApiError::Auth { status: 403, .. }));
    }

    #[test]
    fn gateway_errors_are_transient() {
        let err =
            ApiError::from_response("orgs/acme/teams", StatusCode::BAD_GATEWAY, None, None, "");
        assert!(err.is_transient());
        assert_eq!(err.status(), Some(502));
    }

    #[test]
    fn unprocessable_is_conflict() {
        let err = ApiError::from_response(
            "orgs/acme/repos",
            StatusCode::UNPROCESSABLE_ENTITY,
            None,
            None,
            r#"{"message":"Repository creation failed.","errors":[{"message":"name already exists on this account"}]}"#,
        );
        assert!(err.is_conflict());
        assert!(!err.is_transient());
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(2000);
        let err =
            ApiError::from_response("repos/acme/p1", StatusCode::IM_A_TEAPOT, None, None, &body);
        match err {
            ApiError::UnexpectedStatus { body, .. } => assert!(body.len() < 600),
            other => panic!("unexpected {other:?}"),
        }
    }
}
