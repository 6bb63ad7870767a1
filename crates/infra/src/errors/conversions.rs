//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use reqwest::StatusCode;
use solrfeed_domain::FeedError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub FeedError);

impl From<InfraError> for FeedError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<FeedError> for InfraError {
    fn from(value: FeedError) -> Self {
        Self(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoFeedError {
    fn into_feed_error(self) -> FeedError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → FeedError */
/* -------------------------------------------------------------------------- */

impl IntoFeedError for HttpError {
    fn into_feed_error(self) -> FeedError {
        if self.is_timeout() {
            return FeedError::Timeout(format!("HTTP request timed out: {self}"));
        }

        if self.is_connect() {
            return FeedError::Network(format!("HTTP connection failure: {self}"));
        }

        if self.is_decode() {
            return FeedError::Decode(format!("failed to read response body: {self}"));
        }

        if self.is_builder() {
            return FeedError::Config(format!("invalid HTTP request: {self}"));
        }

        if let Some(status) = self.status() {
            return status_error(status, "");
        }

        FeedError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        Self(value.into_feed_error())
    }
}

/// Map a non-success HTTP status (plus whatever body came with it) into the
/// error taxonomy.
pub fn status_error(status: StatusCode, body: &str) -> FeedError {
    let code = status.as_u16();
    let reason = status.canonical_reason().unwrap_or("unknown status");
    let detail = body.trim();
    let message = if detail.is_empty() {
        format!("HTTP {code} {reason}")
    } else {
        format!("HTTP {code} {reason}: {}", truncate(detail, 512))
    };

    match code {
        401 | 403 => FeedError::Auth(message),
        408 => FeedError::Timeout(message),
        429 | 500..=599 => FeedError::Server { status: code, message },
        400..=499 => FeedError::Client { status: code, message },
        _ => FeedError::Server { status: code, message },
    }
}

fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
