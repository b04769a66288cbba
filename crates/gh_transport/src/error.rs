use std::fmt;

use http::StatusCode;

#[derive(Debug, Clone)]
pub struct HttpStatusError {
    pub status: StatusCode,
    pub endpoint: String,
}

impl HttpStatusError {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            endpoint: String::new(),
        }
    }

    pub fn with_endpoint(status: StatusCode, endpoint: impl Into<String>) -> Self {
        Self {
            status,
            endpoint: endpoint.into(),
        }
    }

    /// Rate limiting and server-side failures; everything else is the caller's fault.
    pub fn is_transient(&self) -> bool {
        is_transient_status(self.status)
    }
}

pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

impl fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.endpoint.is_empty() {
            write!(f, "unexpected status {}", self.status)
        } else {
            write!(f, "unexpected status {} for {}", self.status, self.endpoint)
        }
    }
}

impl std::error::Error for HttpStatusError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transient_statuses() {
        assert!(HttpStatusError::new(StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(HttpStatusError::new(StatusCode::BAD_GATEWAY).is_transient());
        assert!(!HttpStatusError::new(StatusCode::NOT_FOUND).is_transient());
        assert!(!HttpStatusError::new(StatusCode::FORBIDDEN).is_transient());
    }

    #[test]
    fn display_names_endpoint() {
        let err = HttpStatusError::with_endpoint(StatusCode::NOT_FOUND, "repos/o/r");
        assert_eq!(err.to_string(), "unexpected status 404 Not Found for repos/o/r");
    }
}
