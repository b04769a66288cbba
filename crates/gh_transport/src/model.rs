use std::time::Duration;

use anyhow::Result;
use http::request::Parts;
use http::{header, HeaderMap, Method, Request};

#[derive(Debug, Clone)]
pub struct RetryAdvice {
    pub wait: Duration,
    pub reason: &'static str,
}

/// Reads `Retry-After` as either delta-seconds or an HTTP date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<RetryAdvice> {
    let value = headers.get(header::RETRY_AFTER)?.to_str().ok()?;
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(RetryAdvice {
            wait: Duration::from_secs(seconds),
            reason: "retry_after",
        });
    }
    let date = httpdate::parse_http_date(value).ok()?;
    let wait = date.duration_since(std::time::SystemTime::now()).ok()?;
    Some(RetryAdvice {
        wait,
        reason: "retry_after_date",
    })
}

/// GET/HEAD, plus GraphQL POSTs which only carry read queries here.
pub fn is_idempotent(parts: &Parts) -> bool {
    if parts.method == Method::GET || parts.method == Method::HEAD {
        return true;
    }
    parts.method == Method::POST && parts.uri.path().trim_end_matches('/').ends_with("/graphql")
}

/// Builds a fresh request from the buffered head and body.
pub fn rebuild_request(parts: &Parts, body: &[u8]) -> Result<Request<Vec<u8>>> {
    let mut builder = Request::builder()
        .method(parts.method.clone())
        .uri(parts.uri.clone())
        .version(parts.version);
    for (name, value) in parts.headers.iter() {
        builder = builder.header(name, value);
    }
    Ok(builder.body(body.to_vec())?)
}

/// Endpoint label used in errors and logs: the path without the leading slash.
pub fn endpoint_label(parts: &Parts) -> String {
    parts.uri.path().trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn parts(method: Method, uri: &str) -> Parts {
        let (parts, _) = Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(header::RETRY_AFTER, HeaderValue::from_static("7"));
        let advice = parse_retry_after(&headers).unwrap();
        assert_eq!(advice.wait, Duration::from_secs(7));
        assert_eq!(advice.reason, "retry_after");
    }

    #[test]
    fn retry_after_garbage_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::RETRY_AFTER, HeaderValue::from_static("soon"));
        assert!(parse_retry_after(&headers).is_none());
    }

    #[test]
    fn only_reads_are_idempotent() {
        assert!(is_idempotent(&parts(Method::GET, "https://api.github.com/repos/o/r")));
        assert!(is_idempotent(&parts(Method::POST, "https://api.github.com/graphql")));
        assert!(!is_idempotent(&parts(Method::POST, "https://api.github.com/repos/o/r/issues")));
        assert!(!is_idempotent(&parts(Method::DELETE, "https://api.github.com/repos/o/r")));
    }

    #[test]
    fn rebuild_keeps_body_and_headers() {
        let original = Request::builder()
            .method(Method::POST)
            .uri("https://api.github.com/graphql")
            .header(header::USER_AGENT, "ua")
            .body(b"{\"query\":\"q\"}".to_vec())
            .unwrap();
        let (head, body) = original.into_parts();
        let rebuilt = rebuild_request(&head, &body).unwrap();
        assert_eq!(rebuilt.body(), &body);
        assert_eq!(rebuilt.headers().get(header::USER_AGENT).unwrap(), "ua");
        assert_eq!(rebuilt.method(), Method::POST);
    }
}
