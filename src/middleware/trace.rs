//! `TraceLayer` span maker that keeps credentials out of logged URIs.

use axum::http::{Request, Uri};
use tower_http::trace::MakeSpan;
use tracing::Span;

/// Query parameters whose values are replaced before logging
const SENSITIVE_PARAMS: &[&str] = &["access_token", "token", "id_token", "password"];

const REDACTED: &str = "[REDACTED]";

#[derive(Clone, Debug, Default)]
pub struct SanitizedMakeSpan;

impl<B> MakeSpan<B> for SanitizedMakeSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        tracing::info_span!(
            "http",
            method = %request.method(),
            uri = %sanitize_uri(request.uri()),
            version = ?request.version(),
        )
    }
}

fn is_sensitive(key: &str) -> bool {
    SENSITIVE_PARAMS.iter().any(|s| key.eq_ignore_ascii_case(s))
}

/// Path plus query with sensitive values redacted
pub(crate) fn sanitize_uri(uri: &Uri) -> String {
    let Some(query) = uri.query() else {
        return uri.path().to_string();
    };

    let pairs: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_sensitive(key) => format!("{key}={REDACTED}"),
            _ => pair.to_string(),
        })
        .collect();

    format!("{}?{}", uri.path(), pairs.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_without_query() {
        let uri: Uri = "/api/v1/ports/3".parse().unwrap();
        assert_eq!(sanitize_uri(&uri), "/api/v1/ports/3");
    }

    #[test]
    fn test_plain_query_untouched() {
        let uri: Uri = "/api/v1/berths?portId=3&page=2".parse().unwrap();
        assert_eq!(sanitize_uri(&uri), "/api/v1/berths?portId=3&page=2");
    }

    #[test]
    fn test_tokens_redacted() {
        let uri: Uri = "/api/v1/events?portId=3&access_token=eyJhbG.secret.sig&Token=x"
            .parse()
            .unwrap();
        assert_eq!(
            sanitize_uri(&uri),
            "/api/v1/events?portId=3&access_token=[REDACTED]&Token=[REDACTED]"
        );
    }

    #[test]
    fn test_password_redacted() {
        let uri: Uri = "/login?user=a&password=hunter2".parse().unwrap();
        assert_eq!(sanitize_uri(&uri), "/login?user=a&password=[REDACTED]");
    }
}
