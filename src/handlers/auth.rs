//! HTTP basic authentication for the web interface.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

use crate::state::SharedState;

const REALM: &str = r#"Basic realm="metrics""#;

/// Rejects requests without matching credentials when web auth is configured.
pub async fn basic_auth(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    let Some((username, password)) = state.config.web_auth() else {
        return next.run(request).await;
    };

    if credentials_match(request.headers(), &username, &password) {
        return next.run(request).await;
    }

    debug!("Rejecting unauthenticated request to {}", request.uri().path());
    state.metrics.record_request("auth", 401);
    let mut response = (StatusCode::UNAUTHORIZED, "401 Unauthorized\n").into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(REALM));
    response
}

fn credentials_match(headers: &HeaderMap, username: &str, password: &str) -> bool {
    let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let Some(encoded) = value
        .strip_prefix("Basic ")
        .or_else(|| value.strip_prefix("basic "))
    else {
        return false;
    };
    let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
        return false;
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return false;
    };

    match decoded.split_once(':') {
        Some((user, pass)) => user == username && pass == password,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_credentials_match() {
        let encoded = STANDARD.encode("prom:s3cret");
        assert!(credentials_match(&headers(&format!("Basic {}", encoded)), "prom", "s3cret"));
        assert!(!credentials_match(&headers(&format!("Basic {}", encoded)), "prom", "other"));
    }

    #[test]
    fn test_password_may_contain_colons() {
        let encoded = STANDARD.encode("prom:a:b");
        assert!(credentials_match(&headers(&format!("Basic {}", encoded)), "prom", "a:b"));
    }

    #[test]
    fn test_malformed_headers_are_rejected() {
        assert!(!credentials_match(&HeaderMap::new(), "prom", "s3cret"));
        assert!(!credentials_match(&headers("Bearer abc"), "prom", "s3cret"));
        assert!(!credentials_match(&headers("Basic !!!"), "prom", "s3cret"));
        let no_colon = STANDARD.encode("proms3cret");
        assert!(!credentials_match(&headers(&format!("Basic {}", no_colon)), "prom", "s3cret"));
    }
}
