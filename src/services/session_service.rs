use axum::http::{HeaderMap, header};

use crate::state::SharedState;

/// Cookie carrying the opaque session nonce.
pub const SESSION_COOKIE: &str = "amadeus_session";

/// Mint a session nonce for a freshly validated display name.
pub fn register(state: &SharedState, name: String) -> String {
    state.sessions().register(name.trim().to_string())
}

/// Extract the session nonce from a request's `Cookie` header.
pub fn session_from_headers(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == SESSION_COOKIE).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn finds_session_among_other_cookies() {
        let headers = headers_with_cookie("theme=dark; amadeus_session=abc-123; lang=en");
        assert_eq!(session_from_headers(&headers).as_deref(), Some("abc-123"));
    }

    #[test]
    fn missing_cookie_yields_none() {
        assert_eq!(session_from_headers(&HeaderMap::new()), None);
        let headers = headers_with_cookie("theme=dark");
        assert_eq!(session_from_headers(&headers), None);
    }
}
