use hyper::{header::HeaderValue, HeaderMap};
use uuid::Uuid;

/// Extracts the session ID from a map of headers.
pub fn extract_session(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all("Cookie")
        .iter()
        .flat_map(|value| value.as_bytes().split(|&byte| byte == b';'))
        .filter_map(|section| {
            let mid = section.iter().copied().position(|byte| byte == b'=')?;
            let (left, right) = section.split_at(mid);
            Some((left.trim_ascii(), right[1..].trim_ascii()))
        })
        .find_map(|(key, session)| (key == b"sid").then_some(session))
        .and_then(|session| Uuid::try_parse_ascii(session).ok())
}

/// Cookie that binds the browser to a freshly opened session.
pub fn session_cookie(id: Uuid) -> HeaderValue {
    let cookie = format!("sid={}; Path=/; HttpOnly; SameSite=Strict", id.as_hyphenated());
    // Hyphenated UUIDs are plain ASCII.
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static("sid=; Path=/"))
}

/// Cookie that makes the browser forget its session.
pub fn expired_cookie() -> HeaderValue {
    HeaderValue::from_static("sid=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0")
}
