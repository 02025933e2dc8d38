use axum::http::{header, HeaderMap, HeaderValue};

pub const SESSION_ID_COOKIE: &str = "session_id";
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const CSRF_TOKEN_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// A cookie to set on a response. All auth cookies share `Path=/` and
/// `SameSite=Lax`; `Secure` is appended in production.
#[derive(Debug, Clone)]
pub struct Cookie {
    pub name: &'static str,
    pub value: String,
    pub http_only: bool,
}

impl Cookie {
    pub fn new(name: &'static str, value: impl Into<String>, http_only: bool) -> Self {
        Self {
            name,
            value: value.into(),
            http_only,
        }
    }

    fn render(&self, secure: bool) -> String {
        let mut s = format!("{}={}; Path=/; SameSite=Lax", self.name, self.value);
        if self.http_only {
            s.push_str("; HttpOnly");
        }
        if secure {
            s.push_str("; Secure");
        }
        s
    }
}

/// Append `Set-Cookie` headers for each cookie.
pub fn set_cookies(headers: &mut HeaderMap, cookies: &[Cookie], secure: bool) {
    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(&cookie.render(secure)) {
            headers.append(header::SET_COOKIE, value);
        }
    }
}

/// Append expired `Set-Cookie` headers, removing the named cookies.
pub fn clear_cookies(headers: &mut HeaderMap, names: &[&str]) {
    for name in names {
        let value = format!("{name}=; Path=/; Max-Age=0");
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.append(header::SET_COOKIE, value);
        }
    }
}

/// Read one cookie out of the request's `Cookie` header.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (k, v) = pair.trim().split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}
