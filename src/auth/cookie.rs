// Session Cookie Transport
// Binds the session credential to an HttpOnly cookie and reads it back

use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::Response;

use super::config::CookieConfig;
use super::error::AuthError;
use super::session::session_validity;

#[derive(Debug, Clone)]
pub struct SessionCookie {
    name: String,
    domain: Option<String>,
    path: String,
    secure: bool,
    max_age: i64,
}

impl SessionCookie {
    pub fn new(config: &CookieConfig) -> Self {
        Self {
            name: config.name.clone(),
            domain: config.domain.clone(),
            path: config.path.clone(),
            secure: config.secure,
            max_age: session_validity().num_seconds(),
        }
    }

    fn header_value(&self, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; Path={}; HttpOnly; SameSite=Lax; Max-Age={}",
            self.name, value, self.path, max_age
        );

        if let Some(domain) = &self.domain {
            cookie.push_str("; Domain=");
            cookie.push_str(domain);
        }

        if self.secure {
            cookie.push_str("; Secure");
        }

        cookie
    }

    /// `Set-Cookie` value carrying the credential for the full session window
    pub fn set_cookie(&self, credential: &str) -> Result<HeaderValue, AuthError> {
        HeaderValue::from_str(&self.header_value(credential, self.max_age))
            .map_err(|e| AuthError::Internal(format!("Invalid session cookie value: {}", e)))
    }

    /// `Set-Cookie` value that makes the browser drop the session cookie.
    /// Path and domain must match the original cookie.
    pub fn clear_cookie(&self) -> Result<HeaderValue, AuthError> {
        HeaderValue::from_str(&self.header_value("", 0))
            .map_err(|e| AuthError::Internal(format!("Invalid session cookie value: {}", e)))
    }

    pub fn attach(&self, response: &mut Response, credential: &str) -> Result<(), AuthError> {
        let value = self.set_cookie(credential)?;
        response.headers_mut().append(header::SET_COOKIE, value);
        Ok(())
    }

    pub fn clear(&self, response: &mut Response) -> Result<(), AuthError> {
        let value = self.clear_cookie()?;
        response.headers_mut().append(header::SET_COOKIE, value);
        Ok(())
    }

    /// Read the credential from the request's `Cookie` headers.
    /// An empty value (a cleared cookie) counts as absent.
    pub fn extract(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|cookies| cookies.split(';'))
            .find_map(|cookie| {
                let (name, value) = cookie.trim().split_once('=')?;
                if name == self.name && !value.is_empty() {
                    Some(value.to_string())
                } else {
                    None
                }
            })
    }
}
