//! HTTP Basic credential extraction and role gating for protected routes.

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};

use crate::error::DomainError;
use crate::security::AuthenticatedUser;

use super::AppState;

pub const ACCESS_DENIED_ERRORMSG: &str = "Access Denied!";
pub const MISSING_CREDENTIALS_ERRORMSG: &str = "Authentication required";

#[derive(Debug)]
pub struct BasicCredentials {
    pub email: String,
    pub password: SecretString,
}

/// Decode the `Authorization: Basic` header.
///
/// # Errors
/// `Unauthorized` when the header is missing or malformed.
pub fn basic_credentials(headers: &HeaderMap) -> Result<BasicCredentials, DomainError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| DomainError::Unauthorized(MISSING_CREDENTIALS_ERRORMSG.to_string()))?;

    let (scheme, encoded) = header
        .split_once(' ')
        .ok_or_else(|| DomainError::Unauthorized(MISSING_CREDENTIALS_ERRORMSG.to_string()))?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(DomainError::Unauthorized(
            MISSING_CREDENTIALS_ERRORMSG.to_string(),
        ));
    }

    let decoded = BASE64
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| DomainError::Unauthorized(MISSING_CREDENTIALS_ERRORMSG.to_string()))?;
    let (email, password) = decoded
        .split_once(':')
        .ok_or_else(|| DomainError::Unauthorized(MISSING_CREDENTIALS_ERRORMSG.to_string()))?;

    Ok(BasicCredentials {
        email: email.to_string(),
        password: SecretString::from(password),
    })
}

/// Authenticate the request and require one of `allowed_roles` (any
/// authenticated user when the slice is empty). A role miss is audited as
/// ACCESS_DENIED before the 403 goes out.
///
/// # Errors
/// `Unauthorized` from the gate, `Forbidden` on a role miss.
pub async fn require_role(
    state: &AppState,
    headers: &HeaderMap,
    path: &str,
    allowed_roles: &[&str],
) -> Result<AuthenticatedUser, DomainError> {
    let credentials = basic_credentials(headers)?;
    let authenticated = state
        .gate
        .authenticate(
            &credentials.email,
            credentials.password.expose_secret(),
            path,
        )
        .await?;

    if !allowed_roles.is_empty()
        && !allowed_roles.iter().any(|role| authenticated.has_role(role))
    {
        state
            .audit
            .access_denied(&authenticated.user.email, path)
            .await?;
        return Err(DomainError::Forbidden(ACCESS_DENIED_ERRORMSG.to_string()));
    }
    Ok(authenticated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn decodes_basic_credentials() {
        let encoded = BASE64.encode("john@acme.com:secret password");
        let headers = headers_with(&format!("Basic {encoded}"));

        let credentials = basic_credentials(&headers).unwrap();
        assert_eq!(credentials.email, "john@acme.com");
        assert_eq!(credentials.password.expose_secret(), "secret password");
    }

    #[test]
    fn scheme_is_case_insensitive() {
        let encoded = BASE64.encode("john@acme.com:pw");
        let headers = headers_with(&format!("basic {encoded}"));
        assert!(basic_credentials(&headers).is_ok());
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let err = basic_credentials(&HeaderMap::new()).unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }

    #[test]
    fn rejects_non_basic_and_bad_base64() {
        let headers = headers_with("Bearer token");
        assert!(basic_credentials(&headers).is_err());

        let headers = headers_with("Basic not-base64!!!");
        assert!(basic_credentials(&headers).is_err());
    }
}
