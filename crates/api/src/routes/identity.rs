//! Owner identification from request headers.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use domain::OwnerRef;

use crate::error::ApiError;

/// Header carrying an authenticated user id.
pub const USER_HEADER: &str = "x-user-id";

/// Header carrying an anonymous browsing session id.
pub const GUEST_HEADER: &str = "x-guest-session";

/// The cart owner making the request.
///
/// An authenticated user wins over a guest session when both headers are sent.
#[derive(Debug, Clone)]
pub struct Owner(pub OwnerRef);

impl<S: Send + Sync> FromRequestParts<S> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let owner = user(&parts.headers)
            .or_else(|| guest(&parts.headers))
            .ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "Missing {USER_HEADER} or {GUEST_HEADER} header"
                ))
            })?;
        Ok(Owner(owner))
    }
}

/// The authenticated user, if the request names one.
pub fn user(headers: &HeaderMap) -> Option<OwnerRef> {
    header(headers, USER_HEADER).map(OwnerRef::User)
}

/// The guest session, if the request names one.
pub fn guest(headers: &HeaderMap) -> Option<OwnerRef> {
    header(headers, GUEST_HEADER).map(OwnerRef::Guest)
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_blank_headers_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_static("  "));
        headers.insert(GUEST_HEADER, HeaderValue::from_static("g-1"));

        assert_eq!(user(&headers), None);
        assert_eq!(guest(&headers), Some(OwnerRef::Guest("g-1".into())));
    }
}
