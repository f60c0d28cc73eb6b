//! Request authentication.
//!
//! Protected handlers take an [`Authenticated`] argument. The extractor
//! accepts either an API key in the `X-API-Key` header or an access token
//! from `POST /login` in the `Authorization` header. The API key wins when
//! both are present. Either way the credential's rate limit is applied.
//!
//! ```text
//! X-API-Key: gek_3f9c...
//! Authorization: Bearer eyJhbGciOi...
//! ```

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::app_state::AppState;
use crate::error::EconomyError;
use crate::service::Caller;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

const BEARER_PREFIX: &str = "Bearer ";

/// The caller behind a request with a valid, in-budget credential.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Caller);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = EconomyError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let caller = if let Some(key) = header(parts, API_KEY_HEADER) {
            state.account_service.authenticate(key).await?
        } else if let Some(token) = header(parts, AUTHORIZATION.as_str()).and_then(bearer_token) {
            state.account_service.authenticate_bearer(token).await?
        } else {
            return Err(EconomyError::Unauthorized("missing credentials".to_string()));
        };
        tracing::debug!(user_id = %caller.user.id, credential = ?caller.credential, "authenticated");
        Ok(Self(caller))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|value| value.to_str().ok())
}

/// The token of an `Authorization: Bearer <token>` value.
fn bearer_token(value: &str) -> Option<&str> {
    let token = value
        .strip_prefix(BEARER_PREFIX)
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic dXNlcg=="), None);
    }
}
