//! Caller identity read from request headers.
//!
//! Authentication happens upstream (gateway or identity provider); this service
//! only trusts the identity it is handed.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    dto::validation::{validate_label, validate_user_id},
    error::AppError,
};

/// Header carrying the authenticated user identifier.
pub const USER_ID_HEADER: &str = "x-user-id";
/// Optional header carrying the user's display label.
pub const USER_LABEL_HEADER: &str = "x-user-label";

/// Authenticated user on whose behalf a score is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    /// Captured at save time; defaults to `id` when the header is absent.
    pub label: String,
}

impl CurrentUser {
    /// Build an identity from raw header values.
    pub fn from_headers(id: Option<&str>, label: Option<&str>) -> Result<Self, AppError> {
        let id = id
            .map(str::trim)
            .ok_or_else(|| AppError::Unauthorized("missing user header `X-User-Id`".into()))?;
        validate_user_id(id).map_err(|err| AppError::Unauthorized(err.to_string()))?;

        let label = match label.map(str::trim).filter(|label| !label.is_empty()) {
            Some(label) => {
                validate_label(label).map_err(|err| AppError::BadRequest(err.to_string()))?;
                label.to_owned()
            }
            None => id.to_owned(),
        };

        Ok(Self {
            id: id.to_owned(),
            label,
        })
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
        };
        Self::from_headers(header(USER_ID_HEADER), header(USER_LABEL_HEADER))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> Result<CurrentUser, AppError> {
        let (mut parts, _) = request.into_parts();
        CurrentUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_id_and_label() {
        let request = Request::builder()
            .header("X-User-Id", "auth0|42")
            .header("X-User-Label", "ada@example.com")
            .body(())
            .unwrap();
        let user = extract(request).await.unwrap();
        assert_eq!(user.id, "auth0|42");
        assert_eq!(user.label, "ada@example.com");
    }

    #[tokio::test]
    async fn label_defaults_to_id() {
        let request = Request::builder()
            .header("X-User-Id", "u1")
            .body(())
            .unwrap();
        assert_eq!(extract(request).await.unwrap().label, "u1");
    }

    #[tokio::test]
    async fn missing_or_blank_id_is_unauthorized() {
        let request = Request::builder().body(()).unwrap();
        assert!(matches!(extract(request).await, Err(AppError::Unauthorized(_))));

        let request = Request::builder()
            .header("X-User-Id", "   ")
            .body(())
            .unwrap();
        assert!(matches!(extract(request).await, Err(AppError::Unauthorized(_))));
    }
}
