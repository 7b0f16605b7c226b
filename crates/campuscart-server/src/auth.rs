//! Acting-user extraction.
//!
//! Authentication itself happens upstream; the proxy forwards the verified
//! user id in [`USER_ID_HEADER`]. Every mutating handler takes an
//! [`ActingUser`] so the id is passed explicitly into the services.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

use crate::error::ServerError;

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser(pub Uuid);

impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok())
            .map(ActingUser)
            .ok_or(ServerError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<ActingUser, ServerError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        ActingUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_uuid_header() {
        let id = Uuid::new_v4();
        let user = extract(Some(&id.to_string())).await.unwrap();
        assert_eq!(user, ActingUser(id));
    }

    #[tokio::test]
    async fn missing_or_garbage_is_unauthorized() {
        assert!(matches!(extract(None).await, Err(ServerError::Unauthorized)));
        assert!(matches!(
            extract(Some("not-a-uuid")).await,
            Err(ServerError::Unauthorized)
        ));
    }
}
