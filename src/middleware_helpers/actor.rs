use crate::errors::ApiError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Header carrying the id of the authenticated staff member.
pub const ACTOR_HEADER: &str = "x-user-id";

/// Caller identity supplied by the upstream auth gateway.
///
/// Missing header means an anonymous caller; a present but malformed header
/// is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Option<Uuid>,
}

impl Actor {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(ACTOR_HEADER) else {
            return Ok(Actor::default());
        };

        let user_id = raw
            .to_str()
            .ok()
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .ok_or_else(|| ApiError::BadRequest(format!("{} must be a UUID", ACTOR_HEADER)))?;

        Ok(Actor::new(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<Actor, ApiError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(ACTOR_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn missing_header_is_anonymous() {
        assert_eq!(extract(None).await.unwrap(), Actor::default());
    }

    #[tokio::test]
    async fn valid_header_is_parsed() {
        let id = Uuid::new_v4();
        let actor = extract(Some(&id.to_string())).await.unwrap();
        assert_eq!(actor.user_id, Some(id));
    }

    #[tokio::test]
    async fn malformed_header_is_rejected() {
        assert!(matches!(
            extract(Some("cashier-1")).await,
            Err(ApiError::BadRequest(_))
        ));
    }
}
