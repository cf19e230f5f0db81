//! Explicit session context. The auth gateway in front of the API puts the
//! signed-in profile id in `x-profile-id`; handlers take it as an extractor
//! instead of reading any ambient "current user".

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::story::StoryRow;

pub const PROFILE_HEADER: &str = "x-profile-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    pub profile_id: Uuid,
}

impl SessionContext {
    /// Fails with `Forbidden` unless the story belongs to this profile.
    pub fn ensure_owner(&self, story: &StoryRow) -> Result<(), AppError> {
        if story.profile_id == self.profile_id {
            Ok(())
        } else {
            tracing::warn!(
                profile_id = %self.profile_id,
                story_id = %story.id,
                "Rejected access to another profile's story"
            );
            Err(AppError::Forbidden)
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for SessionContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let profile_id = parts
            .headers
            .get(PROFILE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or(AppError::Unauthorized)?;
        Ok(SessionContext { profile_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<SessionContext, AppError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(PROFILE_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        SessionContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_reads_profile_header() {
        let id = Uuid::new_v4();
        let session = extract(Some(&id.to_string())).await.unwrap();
        assert_eq!(session.profile_id, id);
    }

    #[tokio::test]
    async fn test_missing_or_malformed_header_is_unauthorized() {
        assert!(matches!(extract(None).await, Err(AppError::Unauthorized)));
        assert!(matches!(
            extract(Some("not-a-uuid")).await,
            Err(AppError::Unauthorized)
        ));
    }
}
