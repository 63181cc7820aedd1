use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;
use uuid::Uuid;

use crate::AppError;

/// Session key the login layer stores the signed-in user's id under.
pub const USER_ID: &str = "user_id";

/// The authenticated user making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub Uuid);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::Unauthenticated)?;

        let Some(user_id) = session
            .get::<String>(USER_ID)
            .await
            .map_err(|e| AppError::Internal(e.into()))?
        else {
            return Err(AppError::Unauthenticated);
        };

        let user_id = Uuid::parse_str(&user_id).map_err(|_| AppError::Unauthenticated)?;
        Ok(Caller(user_id))
    }
}
