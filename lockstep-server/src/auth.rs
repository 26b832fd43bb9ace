use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, StatusCode},
};
use lockstep_core::Actor;

use crate::ServerContext;

/// The actor behind a request. Requests without an Authorization header are anonymous.
pub struct Session(pub Actor);

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        let context = ServerContext::from_ref(state);

        let Some(authorization) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(Self(Actor::anonymous()));
        };

        let authorization = authorization
            .to_str()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Authorization must be Bearer"))?;

        let parts: Vec<_> = authorization.split_ascii_whitespace().collect();

        let token = match parts.as_slice() {
            ["Bearer", token] => *token,
            _ => return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer")),
        };

        let actor = context
            .collab
            .actor_for_token(token)
            .await
            .map_err(|e| match e.is_not_found() {
                true => (StatusCode::UNAUTHORIZED, "Session does not exist"),
                false => (StatusCode::INTERNAL_SERVER_ERROR, "Session could not be resolved"),
            })?;

        Ok(Self(actor))
    }
}
