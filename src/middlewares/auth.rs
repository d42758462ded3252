use anyhow::anyhow;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::app_state::AppState;
use crate::error::{AppError, AppResult};
use crate::models::auth::{AuthUser, Claims};

/// Verifies an HS256 client credential. Shared by the HTTP middleware and
/// the WebSocket authenticate frame.
pub fn decode_token(secret: &str, token: &str) -> AppResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| AppError::Unauthorized(anyhow!("Invalid token: {}", e)))
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> AppResult<Response> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized(anyhow!("Missing bearer token")))?;

    let user = AuthUser::from(decode_token(&state.config.jwt_secret, token)?);
    state.users.ensure_user(&user).await?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
