use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    AppState,
    error::{ErrorMessage, HttpError},
    models::User,
    utils::token,
};

/// Who is making the request, inserted into the request extensions by [`auth`]
///
/// `None` is an anonymous caller. Whether that is enough is decided per
/// resource by the permission rules, so handlers always get an `Actor`.
#[derive(Debug, Clone)]
pub struct Actor(pub Option<User>);

impl Actor {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

/// Resolve the request's actor from its access token.
///
/// The token is taken from the `access_token` cookie, then from an
/// `Authorization: Bearer <token>` header. No token at all means anonymous;
/// a token that does not decode, is expired, or names a user that no longer
/// exists is rejected with 401.
pub async fn auth(
    cookie_jar: CookieJar,
    State(app_state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, HttpError> {
    let token = cookie_jar
        .get("access_token")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| {
            req.headers()
                .get(header::AUTHORIZATION)
                .and_then(|auth_header| auth_header.to_str().ok())
                .and_then(|auth_value| auth_value.strip_prefix("Bearer "))
                .map(str::to_owned)
        });

    let Some(token) = token else {
        req.extensions_mut().insert(Actor(None));
        return Ok(next.run(req).await);
    };

    let subject = token::decode_token(token, app_state.env.jwt_secret.as_bytes())?;

    let user_id = uuid::Uuid::parse_str(&subject)
        .map_err(|_| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))?;

    let user = app_state
        .db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| {
            tracing::error!("DB error, resolving token user: {}", e);
            HttpError::server_error()
        })?
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::UserNoLongerExist.to_string()))?;

    tracing::debug!(username = %user.username, "request authenticated");
    req.extensions_mut().insert(Actor(Some(user)));

    Ok(next.run(req).await)
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Some(user) => write!(f, "{}", user.username),
            None => write!(f, "anonymous"),
        }
    }
}
