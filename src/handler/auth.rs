use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::instrument;

use crate::{
    AppState,
    dtos::{SignupDto, TokenRequestDto},
    error::HttpError,
    extract::Payload,
    services::signup,
};

/// Router for the signup / token exchange endpoints
pub fn auth_handler() -> Router<AppState> {
    Router::new()
        // POST /auth/signup - Mail a confirmation code to a (username, email) pair
        .route("/auth/signup", post(signup_handler))
        // POST /auth/token - Exchange username + confirmation code for a JWT
        .route("/auth/token", post(token_handler))
}

/// Register a user (or re-issue a code) and mail the confirmation code
///
/// Request body: { username, email }
/// Returns 200 with the submitted pair.
#[instrument(skip(app_state, body))]
pub async fn signup_handler(
    State(app_state): State<AppState>,
    body: Payload<SignupDto>,
) -> Result<impl IntoResponse, HttpError> {
    let response =
        signup::request_signup(app_state.db_client.as_ref(), app_state.mailer.as_ref(), body)
            .await?;

    tracing::info!("signup successful");
    Ok(Json(response))
}

/// Exchange a confirmation code for an access token
///
/// The token is returned in the body and also set as the `access_token`
/// cookie for browser clients.
#[instrument(skip(app_state, body, cookie_jar))]
pub async fn token_handler(
    State(app_state): State<AppState>,
    cookie_jar: CookieJar,
    body: Payload<TokenRequestDto>,
) -> Result<impl IntoResponse, HttpError> {
    let response = signup::obtain_token(app_state.db_client.as_ref(), &app_state.env, body).await?;

    let access_cookie = Cookie::build(("access_token", response.token.clone()))
        .path("/")
        .http_only(true)
        .secure(true)
        .max_age(time::Duration::seconds(app_state.env.jwt_maxage))
        .build();

    tracing::info!("token issued");
    Ok((cookie_jar.add(access_cookie), Json(response)))
}
