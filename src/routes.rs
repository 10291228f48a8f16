use axum::{Router, middleware};
use tower_http::trace::TraceLayer;

use crate::{
    AppState,
    handler::{
        auth::auth_handler, catalog::catalog_handler, comments::comment_handler,
        reviews::review_handler, users::users_handler,
    },
    middleware::auth,
};

pub fn create_router(app_state: AppState) -> Router {
    let api_route = Router::new()
        .merge(auth_handler())
        .merge(users_handler())
        .merge(catalog_handler())
        .merge(review_handler())
        .merge(comment_handler())
        // every route sees an Actor, anonymous when no token was sent
        .layer(middleware::from_fn_with_state(app_state.clone(), auth))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    Router::new().nest("/api/v1", api_route)
}
