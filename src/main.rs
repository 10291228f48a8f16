mod config;
mod db;
mod dtos;
mod error;
mod extract;
mod handler;
mod mail;
mod middleware;
mod models;
mod permissions;
mod routes;
mod services;
mod tracing_config;
mod utils;

use axum::http::{
    HeaderValue, Method,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use config::Config;
use db::{DBClient, Store};
use dotenv::dotenv;
use mail::{LogMailer, Mailer, SmtpMailer};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[derive(Clone)]
pub struct AppState {
    pub env: Arc<Config>,
    pub db_client: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
}

#[tokio::main]
async fn main() {
    let _guard = tracing_config::init_tracing();

    dotenv().ok();

    let config = Config::init();

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("Connection to the database is successful");
            pool
        }
        Err(err) => {
            tracing::error!("Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => match SmtpMailer::new(
            &smtp.server,
            smtp.port,
            &smtp.username,
            &smtp.password,
            &config.default_from_email,
        ) {
            Ok(mailer) => Arc::new(mailer),
            Err(err) => {
                tracing::error!("Invalid SMTP configuration: {}", err);
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("SMTP is not configured, confirmation codes will only be logged");
            Arc::new(LogMailer)
        }
    };

    let frontend_origin = match config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(err) => {
            tracing::error!("FRONTEND_URL is not a valid origin: {}", err);
            std::process::exit(1);
        }
    };

    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    let app_state = AppState {
        env: Arc::new(config.clone()),
        db_client: Arc::new(DBClient::new(pool)),
        mailer,
    };

    let app = routes::create_router(app_state).layer(cors);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind port {}: {}", config.port, err);
            std::process::exit(1);
        }
    };

    tracing::info!("Server is running on http://localhost:{}", config.port);

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", err);
    }
}
