/// SMTP relay settings; all four variables must be set to enable delivery
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Access token lifetime in seconds
    pub jwt_maxage: i64,
    pub port: u16,
    pub frontend_url: String,
    pub smtp: Option<SmtpConfig>,
    pub default_from_email: String,
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        let jwt_maxage = std::env::var("JWT_MAXAGE").expect("JWT_MAXAGE must be set");
        let frontend_url = std::env::var("FRONTEND_URL").expect("FRONTEND_URL must be set");
        let port = std::env::var("PORT")
            .ok()
            .and_then(|port| port.parse::<u16>().ok())
            .unwrap_or(8000);
        let default_from_email = std::env::var("DEFAULT_FROM_EMAIL")
            .unwrap_or_else(|_| "noreply@yamdb.local".to_string());

        let smtp = match (
            std::env::var("SMTP_SERVER"),
            std::env::var("SMTP_PORT"),
            std::env::var("SMTP_USERNAME"),
            std::env::var("SMTP_PASSWORD"),
        ) {
            (Ok(server), Ok(port), Ok(username), Ok(password)) => Some(SmtpConfig {
                server,
                port: port.parse::<u16>().expect("SMTP_PORT must be a port number"),
                username,
                password,
            }),
            _ => None,
        };

        Config {
            database_url,
            jwt_secret,
            jwt_maxage: jwt_maxage
                .parse::<i64>()
                .expect("JWT_MAXAGE must be a number of seconds"),
            port,
            frontend_url,
            smtp,
            default_from_email,
        }
    }
}
