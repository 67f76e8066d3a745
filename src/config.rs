use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub session_expiry_hours: i64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub request_timeout_secs: u64,
    pub static_dir: String,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_host: env_or("SERVER_HOST", "127.0.0.1"),
            server_port: parse_env("SERVER_PORT", "5000")?,
            database_url: env_or("DATABASE_URL", "sqlite://warbler.db"),
            session_expiry_hours: parse_env("SESSION_EXPIRY_HOURS", "24")?,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", "10")?,
            db_min_connections: parse_env("DB_MIN_CONNECTIONS", "1")?,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", "30")?,
            static_dir: env_or("STATIC_DIR", "./static"),
            secure_cookies: parse_env("SECURE_COOKIES", "false")?,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "127.0.0.1".to_string(),
            server_port: 5000,
            database_url: "sqlite://warbler.db".to_string(),
            session_expiry_hours: 24,
            db_max_connections: 10,
            db_min_connections: 1,
            request_timeout_secs: 30,
            static_dir: "./static".to_string(),
            secure_cookies: false,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_or(key, default)
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid {}: {}", key, e)))
}
