use std::env;
use std::path::PathBuf;

/// Root directory for users, teams and dataset snapshots.
pub fn data_dir() -> PathBuf {
    env::var("CSVHUB_DATA_DIR")
        .unwrap_or_else(|_| "database".to_string())
        .into()
}

/// Address the web server binds to.
pub fn bind_addr() -> String {
    env::var("CSVHUB_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string())
}

/// Public base URL used when building invitation links.
pub fn base_url() -> String {
    env::var("CSVHUB_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

/// SMTP settings for outgoing mail. `None` when no SMTP host is configured,
/// in which case mail-dependent features report an error instead of sending.
#[cfg(feature = "web")]
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[cfg(feature = "web")]
impl SmtpConfig {
    pub fn from_env() -> Option<Self> {
        let host = env::var("SMTP_HOST").ok()?;
        let username = env::var("SMTP_USER").unwrap_or_default();
        Some(SmtpConfig {
            port: env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(465),
            password: env::var("SMTP_PASS").unwrap_or_default(),
            from: env::var("SMTP_FROM").unwrap_or_else(|_| format!("csvhub <{}>", username)),
            username,
            host,
        })
    }
}
