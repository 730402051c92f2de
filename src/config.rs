use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub mail: MailConfig,
}

/// Outbound mail settings. Passed into the notifier at construction time;
/// nothing reads these from the process environment at send time.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
    pub from_email: String,
    pub admin_email: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let mail = MailConfig::from_env();
        Ok(Self {
            port,
            database_url,
            host,
            mail,
        })
    }
}

impl MailConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: env::var("MAIL_API_URL").ok(),
            api_token: env::var("MAIL_API_TOKEN").ok(),
            from_email: env::var("MAIL_FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@pharmacy.example".to_string()),
            admin_email: env::var("ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@pharmacy.example".to_string()),
        }
    }
}
