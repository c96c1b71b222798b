use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// Resend API key. `None` switches to the console mailer and dev codes.
    pub api_key: Option<String>,
    pub api_url: String,
    pub from: String,
}

impl MailConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub mail: MailConfig,
    pub public_base_url: String,
    pub upload_dir: String,
    pub cors_allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL is required"))?;
        let mail = MailConfig {
            api_key: std::env::var("RESEND_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            api_url: std::env::var("RESEND_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com/emails".into()),
            from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "UserApp <onboarding@resend.dev>".into()),
        };
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080".into())
            .trim_end_matches('/')
            .to_string();
        let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into());
        let cors_allowed_origins = parse_origins(
            &std::env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:5173,http://localhost:3000".into()),
        );
        Ok(Self {
            database_url,
            mail,
            public_base_url,
            upload_dir,
            cors_allowed_origins,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('/').to_string())
        .collect()
}
