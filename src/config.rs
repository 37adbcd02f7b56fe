use anyhow::bail;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub secret: String,
    pub issuer: String,
    pub ttl_minutes: i64,
}

/// Client credentials of one federated identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthProviderConfig {
    pub id: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub session: SessionConfig,
    pub base_url: String,
    pub upload_dir: String,
    pub providers: Vec<OAuthProviderConfig>,
}

const PROVIDERS: [&str; 3] = ["google", "facebook", "instagram"];

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let session = SessionConfig {
            secret: std::env::var("AUTH_SECRET")?,
            issuer: std::env::var("AUTH_ISSUER").unwrap_or_else(|_| "kollab".into()),
            ttl_minutes: std::env::var("SESSION_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 30),
        };
        let base_url = std::env::var("APP_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into())
            .trim_end_matches('/')
            .to_string();
        let upload_dir = std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into());

        let mut providers = Vec::new();
        for id in PROVIDERS {
            let upper = id.to_ascii_uppercase();
            let client_id = std::env::var(format!("{upper}_CLIENT_ID")).ok();
            let client_secret = std::env::var(format!("{upper}_CLIENT_SECRET")).ok();
            match (client_id, client_secret) {
                (Some(client_id), Some(client_secret)) => providers.push(OAuthProviderConfig {
                    id: id.to_string(),
                    client_id,
                    client_secret,
                }),
                (None, None) => {}
                _ => bail!("{upper}_CLIENT_ID and {upper}_CLIENT_SECRET must be set together"),
            }
        }

        Ok(Self {
            database_url,
            session,
            base_url,
            upload_dir,
            providers,
        })
    }
}
