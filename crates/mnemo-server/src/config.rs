use anyhow::{Result, bail};
use tracing::warn;

use mnemo_api::GithubOAuth;
use mnemo_crypto::keys::{derive_key, key_from_base64};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub jwt_secret: String,
    pub encryption_key: [u8; 32],
    pub public_url: String,
    pub secure_cookies: bool,
    pub github: Option<GithubOAuth>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("MNEMO_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("MNEMO_JWT_SECRET is unset or still a placeholder");
        }

        let encryption_key = match std::env::var("MNEMO_ENCRYPTION_KEY") {
            Ok(encoded) if !encoded.trim().is_empty() => key_from_base64(&encoded)?,
            _ => {
                warn!("MNEMO_ENCRYPTION_KEY not set; deriving token encryption key from MNEMO_JWT_SECRET");
                derive_key(&jwt_secret)
            }
        };

        let github = match (
            std::env::var("MNEMO_GITHUB_CLIENT_ID"),
            std::env::var("MNEMO_GITHUB_CLIENT_SECRET"),
        ) {
            (Ok(id), Ok(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some(GithubOAuth::new(id, secret))
            }
            _ => {
                warn!("GitHub sign-in disabled (MNEMO_GITHUB_CLIENT_ID / MNEMO_GITHUB_CLIENT_SECRET unset)");
                None
            }
        };

        Ok(Self {
            host: std::env::var("MNEMO_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("MNEMO_PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()?,
            db_path: std::env::var("MNEMO_DB_PATH").unwrap_or_else(|_| "mnemo.db".into()),
            jwt_secret,
            encryption_key,
            public_url: std::env::var("MNEMO_PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            secure_cookies: std::env::var("MNEMO_SECURE_COOKIES")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            github,
        })
    }
}
