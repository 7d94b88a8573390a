use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub from: String,
}

pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub public_url: String,
    pub image_dir: PathBuf,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = var("SEAMS_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("SEAMS_JWT_SECRET is unset or still a placeholder");
        }

        let port: u16 = var("SEAMS_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("SEAMS_PORT must be a port number")?;

        let smtp = match var("SEAMS_SMTP_HOST") {
            Some(host) if !host.is_empty() => Some(SmtpConfig {
                host,
                user: var("SEAMS_SMTP_USER").unwrap_or_default(),
                password: var("SEAMS_SMTP_PASSWORD").unwrap_or_default(),
                from: var("SEAMS_SMTP_FROM").context("SEAMS_SMTP_FROM is required with SEAMS_SMTP_HOST")?,
            }),
            _ => None,
        };

        Ok(Self {
            jwt_secret,
            db_path: var("SEAMS_DB_PATH").unwrap_or_else(|| "seams.db".into()).into(),
            host: var("SEAMS_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            public_url: var("SEAMS_PUBLIC_URL").unwrap_or_else(|| format!("http://localhost:{port}")),
            image_dir: var("SEAMS_IMAGE_DIR").unwrap_or_else(|| "./images".into()).into(),
            smtp,
        })
    }
}
