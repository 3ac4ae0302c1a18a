//! Process configuration.
//!
//! Read once at startup and passed explicitly to the components that need
//! it. Secrets come from environment variables first, then from Docker
//! secret files under `/run/secrets`.

use std::env;
use std::num::NonZeroU32;
use std::time::Duration;

use crate::error::{IngestError, Result};

const SECRETS_DIR: &str = "/run/secrets";

/// football-data.org settings.
#[derive(Clone, Debug)]
pub struct FootballDataConfig {
    pub base_url: String,
    pub api_key: String,
}

/// api-sports.io settings.
#[derive(Clone, Debug)]
pub struct ApiSportsConfig {
    pub base_url: String,
    pub host: String,
    pub api_key: String,
}

/// Generative-language API settings.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    football_data_key: Option<String>,
    pub football_data_base_url: String,
    api_sports_key: Option<String>,
    pub api_sports_base_url: String,
    pub api_sports_host: String,
    gemini_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    /// Fixed pause between batch items addressing the same provider.
    pub request_delay_seconds: u64,
    /// Per-client request ceiling enforced before every upstream call.
    pub requests_per_minute: NonZeroU32,
    pub http_timeout_seconds: u64,
    pub http_port: u16,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("football_data_base_url", &self.football_data_base_url)
            .field("football_data_key", &self.football_data_key.is_some())
            .field("api_sports_base_url", &self.api_sports_base_url)
            .field("api_sports_key", &self.api_sports_key.is_some())
            .field("gemini_model", &self.gemini_model)
            .field("gemini_key", &self.gemini_key.is_some())
            .field("request_delay_seconds", &self.request_delay_seconds)
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url = match non_empty_var("DATABASE_URL")? {
            Some(v) => v,
            None => {
                let db_user = env::var("DB_USER").unwrap_or_else(|_| "football".to_string());
                let db_name = env::var("DB_NAME").unwrap_or_else(|_| "football".to_string());
                let db_host = env::var("DB_HOST").unwrap_or_else(|_| "postgres".to_string());
                let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
                let db_password = read_secret_file("db_password")?.ok_or_else(|| {
                    IngestError::Config(
                        "DATABASE_URL is not set and no db_password secret is mounted".to_string(),
                    )
                })?;
                format!(
                    "postgresql://{}:{}@{}:{}/{}",
                    db_user, db_password, db_host, db_port, db_name
                )
            }
        };

        let football_data_key = secret("FOOTBALL_DATA_API_KEY", "football_data_api_key")?;
        let api_sports_key = secret("API_SPORTS_KEY", "api_sports_key")?;
        let gemini_key = secret("GEMINI_API_KEY", "gemini_api_key")?;

        let requests_per_minute = parse_var("REQUESTS_PER_MINUTE", 10u32)?;
        let requests_per_minute = NonZeroU32::new(requests_per_minute).ok_or_else(|| {
            IngestError::Config("REQUESTS_PER_MINUTE must be greater than zero".to_string())
        })?;

        Ok(Self {
            database_url,
            football_data_key,
            football_data_base_url: env::var("FOOTBALL_DATA_BASE_URL")
                .unwrap_or_else(|_| "https://api.football-data.org/v4".to_string()),
            api_sports_key,
            api_sports_base_url: env::var("API_SPORTS_BASE_URL")
                .unwrap_or_else(|_| "https://v3.football.api-sports.io".to_string()),
            api_sports_host: env::var("API_SPORTS_HOST")
                .unwrap_or_else(|_| "v3.football.api-sports.io".to_string()),
            gemini_key,
            gemini_base_url: env::var("GEMINI_BASE_URL").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.0-flash".to_string()),
            request_delay_seconds: parse_var("REQUEST_DELAY_SECONDS", 60)?,
            requests_per_minute,
            http_timeout_seconds: parse_var("HTTP_TIMEOUT_SECONDS", 30)?,
            http_port: parse_var("HTTP_PORT", 8080)?,
        })
    }

    pub fn football_data(&self) -> Result<FootballDataConfig> {
        let api_key = self.football_data_key.clone().ok_or_else(|| {
            IngestError::Config("FOOTBALL_DATA_API_KEY is required for this command".to_string())
        })?;
        Ok(FootballDataConfig {
            base_url: self.football_data_base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn api_sports(&self) -> Result<ApiSportsConfig> {
        let api_key = self.api_sports_key.clone().ok_or_else(|| {
            IngestError::Config("API_SPORTS_KEY is required for this command".to_string())
        })?;
        Ok(ApiSportsConfig {
            base_url: self.api_sports_base_url.trim_end_matches('/').to_string(),
            host: self.api_sports_host.clone(),
            api_key,
        })
    }

    pub fn gemini(&self) -> Result<GeminiConfig> {
        let api_key = self.gemini_key.clone().ok_or_else(|| {
            IngestError::Config("GEMINI_API_KEY is required for this command".to_string())
        })?;
        Ok(GeminiConfig {
            base_url: self.gemini_base_url.trim_end_matches('/').to_string(),
            model: self.gemini_model.clone(),
            api_key,
        })
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_secs(self.request_delay_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

fn non_empty_var(name: &str) -> Result<Option<String>> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(Some(v.trim().to_string())),
        Ok(_) => Err(IngestError::Config(format!("{} is set but empty", name))),
        Err(_) => Ok(None),
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map_err(|_| IngestError::Config(format!("{} has an invalid value: {}", name, v))),
        _ => Ok(default),
    }
}

/// API key from the environment, falling back to a mounted secret file.
fn secret(var: &str, secret_name: &str) -> Result<Option<String>> {
    let value = match non_empty_var(var)? {
        Some(v) => Some(v),
        None => read_secret_file(secret_name)?,
    };
    if let Some(key) = &value {
        reject_placeholder(var, key)?;
    }
    Ok(value)
}

/// Read a Docker secret. A missing file is not an error; an unreadable one is.
fn read_secret_file(secret_name: &str) -> Result<Option<String>> {
    let path = std::path::Path::new(SECRETS_DIR).join(secret_name);
    if !path.exists() {
        return Ok(None);
    }
    std::fs::read_to_string(&path)
        .map(|s| Some(s.trim().to_string()).filter(|s| !s.is_empty()))
        .map_err(|e| {
            IngestError::Config(format!(
                "Secret file {} could not be read: {}",
                path.display(),
                e
            ))
        })
}

fn reject_placeholder(var: &str, key: &str) -> Result<()> {
    let key_lower = key.trim().to_lowercase();
    if key_lower.contains("change_me")
        || key_lower.starts_with("your_")
        || key_lower.starts_with("sample")
    {
        return Err(IngestError::Config(format!(
            "{} appears to be a placeholder value; replace it with a real key",
            var
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_keys_are_rejected() {
        assert!(reject_placeholder("X", "CHANGE_ME").is_err());
        assert!(reject_placeholder("X", "your_api_key").is_err());
        assert!(reject_placeholder("X", "sample-key").is_err());
        assert!(reject_placeholder("X", "1a1b2536").is_ok());
    }

    #[test]
    fn provider_config_requires_key() {
        let config = Config {
            database_url: "postgresql://localhost/football".to_string(),
            football_data_key: None,
            football_data_base_url: "https://api.football-data.org/v4/".to_string(),
            api_sports_key: Some("abc".to_string()),
            api_sports_base_url: "https://v3.football.api-sports.io".to_string(),
            api_sports_host: "v3.football.api-sports.io".to_string(),
            gemini_key: None,
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gemini_model: "gemini-2.0-flash".to_string(),
            request_delay_seconds: 60,
            requests_per_minute: NonZeroU32::new(10).unwrap(),
            http_timeout_seconds: 30,
            http_port: 8080,
        };

        assert!(matches!(config.football_data(), Err(IngestError::Config(_))));
        assert!(matches!(config.gemini(), Err(IngestError::Config(_))));
        let api_sports = config.api_sports().unwrap();
        assert_eq!(api_sports.api_key, "abc");
        assert_eq!(config.request_delay(), Duration::from_secs(60));
    }
}
