use anyhow::{bail, Result};
use std::env;

const DEV_JWT_SECRET: &str = "campus-gym-dev-secret-change-in-production";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub jwt_secret: String,
    /// Domain used to build e-mail addresses for accounts created from the
    /// institutional directory when none is known yet.
    pub institutional_email_domain: String,
    pub stats_reconcile_cron: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.to_string());
        let institutional_email_domain =
            env::var("INSTITUTIONAL_EMAIL_DOMAIN").unwrap_or_else(|_| "campus.edu".to_string());
        let stats_reconcile_cron =
            env::var("STATS_RECONCILE_CRON").unwrap_or_else(|_| "0 0 3 * * *".to_string());

        let config = AppConfig {
            host,
            port,
            environment,
            log_level,
            jwt_secret,
            institutional_email_domain,
            stats_reconcile_cron,
        };
        config.validate()?;
        Ok(config)
    }

    /// Refuse obviously unsafe settings before anything binds a socket.
    pub fn validate(&self) -> Result<()> {
        if self.is_production() && self.jwt_secret == DEV_JWT_SECRET {
            bail!("JWT_SECRET must be set when ENVIRONMENT=production");
        }
        if self.jwt_secret.len() < 16 {
            bail!("JWT_SECRET must be at least 16 characters");
        }
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(environment: &str, secret: &str) -> AppConfig {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            environment: environment.to_string(),
            log_level: "debug".to_string(),
            jwt_secret: secret.to_string(),
            institutional_email_domain: "campus.edu".to_string(),
            stats_reconcile_cron: "0 0 3 * * *".to_string(),
        }
    }

    #[test]
    fn production_rejects_default_secret() {
        assert!(config("production", DEV_JWT_SECRET).validate().is_err());
        assert!(config("development", DEV_JWT_SECRET).validate().is_ok());
        assert!(config("production", "a-real-secret-of-some-length").validate().is_ok());
    }

    #[test]
    fn short_secret_is_rejected() {
        assert!(config("development", "short").validate().is_err());
    }

    #[test]
    fn server_address_joins_host_and_port() {
        assert_eq!(config("development", DEV_JWT_SECRET).server_address(), "127.0.0.1:8080");
    }
}
