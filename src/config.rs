//! Application configuration loaded from environment variables.
//!
//! `main` loads a `.env` file first, so every key below can live there during
//! local development. Only `DATABASE_URL` is mandatory.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

/// Runtime configuration shared by the HTTP layer and the reminder job.
#[derive(Clone)]
pub struct AppConfig {
    /// Env: `DATABASE_URL` (required)
    pub database_url: String,

    /// Env: `HTTP_ADDR`
    /// Default: `127.0.0.1:8000`
    pub http_addr: SocketAddr,

    /// Directory served read-only under `/api/uploads`.
    /// Env: `UPLOAD_DIR`
    /// Default: `./uploads`
    pub upload_dir: PathBuf,

    /// Env: `SMTP_HOST`, `SMTP_PORT`
    /// Default: `smtp.gmail.com:587`
    pub smtp_host: String,
    pub smtp_port: u16,

    /// Account used both as SMTP login and as the `From` address.
    /// Env: `SENDER_EMAIL`, `SENDER_EMAIL_KEY`
    pub sender_email: String,
    pub sender_password: String,

    /// Env: `SENDER_NAME`
    /// Default: `Roybarbershop`
    pub sender_name: String,

    /// UTC hour (0-23) at which the birthday scan runs.
    /// Env: `REMINDER_HOUR`
    /// Default: `8`
    pub reminder_hour: u32,

    /// Upper bound on users fetched per scan.
    /// Env: `REMINDER_USER_LIMIT`
    /// Default: `10000`
    pub reminder_user_limit: i64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("http_addr", &self.http_addr)
            .field("upload_dir", &self.upload_dir)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("sender_email", &self.sender_email)
            .field("sender_name", &self.sender_name)
            .field("reminder_hour", &self.reminder_hour)
            .field("reminder_user_limit", &self.reminder_user_limit)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    fn with_database_url(database_url: String) -> Self {
        Self {
            database_url,
            http_addr: ([127, 0, 0, 1], 8000).into(),
            upload_dir: PathBuf::from("./uploads"),
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            sender_email: String::new(),
            sender_password: String::new(),
            sender_name: "Roybarbershop".to_string(),
            reminder_hour: 8,
            reminder_user_limit: 10_000,
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let mut config = Self::with_database_url(database_url);
        config.apply(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => self.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(dir) = lookup("UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(dir);
        }

        if let Some(host) = lookup("SMTP_HOST") {
            self.smtp_host = host;
        }

        if let Some(port) = lookup("SMTP_PORT") {
            match port.parse() {
                Ok(parsed) => self.smtp_port = parsed,
                Err(_) => tracing::warn!(value = %port, "Invalid SMTP_PORT, using default"),
            }
        }

        if let Some(email) = lookup("SENDER_EMAIL") {
            self.sender_email = email;
        }

        if let Some(key) = lookup("SENDER_EMAIL_KEY") {
            self.sender_password = key;
        }

        if let Some(name) = lookup("SENDER_NAME") {
            self.sender_name = name;
        }

        if let Some(hour) = lookup("REMINDER_HOUR") {
            match hour.parse::<u32>() {
                Ok(parsed) if parsed < 24 => self.reminder_hour = parsed,
                _ => tracing::warn!(value = %hour, "Invalid REMINDER_HOUR, using default"),
            }
        }

        if let Some(limit) = lookup("REMINDER_USER_LIMIT") {
            match limit.parse::<i64>() {
                Ok(parsed) if parsed > 0 => self.reminder_user_limit = parsed,
                _ => tracing::warn!(value = %limit, "Invalid REMINDER_USER_LIMIT, using default"),
            }
        }
    }

    pub fn mail_enabled(&self) -> bool {
        !(self.sender_email.trim().is_empty() || self.sender_password.trim().is_empty())
    }
}
