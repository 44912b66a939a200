//! Configuration management for foliomail.
//!
//! Settings come from `foliomail.toml` in the data directory, with
//! environment variables overriding file values. Secrets (the IMAP password
//! and the Anthropic API key) are only ever read from the environment.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::repository::DbContext;

/// Default database filename inside the data directory.
pub const DEFAULT_DATABASE_FILENAME: &str = "foliomail.db";

/// Subdirectory of the data dir where attachment files are stored.
pub const ATTACHMENTS_SUBDIR: &str = "attachments";

/// Default lookback window for collection runs, in days.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;

/// Mailbox (IMAP) connection configuration.
///
/// The password is intentionally absent: it is read from `IMAP_PASSWORD`
/// at connection time and never serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// IMAP server hostname.
    #[serde(default = "default_imap_host")]
    pub host: String,
    /// IMAP server port (TLS).
    #[serde(default = "default_imap_port")]
    pub port: u16,
    /// Account username (overridden by IMAP_USERNAME).
    #[serde(default)]
    pub username: Option<String>,
    /// Folder to search.
    #[serde(default = "default_folder")]
    pub folder: String,
    /// Forwarder addresses whose mail is collected.
    #[serde(default)]
    pub forwarders: Vec<String>,
    /// Wall-clock bound for a whole mailbox fetch, in seconds.
    #[serde(default = "default_mailbox_timeout")]
    pub timeout_secs: u64,
}

fn default_imap_host() -> String {
    "imap.gmail.com".to_string()
}
fn default_imap_port() -> u16 {
    993
}
fn default_folder() -> String {
    "INBOX".to_string()
}
fn default_mailbox_timeout() -> u64 {
    60
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            host: default_imap_host(),
            port: default_imap_port(),
            username: None,
            folder: default_folder(),
            forwarders: Vec::new(),
            timeout_secs: default_mailbox_timeout(),
        }
    }
}

impl MailboxConfig {
    /// Resolve the username, preferring the IMAP_USERNAME environment variable.
    pub fn resolve_username(&self) -> Option<String> {
        std::env::var("IMAP_USERNAME")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| self.username.clone())
    }

    /// Read the account password from the environment.
    pub fn resolve_password(&self) -> Option<String> {
        std::env::var("IMAP_PASSWORD").ok().filter(|v| !v.is_empty())
    }
}

/// Application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename inside the data directory.
    pub database_filename: String,
    /// Mailbox connection settings.
    pub mailbox: MailboxConfig,
    /// LLM client settings.
    pub llm: LlmConfig,
    /// Default lookback window in days for collection runs.
    pub lookback_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/Documents/foliomail/ for user data
        // Falls back gracefully: Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("foliomail");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            mailbox: MailboxConfig::default(),
            llm: LlmConfig::default(),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Load settings, reading `foliomail.toml` from the data directory when
    /// present.
    ///
    /// `data_dir_override` (typically the `--data-dir` CLI flag) wins over
    /// both the config file and the built-in default.
    pub fn load(data_dir_override: Option<PathBuf>) -> anyhow::Result<Self> {
        let base = data_dir_override
            .clone()
            .unwrap_or_else(|| Settings::default().data_dir);

        let config_path = base.join("foliomail.toml");
        let mut settings = if config_path.exists() {
            let raw = fs::read_to_string(&config_path)?;
            toml::from_str(&raw).map_err(|e| {
                anyhow::anyhow!("invalid config {}: {}", config_path.display(), e)
            })?
        } else {
            Settings::default()
        };

        if let Some(dir) = data_dir_override {
            settings.data_dir = dir;
        }
        if let Ok(host) = std::env::var("IMAP_HOST") {
            if !host.is_empty() {
                settings.mailbox.host = host;
            }
        }

        Ok(settings)
    }

    /// Directory where attachment files are stored.
    pub fn attachments_dir(&self) -> PathBuf {
        self.data_dir.join(ATTACHMENTS_SUBDIR)
    }

    /// Path to the SQLite database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Database URL for the connection pool.
    pub fn database_url(&self) -> String {
        format!("sqlite:{}", self.database_path().display())
    }

    /// Create required directories.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })?;
        fs::create_dir_all(self.attachments_dir()).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create attachments directory '{}': {}",
                    self.attachments_dir().display(),
                    e
                ),
            )
        })?;
        Ok(())
    }

    /// Create a database context for the configured database.
    pub fn create_db_context(&self) -> DbContext {
        DbContext::new(&self.database_path())
    }

    /// Write the current settings to `foliomail.toml` if it does not exist.
    pub fn write_example_config(&self, path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            return Ok(());
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.database_filename, DEFAULT_DATABASE_FILENAME);
        assert_eq!(settings.lookback_days, DEFAULT_LOOKBACK_DAYS);
        assert!(settings.mailbox.forwarders.is_empty());
    }

    #[test]
    fn test_attachments_dir_under_data_dir() {
        let settings = Settings::with_data_dir(PathBuf::from("/tmp/fm"));
        assert_eq!(
            settings.attachments_dir(),
            PathBuf::from("/tmp/fm/attachments")
        );
        assert_eq!(settings.database_url(), "sqlite:/tmp/fm/foliomail.db");
    }

    #[test]
    fn test_config_roundtrip() {
        let raw = r#"
            lookback_days = 3

            [mailbox]
            host = "imap.example.com"
            forwarders = ["partner@fund.example"]
        "#;
        let settings: Settings = toml::from_str(raw).unwrap();
        assert_eq!(settings.lookback_days, 3);
        assert_eq!(settings.mailbox.host, "imap.example.com");
        assert_eq!(settings.mailbox.port, 993);
        assert_eq!(settings.mailbox.forwarders.len(), 1);
    }
}
