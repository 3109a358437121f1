use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Merge `.env` into the process environment, if the file exists.
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

/// Environment lookup scoped to a profile.
///
/// `{PROFILE}_{KEY}` shadows `{KEY}`; empty values count as unset.
struct ProfiledEnv {
    profile: String,
}

impl ProfiledEnv {
    fn new(profile: &str) -> Self {
        Self {
            profile: profile.to_uppercase(),
        }
    }

    fn raw(key: &str) -> Option<String> {
        env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    fn opt(&self, key: &str) -> Option<String> {
        if self.profile.is_empty() {
            return Self::raw(key);
        }
        Self::raw(&format!("{}_{key}", self.profile)).or_else(|| Self::raw(key))
    }

    fn or(&self, key: &str, default: &str) -> String {
        self.opt(key).unwrap_or_else(|| default.to_owned())
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.opt(key).and_then(|v| v.trim().parse().ok())
    }

    fn parsed_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.parsed(key).unwrap_or(default)
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.opt(key).map_or(default, |v| {
            matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
        })
    }

    /// Comma-separated values, blanks dropped.
    fn list(&self, key: &str) -> Vec<String> {
        self.opt(key)
            .map(|v| v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_owned).collect())
            .unwrap_or_default()
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub mailbox: MailboxConfig,
    pub poller: PollerConfig,
    pub storage: StorageConfig,
    pub ledger: LedgerConfig,
    pub notify: NotifyConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `LEADSYNC_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        Self::for_profile(&ProfiledEnv::raw("LEADSYNC_PROFILE").unwrap_or_default())
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let env = ProfiledEnv::new(profile);
        Self {
            server: ServerConfig::read(&env),
            mailbox: MailboxConfig::read(&env),
            poller: PollerConfig::read(&env),
            storage: StorageConfig::read(&env),
            ledger: LedgerConfig::read(&env),
            notify: NotifyConfig::read(&env),
            profile: env.profile,
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Check the settings the poller cannot run without.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut missing = Vec::new();
        if self.mailbox.host.is_empty() {
            missing.push("IMAP_HOST");
        }
        if self.mailbox.username.is_empty() {
            missing.push("EMAIL_USER");
        }
        if self.mailbox.password.is_empty() {
            missing.push("EMAIL_PASS");
        }
        if self.mailbox.sender.is_empty() {
            missing.push("SENDER_EMAIL");
        }
        if !missing.is_empty() {
            return Err(CoreError::Config(format!("missing {}", missing.join(", "))));
        }
        if self.ledger.capacity == 0 {
            return Err(CoreError::Config("LEDGER_CAPACITY must be at least 1".to_string()));
        }
        if self.poller.local_offset().is_none() {
            return Err(CoreError::Config(format!(
                "LOCAL_UTC_OFFSET_MINUTES out of range: {}",
                self.poller.utc_offset_minutes
            )));
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!(profile = self.profile_label(), "configuration loaded");
        tracing::info!("  listen:   {}:{} (cors {})", self.server.host, self.server.port, self.server.cors_origin);
        tracing::info!(
            "  mailbox:  host={}:{}, tls={}, folder={}, sender={}",
            self.mailbox.host,
            self.mailbox.port,
            self.mailbox.tls,
            self.mailbox.folder,
            self.mailbox.sender
        );
        tracing::info!(
            "  filter:   subject_pattern={}, lookback={}d, max_message_bytes={}",
            self.mailbox.subject_pattern.as_deref().unwrap_or("(none)"),
            self.mailbox.lookback_days,
            self.mailbox.max_message_bytes
        );
        tracing::info!(
            "  poller:   cadence={}, run_on_start={}, cycle_timeout={}s, utc_offset={}m",
            self.poller.cadence,
            self.poller.run_on_start,
            self.poller.cycle_timeout_secs,
            self.poller.utc_offset_minutes
        );
        tracing::info!("  storage:  scratch_dir={}", self.storage.scratch_dir.display());
        tracing::info!("  ledger:   capacity={}", self.ledger.capacity);
        tracing::info!(
            "  notify:   webhook={}, email={}",
            self.notify.webhook_url.is_some(),
            self.notify.email_configured()
        );
    }

    /// JSON view of the settings with credentials left out.
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "listen": format!("{}:{}", self.server.host, self.server.port),
            "mailbox": {
                "host": self.mailbox.host,
                "port": self.mailbox.port,
                "tls": self.mailbox.tls,
                "folder": self.mailbox.folder,
                "sender": self.mailbox.sender,
                "subject_pattern": self.mailbox.subject_pattern,
                "lookback_days": self.mailbox.lookback_days,
                "configured": self.mailbox.is_configured(),
            },
            "poller": {
                "cadence": self.poller.cadence,
                "run_on_start": self.poller.run_on_start,
                "cycle_timeout_secs": self.poller.cycle_timeout_secs,
                "utc_offset_minutes": self.poller.utc_offset_minutes,
            },
            "ledger": { "capacity": self.ledger.capacity },
            "notify": {
                "webhook": self.notify.webhook_url.is_some(),
                "email": self.notify.email_configured(),
            },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn read(env: &ProfiledEnv) -> Self {
        Self {
            host: env.or("HOST", "0.0.0.0"),
            port: env.parsed_or("PORT", 5000),
            cors_origin: env.or("CORS_ORIGIN", "*"),
        }
    }
}

// ── Mailbox (IMAP) ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub folder: String,
    /// Only messages from this address are considered.
    pub sender: String,
    /// Optional substring every qualifying subject must contain.
    pub subject_pattern: Option<String>,
    /// Trailing window passed to the server-side SINCE search.
    pub lookback_days: u32,
    /// Messages larger than this are skipped without downloading the body.
    pub max_message_bytes: u64,
}

impl MailboxConfig {
    fn read(env: &ProfiledEnv) -> Self {
        Self {
            host: env.or("IMAP_HOST", ""),
            port: env.parsed_or("IMAP_PORT", 993),
            tls: env.flag("IMAP_SECURE", true),
            username: env.or("EMAIL_USER", ""),
            password: env.or("EMAIL_PASS", ""),
            folder: env.or("IMAP_FOLDER", "INBOX"),
            sender: env.or("SENDER_EMAIL", ""),
            subject_pattern: env.opt("SUBJECT_PATTERN"),
            lookback_days: env.parsed_or("MAIL_LOOKBACK_DAYS", 30),
            max_message_bytes: env.parsed_or("MAIL_MAX_MESSAGE_BYTES", 20 * 1024 * 1024),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && !self.username.is_empty() && !self.sender.is_empty()
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.lookback_days))
    }
}

// ── Poller ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Interval (`10m`, `1h30m`, `600`) or 5/6-field cron expression.
    pub cadence: String,
    pub run_on_start: bool,
    pub cycle_timeout_secs: u64,
    /// Local offset used for day keys, subject dates, and the midnight rollover.
    pub utc_offset_minutes: i32,
}

impl PollerConfig {
    fn read(env: &ProfiledEnv) -> Self {
        Self {
            cadence: env.or("POLL_CADENCE", "10m"),
            run_on_start: env.flag("POLL_RUN_ON_START", true),
            cycle_timeout_secs: env.parsed_or("POLL_CYCLE_TIMEOUT_SECS", 300),
            utc_offset_minutes: env.parsed_or("LOCAL_UTC_OFFSET_MINUTES", 330),
        }
    }

    pub fn local_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs.max(1))
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Transient attachment storage, swept after every cycle.
    pub scratch_dir: PathBuf,
}

impl StorageConfig {
    fn read(env: &ProfiledEnv) -> Self {
        Self {
            scratch_dir: PathBuf::from(env.or("SCRATCH_DIR", "temp")),
        }
    }
}

// ── Ledger ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub capacity: usize,
    /// Buffered events per live subscriber before it starts lagging.
    pub broadcast_capacity: usize,
}

impl LedgerConfig {
    fn read(env: &ProfiledEnv) -> Self {
        Self {
            capacity: env.parsed_or("LEDGER_CAPACITY", 10_000),
            broadcast_capacity: env.parsed_or("BROADCAST_CAPACITY", 256),
        }
    }
}

// ── Notification channels ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub webhook_url: Option<String>,
    /// Sent as `Authorization: Bearer …` on webhook calls.
    #[serde(skip_serializing, default)]
    pub webhook_token: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    #[serde(skip_serializing, default)]
    pub smtp_password: Option<String>,
    pub email_from: Option<String>,
    pub email_to: Vec<String>,
}

impl NotifyConfig {
    fn read(env: &ProfiledEnv) -> Self {
        Self {
            webhook_url: env.opt("NOTIFY_WEBHOOK_URL"),
            webhook_token: env.opt("NOTIFY_WEBHOOK_TOKEN"),
            smtp_host: env.opt("NOTIFY_SMTP_HOST"),
            smtp_port: env.parsed("NOTIFY_SMTP_PORT"),
            smtp_username: env.opt("NOTIFY_SMTP_USERNAME"),
            smtp_password: env.opt("NOTIFY_SMTP_PASSWORD"),
            email_from: env.opt("NOTIFY_EMAIL_FROM"),
            email_to: env.list("NOTIFY_EMAIL_TO"),
        }
    }

    pub fn email_configured(&self) -> bool {
        self.smtp_host.is_some() && self.email_from.is_some() && !self.email_to.is_empty()
    }
}
