use crate::watcher::policy::PortSpecError;
use clap::Parser;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// portwatch: established-connection watcher with severity-classified alerts.
///
/// Polls the host's established inbound connections, detects connections
/// that newly appeared on the monitored ports, and reports each one to the
/// configured operator while appending it to a day-stamped audit log.
#[derive(Parser, Debug, Clone)]
#[command(
    name    = "portwatch",
    version = "0.2.0",
    about   = "Alerts on new inbound connections to monitored ports",
    long_about = None,
)]
pub struct Cli {
    // ── Monitoring ───────────────────────────────────────────────────────────

    /// Monitored local ports with their severity levels.
    ///
    /// Comma-separated PORT=SEVERITY pairs, where SEVERITY is 1 (INFO),
    /// 2 (WARNING) or 3 (ALERT). Example: "22=3,25565=1,7777=1".
    #[arg(short = 'p', long = "ports", value_name = "PORT=SEV[,PORT=SEV...]")]
    pub ports: String,

    /// Seconds between connection polls.
    ///
    /// A value of 0 is invalid and falls back to the default with a
    /// warning. Default: 5.
    #[arg(short = 'n', long = "interval", value_name = "SECS", default_value_t = 5)]
    pub interval: u64,

    // ── Logging ──────────────────────────────────────────────────────────────

    /// Directory for the day-stamped audit log files.
    ///
    /// One file per calendar day is created (or appended to) as
    /// <DIR>/<YYYY-MM-DD>-watcher.log.
    #[arg(short = 'd', long = "log-dir", value_name = "DIR", default_value = ".")]
    pub log_dir: PathBuf,

    /// Emit stdout output as newline-delimited JSON (NDJSON).
    ///
    /// Each event is a self-contained JSON object on its own line, suitable
    /// for ingestion by log shippers or SIEM platforms. The audit file
    /// format is unaffected.
    #[arg(short = 'j', long = "json")]
    pub json: bool,
}

// ── Credentials ──────────────────────────────────────────────────────────────

/// Fatal startup configuration errors. None of these allow the watcher to
/// enter its running state.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("DISCORD_TOKEN is not set")]
    MissingToken,

    #[error("USER_ID is not set")]
    MissingUserId,

    #[error("USER_ID must be a numeric Discord user id, got `{0}`")]
    BadUserId(String),

    #[error("invalid --ports specification: {0}")]
    Ports(#[from] PortSpecError),
}

/// Notification credentials, read from the environment (a `.env` file is
/// honoured via dotenv before parsing).
pub struct Credentials {
    pub token:   String,
    pub user_id: u64,
}

/// Reads `DISCORD_TOKEN` and `USER_ID` from the environment.
pub fn credentials_from_env() -> Result<Credentials, ConfigError> {
    let token = env::var("DISCORD_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty())
        .ok_or(ConfigError::MissingToken)?;

    let raw = env::var("USER_ID").map_err(|_| ConfigError::MissingUserId)?;
    let user_id: u64 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::BadUserId(raw.trim().to_string()))?;

    Ok(Credentials { token, user_id })
}

#[cfg(test)]
mod tests {
    use super::*;

    // One test covers all environment scenarios sequentially: the process
    // environment is shared, so splitting these into parallel tests races.
    #[test]
    fn credentials_resolution() {
        env::remove_var("DISCORD_TOKEN");
        env::remove_var("USER_ID");
        assert!(matches!(
            credentials_from_env(),
            Err(ConfigError::MissingToken)
        ));

        env::set_var("DISCORD_TOKEN", "token-123");
        assert!(matches!(
            credentials_from_env(),
            Err(ConfigError::MissingUserId)
        ));

        env::set_var("USER_ID", "not-a-number");
        assert!(matches!(
            credentials_from_env(),
            Err(ConfigError::BadUserId(_))
        ));

        env::set_var("USER_ID", "123456789");
        let creds = credentials_from_env().unwrap();
        assert_eq!(creds.token, "token-123");
        assert_eq!(creds.user_id, 123456789);

        env::remove_var("DISCORD_TOKEN");
        env::remove_var("USER_ID");
    }
}
