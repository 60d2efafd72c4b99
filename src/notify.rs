//! Notification delivery to the operator.
//!
//! Alerts leave the process through a [`Notifier`], which delivers a
//! formatted message to one fixed operator identity configured at startup.
//! Delivery is strictly best-effort: the audit log is the authoritative
//! record, so a failed send is reported to the caller and never retried.
//!
//! The production implementation DMs a Discord user through the REST API.
//! The DM channel is resolved once on first use and cached; only the
//! message post happens per alert.

use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

const DISCORD_API: &str = "https://discord.com/api/v10";

/// Notification delivery failure. Recoverable, per event.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("discord returned {status} from {endpoint}")]
    Api {
        endpoint: &'static str,
        status:   reqwest::StatusCode,
    },

    #[error("malformed discord response: missing `{0}`")]
    Malformed(&'static str),
}

/// Sink that delivers one formatted alert message to the operator.
pub trait Notifier {
    fn send(&self, text: &str) -> Result<(), NotifyError>;
}

/// Discord direct-message notifier for a single fixed user id.
pub struct DiscordNotifier {
    client:  reqwest::blocking::Client,
    token:   String,
    user_id: u64,
    /// DM channel id, resolved lazily on the first send and reused after.
    dm_channel: Mutex<Option<String>>,
}

impl DiscordNotifier {
    /// Builds the notifier with a bounded request timeout so a stalled sink
    /// delays the watch loop by at most one timeout per alert.
    pub fn new(token: String, user_id: u64) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            token,
            user_id,
            dm_channel: Mutex::new(None),
        })
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// Opens (or returns the cached) DM channel for the configured user.
    fn dm_channel_id(&self) -> Result<String, NotifyError> {
        if let Ok(guard) = self.dm_channel.lock() {
            if let Some(id) = guard.as_ref() {
                return Ok(id.clone());
            }
        }

        let endpoint = "/users/@me/channels";
        let resp = self
            .client
            .post(format!("{}{}", DISCORD_API, endpoint))
            .header("Authorization", self.auth_header())
            .json(&json!({ "recipient_id": self.user_id.to_string() }))
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Api { endpoint, status });
        }

        let body: serde_json::Value = resp.json()?;
        let id = body
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or(NotifyError::Malformed("id"))?
            .to_string();

        if let Ok(mut guard) = self.dm_channel.lock() {
            *guard = Some(id.clone());
        }
        Ok(id)
    }
}

impl Notifier for DiscordNotifier {
    fn send(&self, text: &str) -> Result<(), NotifyError> {
        let channel = self.dm_channel_id()?;

        let endpoint = "/channels/:id/messages";
        let resp = self
            .client
            .post(format!("{}/channels/{}/messages", DISCORD_API, channel))
            .header("Authorization", self.auth_header())
            .json(&json!({ "content": text }))
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Api { endpoint, status });
        }
        Ok(())
    }
}
