//! Suggestion relay: forwards a user suggestion to the admin chat.
//!
//! One POST per submission. No retry and no queue: on failure the caller shows
//! a notice once and keeps the form data for a manual resend.
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Suggestion relay is not configured (missing bot token)")]
    NotConfigured,
    #[error("Request timed out after 20s")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Relay returned status {0}")]
    HttpStatus(u16),
    #[error("Invalid relay API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Insecure relay API URL: HTTPS required (except localhost for testing)")]
    InsecureApiBase,
}

/// A user-submitted suggestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Suggestion {
    pub username: String,
    pub proposal: String,
    pub utility: String,
}

impl Suggestion {
    /// Markdown message body sent to the admin chat.
    pub fn message(&self) -> String {
        format!(
            "💡 *New Suggestion*\n\n👤 *User:* @{}\n📝 *Proposal:* {}\n🚀 *Utility:* {}",
            self.username.replacen('@', "", 1),
            self.proposal,
            self.utility
        )
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
}

pub struct SuggestionRelay {
    client: reqwest::Client,
    api_base: String,
    bot_token: Option<SecretString>,
    chat_id: String,
}

impl SuggestionRelay {
    /// Build a relay for the bot API at `api_base`.
    ///
    /// The bot token travels in the request path, so the base must be HTTPS.
    /// Plain HTTP is accepted only for localhost.
    pub fn new(
        client: reqwest::Client,
        api_base: &str,
        bot_token: Option<SecretString>,
        chat_id: impl Into<String>,
    ) -> Result<Self, RelayError> {
        let parsed = Url::parse(api_base)?;
        if parsed.scheme() != "https" {
            let is_localhost = matches!(parsed.host_str(), Some("127.0.0.1" | "localhost"));
            if !is_localhost {
                tracing::error!(api_base = %api_base, "Rejecting non-HTTPS relay API URL");
                return Err(RelayError::InsecureApiBase);
            }
            tracing::warn!(api_base = %api_base, "Using non-HTTPS relay API URL (localhost only)");
        }

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token,
            chat_id: chat_id.into(),
        })
    }

    /// Send `suggestion` to the admin chat.
    pub async fn send(&self, suggestion: &Suggestion) -> Result<(), RelayError> {
        let token = self.bot_token.as_ref().ok_or(RelayError::NotConfigured)?;
        let url = format!("{}/bot{}/sendMessage", self.api_base, token.expose_secret());
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: suggestion.message(),
            parse_mode: "Markdown",
        };

        let request = self.client.post(&url).json(&body).send();
        let response = tokio::time::timeout(REQUEST_TIMEOUT, request)
            .await
            .map_err(|_| RelayError::Timeout)??;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            tracing::warn!(status, "Suggestion relay rejected message");
            return Err(RelayError::HttpStatus(status));
        }

        tracing::info!(chat_id = %self.chat_id, "Suggestion relayed");
        Ok(())
    }
}
