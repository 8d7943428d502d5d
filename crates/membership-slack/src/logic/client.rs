//! Slack API Client
//!
//! HTTP client for the Slack Web API calls the welcome flow needs.

use membership::{MessagingError, MessagingPlatform};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{error, trace, warn};

use crate::types::{
    DEFAULT_SLACK_API_BASE, SlackApiResponse, SlackConversationsOpenData,
    SlackConversationsOpenRequest, SlackPostMessageData, SlackPostMessageRequest,
};

/// HTTP client for Slack API
pub struct SlackClient {
    client: Client,
    bot_token: String,
    base_url: String,
}

impl SlackClient {
    /// Create a new Slack client with the given bot token
    pub fn new(bot_token: String) -> Self {
        Self::with_base_url(bot_token, DEFAULT_SLACK_API_BASE.to_string())
    }

    pub fn with_base_url(bot_token: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            bot_token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Post a message to a Slack channel or conversation
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
    ) -> Result<SlackPostMessageData, SlackClientError> {
        trace!(channel = %channel, "Posting message to Slack");

        let request = SlackPostMessageRequest {
            channel: channel.to_string(),
            text: text.to_string(),
        };
        let data: SlackPostMessageData = self.call("chat.postMessage", &request).await?;

        trace!(ts = ?data.ts, "Message posted successfully");
        Ok(data)
    }

    /// Open (or fetch the existing) direct message conversation with a user
    pub async fn open_conversation(&self, user_id: &str) -> Result<String, SlackClientError> {
        trace!(user_id = %user_id, "Opening Slack conversation");

        let request = SlackConversationsOpenRequest {
            users: user_id.to_string(),
        };
        let data: SlackConversationsOpenData = self.call("conversations.open", &request).await?;

        data.channel
            .map(|c| c.id)
            .ok_or_else(|| SlackClientError::Api {
                error: "missing_channel".to_string(),
                response_metadata: None,
            })
    }

    async fn call<Req, Data>(&self, method: &str, request: &Req) -> Result<Data, SlackClientError>
    where
        Req: Serialize,
        Data: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .header("Authorization", format!("Bearer {}", self.bot_token))
            .header("Content-Type", "application/json; charset=utf-8")
            .json(request)
            .send()
            .await
            .map_err(SlackClientError::Request)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            warn!(method, retry_after = ?retry_after, "Slack API rate limited");
            return Err(SlackClientError::RateLimited { retry_after });
        }

        let body = response
            .text()
            .await
            .map_err(SlackClientError::Request)?;

        let result: SlackApiResponse<Data> =
            serde_json::from_str(&body).map_err(|e| SlackClientError::Parse {
                body: body.clone(),
                error: e,
            })?;

        if !result.ok {
            error!(
                method,
                error = ?result.error,
                status = %status,
                "Slack API error"
            );
            return Err(SlackClientError::Api {
                error: result.error.unwrap_or_else(|| "unknown".to_string()),
                response_metadata: result.response_metadata,
            });
        }

        Ok(result.data)
    }
}

#[async_trait::async_trait]
impl MessagingPlatform for SlackClient {
    async fn send_channel_message(&self, channel_id: &str, text: &str) -> Result<(), MessagingError> {
        self.post_message(channel_id, text).await?;
        Ok(())
    }

    async fn open_direct_conversation(&self, user_id: &str) -> Result<String, MessagingError> {
        Ok(self.open_conversation(user_id).await?)
    }

    async fn send_direct_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<(), MessagingError> {
        self.post_message(conversation_id, text).await?;
        Ok(())
    }
}

/// Errors that can occur when interacting with Slack API
#[derive(Debug, thiserror::Error)]
pub enum SlackClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Failed to parse response: {error}, body: {body}")]
    Parse {
        body: String,
        #[source]
        error: serde_json::Error,
    },

    #[error("Slack API error: {error}")]
    Api {
        error: String,
        response_metadata: Option<Value>,
    },

    #[error("Slack API rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },
}

impl From<SlackClientError> for MessagingError {
    fn from(e: SlackClientError) -> Self {
        match e {
            SlackClientError::Api { error, .. } => MessagingError::Platform { error },
            SlackClientError::RateLimited { .. } => MessagingError::Platform {
                error: "ratelimited".to_string(),
            },
            other @ (SlackClientError::Request(_) | SlackClientError::Parse { .. }) => {
                MessagingError::Transport {
                    msg: other.to_string(),
                    source: Some(anyhow::Error::new(other)),
                }
            }
        }
    }
}
