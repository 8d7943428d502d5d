//! Slack adapter type definitions
//!
//! Defines the adapter configuration and the Slack payloads it exchanges:
//! Events API envelopes for membership callbacks and Web API request/response
//! bodies.

use membership::{MembershipError, MembershipEventPayload};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared::error::CommonError;
use utoipa::ToSchema;

pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

/// Configuration for talking to a Slack workspace
#[derive(Clone, Serialize, Deserialize)]
pub struct SlackConfiguration {
    /// Bot token for authenticating with Slack API (starts with xoxb-)
    pub bot_token: String,

    /// Signing secret for verifying Slack webhook requests
    pub signing_secret: String,

    /// Web API base URL
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
}

fn default_api_base() -> String {
    DEFAULT_SLACK_API_BASE.to_string()
}

impl SlackConfiguration {
    pub fn new(bot_token: impl Into<String>, signing_secret: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            signing_secret: signing_secret.into(),
            api_base_url: default_api_base(),
        }
    }

    pub fn validate(&self) -> Result<(), CommonError> {
        if !self.bot_token.starts_with("xoxb-") {
            return Err(CommonError::InvalidConfiguration {
                msg: "bot_token must start with 'xoxb-'".to_string(),
                source: None,
            });
        }

        if self.signing_secret.trim().is_empty() {
            return Err(CommonError::InvalidConfiguration {
                msg: "signing_secret must not be empty".to_string(),
                source: None,
            });
        }

        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(CommonError::InvalidConfiguration {
                msg: format!("api_base_url {:?} is not an http(s) URL", self.api_base_url),
                source: None,
            });
        }

        Ok(())
    }
}

impl std::fmt::Debug for SlackConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackConfiguration")
            .field("bot_token", &"<redacted>")
            .field("signing_secret", &"<redacted>")
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// Slack Events API outer envelope
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEventEnvelope {
    /// URL verification challenge from Slack
    UrlVerification {
        challenge: String,
        #[serde(default)]
        token: String,
    },
    /// Event callback containing actual event data
    EventCallback {
        #[serde(default)]
        team_id: String,
        #[serde(default)]
        api_app_id: String,
        event: SlackEvent,
        #[serde(skip_serializing_if = "Option::is_none")]
        event_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        event_time: Option<i64>,
    },
    /// App rate limited notification
    AppRateLimited {
        #[serde(default)]
        team_id: String,
        minute_rate_limited: i64,
        #[serde(default)]
        api_app_id: String,
    },
}

/// Slack event types we care about
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlackEvent {
    MemberJoinedChannel(SlackMemberChannelEvent),
    MemberLeftChannel(SlackMemberChannelEvent),
    /// Catch-all for unknown events
    #[serde(other)]
    Unknown,
}

/// Payload of `member_joined_channel` and `member_left_channel`
///
/// The fields membership processing needs are kept untyped so a callback
/// with a missing or wrong-typed field still parses; [`Self::into_payload`]
/// turns those into a `MalformedEvent` that is logged and dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SlackMemberChannelEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_ts: Option<Value>,
    /// Additional properties (`channel_type`, `team`, `inviter`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SlackMemberChannelEvent {
    pub fn into_payload(self) -> Result<MembershipEventPayload, MembershipError> {
        Ok(MembershipEventPayload {
            user: string_field("user", self.user)?,
            channel: string_field("channel", self.channel)?,
            event_ts: string_field("event_ts", self.event_ts)?,
        })
    }
}

fn string_field(
    field: &'static str,
    value: Option<Value>,
) -> Result<Option<String>, MembershipError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(MembershipError::MalformedEvent {
            field,
            reason: format!("is not a string: {other}"),
        }),
    }
}

/// Request to send a message to Slack
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackPostMessageRequest {
    /// Channel or conversation ID to post to
    pub channel: String,
    pub text: String,
}

/// Request to open a direct conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConversationsOpenRequest {
    /// Comma separated user IDs
    pub users: String,
}

/// Common Slack Web API response wrapper
#[derive(Debug, Clone, Deserialize)]
pub struct SlackApiResponse<T> {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub response_metadata: Option<Value>,
    #[serde(flatten)]
    pub data: T,
}

/// Body of a successful `chat.postMessage`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackPostMessageData {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
}

/// Body of a successful `conversations.open`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackConversationsOpenData {
    #[serde(default)]
    pub channel: Option<SlackConversation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackConversation {
    pub id: String,
}
