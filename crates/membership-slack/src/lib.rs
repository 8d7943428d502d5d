//! Slack adapter for membership processing
//!
//! Connects the membership processor to Slack in both directions:
//! - Slack Events API webhook handling with request signing (`router` module)
//! - Channel and direct messages via the Slack Web API (`logic` module)
//!
//! The webhook acknowledges `member_joined_channel` and `member_left_channel`
//! callbacks immediately and processes them on a background task. Welcome
//! messages go out through [`SlackClient`], which implements
//! [`membership::MessagingPlatform`].

pub mod logic;
pub mod router;
mod types;

pub use logic::{SignatureError, SignatureVerifier, SlackClient, SlackClientError};
pub use router::{SlackWebhookState, create_slack_router};
pub use types::{
    DEFAULT_SLACK_API_BASE, SlackConfiguration, SlackEvent, SlackEventEnvelope,
    SlackMemberChannelEvent,
};
