//! Welcome dispatcher
//!
//! Sends the public channel acknowledgment and the private onboarding
//! message for a newly joined user through a [`MessagingPlatform`].

use std::error::Error as _;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, trace};

use crate::types::MessageTemplate;

/// Outbound messaging operations the dispatcher needs from a chat platform
#[async_trait::async_trait]
pub trait MessagingPlatform: Send + Sync {
    async fn send_channel_message(&self, channel_id: &str, text: &str) -> Result<(), MessagingError>;

    /// Opens (or resolves) a direct conversation and returns its id
    async fn open_direct_conversation(&self, user_id: &str) -> Result<String, MessagingError>;

    async fn send_direct_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<(), MessagingError>;
}

/// Errors surfaced by a [`MessagingPlatform`] implementation
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// The platform answered and refused the call (rate limit, unknown channel, ...)
    #[error("platform rejected request: {error}")]
    Platform { error: String },

    #[error("platform unreachable: {msg}")]
    Transport {
        msg: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchStep {
    ChannelAcknowledgment,
    OpenConversation,
    OnboardingMessage,
}

impl fmt::Display for DispatchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchStep::ChannelAcknowledgment => f.write_str("channel acknowledgment"),
            DispatchStep::OpenConversation => f.write_str("open direct conversation"),
            DispatchStep::OnboardingMessage => f.write_str("onboarding message"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchFailure {
    #[error("{step} timed out after {after:?}")]
    Timeout { step: DispatchStep, after: Duration },

    #[error("{step} failed")]
    Platform {
        step: DispatchStep,
        #[source]
        source: MessagingError,
    },
}

impl DispatchFailure {
    pub fn step(&self) -> DispatchStep {
        match self {
            DispatchFailure::Timeout { step, .. } | DispatchFailure::Platform { step, .. } => *step,
        }
    }
}

/// Outcome of both sends for one user
#[derive(Debug)]
pub struct DispatchReport {
    pub user_id: String,
    pub channel_acknowledgment: Result<(), DispatchFailure>,
    pub onboarding: Result<(), DispatchFailure>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.channel_acknowledgment.is_ok() && self.onboarding.is_ok()
    }
}

pub struct WelcomeDispatcher {
    platform: Arc<dyn MessagingPlatform>,
    channel_id: String,
    welcome_template: MessageTemplate,
    onboarding_template: MessageTemplate,
    send_timeout: Duration,
}

impl WelcomeDispatcher {
    pub fn new(
        platform: Arc<dyn MessagingPlatform>,
        channel_id: impl Into<String>,
        welcome_template: MessageTemplate,
        onboarding_template: MessageTemplate,
        send_timeout: Duration,
    ) -> Self {
        Self {
            platform,
            channel_id: channel_id.into(),
            welcome_template,
            onboarding_template,
            send_timeout,
        }
    }

    /// Sends both welcome messages concurrently
    ///
    /// Failures are logged and reported; neither send waits on or retries
    /// the other.
    pub async fn dispatch(&self, user_id: &str) -> DispatchReport {
        trace!(user_id, channel_id = %self.channel_id, "Dispatching welcome");

        let (channel_acknowledgment, onboarding) = tokio::join!(
            self.acknowledge_in_channel(user_id),
            self.send_onboarding(user_id)
        );

        if let Err(e) = &channel_acknowledgment {
            error!(user_id, error = %e, cause = ?e.source(), "Failed to send welcome message");
        }
        if let Err(e) = &onboarding {
            error!(user_id, error = %e, cause = ?e.source(), "Failed to send onboarding message");
        }

        DispatchReport {
            user_id: user_id.to_string(),
            channel_acknowledgment,
            onboarding,
        }
    }

    async fn acknowledge_in_channel(&self, user_id: &str) -> Result<(), DispatchFailure> {
        let text = self.welcome_template.render(user_id);
        self.bounded(
            DispatchStep::ChannelAcknowledgment,
            self.platform.send_channel_message(&self.channel_id, &text),
        )
        .await
    }

    async fn send_onboarding(&self, user_id: &str) -> Result<(), DispatchFailure> {
        let conversation_id = self
            .bounded(
                DispatchStep::OpenConversation,
                self.platform.open_direct_conversation(user_id),
            )
            .await?;

        let text = self.onboarding_template.render(user_id);
        self.bounded(
            DispatchStep::OnboardingMessage,
            self.platform.send_direct_message(&conversation_id, &text),
        )
        .await
    }

    async fn bounded<T>(
        &self,
        step: DispatchStep,
        call: impl Future<Output = Result<T, MessagingError>>,
    ) -> Result<T, DispatchFailure> {
        match tokio::time::timeout(self.send_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(DispatchFailure::Platform { step, source }),
            Err(_) => Err(DispatchFailure::Timeout {
                step,
                after: self.send_timeout,
            }),
        }
    }
}


#[cfg(test)]
mod tests {
    mod unit {
        use super::super::test_support::{Call, RecordingPlatform};
        use super::super::*;

        fn dispatcher(platform: Arc<RecordingPlatform>) -> WelcomeDispatcher {
            WelcomeDispatcher::new(
                platform,
                "C_LOG",
                MessageTemplate::new("welcome <@{user_id}>"),
                MessageTemplate::new("hello <@{user_id}>"),
                Duration::from_secs(5),
            )
        }

        #[tokio::test]
        async fn test_dispatch_sends_both_messages() {
            let platform = Arc::new(RecordingPlatform::default());
            let report = dispatcher(platform.clone()).dispatch("U1").await;

            assert!(report.is_complete());
            let calls = platform.calls();
            assert!(calls.contains(&Call::Channel {
                channel_id: "C_LOG".to_string(),
                text: "welcome <@U1>".to_string(),
            }));
            assert!(calls.contains(&Call::Open {
                user_id: "U1".to_string()
            }));
            assert!(calls.contains(&Call::Direct {
                conversation_id: "D-U1".to_string(),
                text: "hello <@U1>".to_string(),
            }));
        }

        #[tokio::test]
        async fn test_channel_failure_does_not_block_onboarding() {
            let platform = Arc::new(RecordingPlatform::failing_on(
                DispatchStep::ChannelAcknowledgment,
            ));
            let report = dispatcher(platform.clone()).dispatch("U1").await;

            let failure = report.channel_acknowledgment.unwrap_err();
            assert_eq!(failure.step(), DispatchStep::ChannelAcknowledgment);
            assert!(report.onboarding.is_ok());
            assert_eq!(platform.calls().len(), 3);
        }

        #[tokio::test]
        async fn test_open_conversation_failure_skips_direct_message() {
            let platform = Arc::new(RecordingPlatform::failing_on(DispatchStep::OpenConversation));
            let report = dispatcher(platform.clone()).dispatch("U1").await;

            assert!(report.channel_acknowledgment.is_ok());
            let failure = report.onboarding.unwrap_err();
            assert!(matches!(
                failure,
                DispatchFailure::Platform {
                    step: DispatchStep::OpenConversation,
                    ..
                }
            ));
            assert!(
                !platform
                    .calls()
                    .iter()
                    .any(|c| matches!(c, Call::Direct { .. }))
            );
        }

        #[tokio::test(start_paused = true)]
        async fn test_hanging_send_times_out() {
            let platform = Arc::new(RecordingPlatform::hanging_on(
                DispatchStep::OnboardingMessage,
            ));
            let report = dispatcher(platform).dispatch("U1").await;

            assert!(report.channel_acknowledgment.is_ok());
            match report.onboarding {
                Err(DispatchFailure::Timeout { step, after }) => {
                    assert_eq!(step, DispatchStep::OnboardingMessage);
                    assert_eq!(after, Duration::from_secs(5));
                }
                other => panic!("Expected timeout, got {other:?}"),
            }
        }

        #[test]
        fn test_failure_display() {
            let failure = DispatchFailure::Platform {
                step: DispatchStep::OnboardingMessage,
                source: MessagingError::Platform {
                    error: "user_not_found".to_string(),
                },
            };
            assert_eq!(failure.to_string(), "onboarding message failed");

            let mut chain = Vec::new();
            let mut current: Option<&dyn std::error::Error> = Some(&failure);
            while let Some(e) = current {
                chain.push(e.to_string());
                current = e.source();
            }
            assert_eq!(
                chain,
                vec![
                    "onboarding message failed".to_string(),
                    "platform rejected request: user_not_found".to_string(),
                ]
            );
        }
    }
}
