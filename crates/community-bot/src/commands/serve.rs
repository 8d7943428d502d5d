use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use membership::types::{DEFAULT_ONBOARDING_TEMPLATE, DEFAULT_WELCOME_TEMPLATE};
use membership::{LeaveOrdering, MembershipConfig, MembershipProcessor, MessageTemplate};
use membership_slack::{
    DEFAULT_SLACK_API_BASE, SignatureVerifier, SlackClient, SlackConfiguration, SlackWebhookState,
};
use shared::error::CommonError;
use tracing::{debug, info};

use crate::server::{StartAxumServerParams, start_axum_server};

#[derive(Clone, Parser)]
pub struct ServeParams {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,
    #[arg(long, env = "PORT", default_value = "10000")]
    pub port: u16,

    /// Slack bot token (xoxb-...)
    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: String,
    /// Slack app signing secret used to verify webhook requests
    #[arg(long, env = "SLACK_SIGNING_SECRET", hide_env_values = true)]
    pub signing_secret: String,
    #[arg(long, env = "SLACK_API_BASE", default_value = DEFAULT_SLACK_API_BASE)]
    pub slack_api_base: String,

    /// Channel whose new members get welcomed
    #[arg(long, env = "MONITORED_CHANNEL_ID")]
    pub monitored_channel: String,
    /// Public welcome text, `{user_id}` is replaced with the member's id
    #[arg(long, env = "WELCOME_TEMPLATE")]
    pub welcome_template: Option<String>,
    /// Onboarding direct message text, `{user_id}` is replaced with the member's id
    #[arg(long, env = "ONBOARDING_TEMPLATE")]
    pub onboarding_template: Option<String>,
    /// Upper bound for each Slack call made while welcoming (e.g. "10s", "500ms")
    #[arg(long, env = "DISPATCH_TIMEOUT", default_value = "10s", value_parser = humantime::parse_duration)]
    pub dispatch_timeout: Duration,
    /// How leave events are ordered against earlier events for the same user
    ///
    /// "watermarked" (default) drops a leave that is not newer than the last
    /// accepted join or leave and advances the watermark on accepted leaves.
    /// "unordered" applies every leave without a timestamp check and never
    /// moves the watermark, so a late leave still re-arms onboarding.
    #[arg(long, env = "LEAVE_ORDERING", default_value_t = LeaveOrdering::Watermarked)]
    pub leave_ordering: LeaveOrdering,
}

impl ServeParams {
    pub fn slack_configuration(&self) -> Result<SlackConfiguration, CommonError> {
        let mut config = SlackConfiguration::new(&self.bot_token, &self.signing_secret);
        config.api_base_url = self.slack_api_base.clone();
        config.validate()?;
        Ok(config)
    }

    pub fn membership_config(&self) -> Result<MembershipConfig, CommonError> {
        let channel = self.monitored_channel.trim();
        if channel.is_empty() {
            return Err(CommonError::InvalidConfiguration {
                msg: "monitored channel id must not be empty".to_string(),
                source: None,
            });
        }

        if self.dispatch_timeout.is_zero() {
            return Err(CommonError::InvalidConfiguration {
                msg: "dispatch timeout must be greater than zero".to_string(),
                source: None,
            });
        }

        Ok(MembershipConfig {
            monitored_channel_id: channel.to_string(),
            welcome_template: MessageTemplate::new(
                self.welcome_template
                    .as_deref()
                    .unwrap_or(DEFAULT_WELCOME_TEMPLATE),
            ),
            onboarding_template: MessageTemplate::new(
                self.onboarding_template
                    .as_deref()
                    .unwrap_or(DEFAULT_ONBOARDING_TEMPLATE),
            ),
            dispatch_timeout: self.dispatch_timeout,
            leave_ordering: self.leave_ordering,
        })
    }
}

/// Builds the webhook state from validated configuration
pub fn create_webhook_state(params: &ServeParams) -> Result<SlackWebhookState, CommonError> {
    let slack_config = params.slack_configuration()?;
    let membership_config = params.membership_config()?;

    info!(
        monitored_channel = %membership_config.monitored_channel_id,
        leave_ordering = %membership_config.leave_ordering,
        dispatch_timeout = ?membership_config.dispatch_timeout,
        "Configured membership processor"
    );

    let client = Arc::new(SlackClient::with_base_url(
        slack_config.bot_token,
        slack_config.api_base_url,
    ));
    let processor = Arc::new(MembershipProcessor::new(membership_config, client));

    Ok(SlackWebhookState::new(
        processor,
        SignatureVerifier::new(slack_config.signing_secret),
    ))
}

/// Main entry point for the serve command
pub async fn cmd_serve(params: ServeParams) -> Result<(), CommonError> {
    let state = create_webhook_state(&params)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let (server_fut, _handle, addr) = start_axum_server(StartAxumServerParams {
        host: params.host,
        port: params.port,
        system_shutdown_signal_rx: shutdown_rx,
        state,
    })?;
    tokio::pin!(server_fut);

    info!("Community bot listening on {addr}");

    tokio::select! {
        biased;

        _ = tokio::signal::ctrl_c() => {
            debug!("Shutdown signal received (Ctrl+C)");
            let _ = shutdown_tx.send(());
        }

        result = &mut server_fut => {
            debug!("Server exited before a shutdown signal");
            return result.map_err(CommonError::from);
        }
    }

    // Graceful shutdown drains in-flight requests
    server_fut.await?;
    debug!("Shutdown complete");
    Ok(())
}
