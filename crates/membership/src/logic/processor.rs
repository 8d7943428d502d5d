//! Membership event processor
//!
//! Entry point for event sources: validates inbound notifications, filters
//! them to the monitored channel, consults the ledger and dispatches the
//! welcome when a user joins for the first time.

use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::logic::dispatcher::{DispatchReport, MessagingPlatform, WelcomeDispatcher};
use crate::logic::ledger::{JoinDecision, LeaveDecision, MembershipLedger};
use crate::types::{
    LeaveOrdering, MembershipConfig, MembershipEvent, MembershipEventKind, MembershipEventPayload,
};

/// What processing a single event resulted in
#[derive(Debug)]
pub enum ProcessOutcome {
    /// Event addressed to a channel other than the monitored one
    IgnoredChannel,
    /// Timestamp not newer than the user's watermark
    Stale,
    AlreadyWelcomed,
    Welcomed(DispatchReport),
    Left,
    NotWelcomed,
}

pub struct MembershipProcessor {
    monitored_channel_id: String,
    leave_ordering: LeaveOrdering,
    ledger: MembershipLedger,
    dispatcher: WelcomeDispatcher,
}

impl MembershipProcessor {
    pub fn new(config: MembershipConfig, platform: Arc<dyn MessagingPlatform>) -> Self {
        let dispatcher = WelcomeDispatcher::new(
            platform,
            config.monitored_channel_id.clone(),
            config.welcome_template,
            config.onboarding_template,
            config.dispatch_timeout,
        );

        Self {
            monitored_channel_id: config.monitored_channel_id,
            leave_ordering: config.leave_ordering,
            ledger: MembershipLedger::new(),
            dispatcher,
        }
    }

    pub fn monitored_channel_id(&self) -> &str {
        &self.monitored_channel_id
    }

    pub fn ledger(&self) -> &MembershipLedger {
        &self.ledger
    }

    /// Validates a raw notification and processes it
    ///
    /// Malformed payloads are logged and dropped; `None` is returned for them.
    pub async fn ingest(
        &self,
        kind: MembershipEventKind,
        payload: MembershipEventPayload,
    ) -> Option<ProcessOutcome> {
        match MembershipEvent::from_payload(kind, payload) {
            Ok(event) => Some(self.process(event).await),
            Err(e) => {
                warn!(kind = %kind, error = %e, "Discarding malformed membership event");
                None
            }
        }
    }

    pub async fn process(&self, event: MembershipEvent) -> ProcessOutcome {
        if event.channel_id != self.monitored_channel_id {
            trace!(
                channel_id = %event.channel_id,
                user_id = %event.user_id,
                "Ignoring membership event outside monitored channel"
            );
            return ProcessOutcome::IgnoredChannel;
        }

        match event.kind {
            MembershipEventKind::Joined => self.process_join(&event).await,
            MembershipEventKind::Left => self.process_leave(&event),
        }
    }

    async fn process_join(&self, event: &MembershipEvent) -> ProcessOutcome {
        match self.ledger.record_join(&event.user_id, &event.event_ts) {
            JoinDecision::Stale => {
                debug!(user_id = %event.user_id, event_ts = %event.event_ts, "Dropping stale join");
                ProcessOutcome::Stale
            }
            JoinDecision::AlreadyWelcomed => {
                debug!(user_id = %event.user_id, "User already welcomed");
                ProcessOutcome::AlreadyWelcomed
            }
            JoinDecision::Welcome => {
                info!(user_id = %event.user_id, "Welcoming new channel member");
                let report = self.dispatcher.dispatch(&event.user_id).await;
                ProcessOutcome::Welcomed(report)
            }
        }
    }

    fn process_leave(&self, event: &MembershipEvent) -> ProcessOutcome {
        match self
            .ledger
            .record_leave(&event.user_id, &event.event_ts, self.leave_ordering)
        {
            LeaveDecision::Stale => {
                debug!(user_id = %event.user_id, event_ts = %event.event_ts, "Dropping stale leave");
                ProcessOutcome::Stale
            }
            LeaveDecision::Removed => {
                info!(user_id = %event.user_id, "Member left, onboarding re-armed");
                ProcessOutcome::Left
            }
            LeaveDecision::NotWelcomed => {
                trace!(user_id = %event.user_id, "Leave for user that was never welcomed");
                ProcessOutcome::NotWelcomed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    mod unit {
        use std::time::Duration;

        use super::super::*;
        use crate::logic::dispatcher::DispatchStep;
        use crate::logic::dispatcher::test_support::RecordingPlatform;
        use crate::types::EventTimestamp;

        const MONITORED: &str = "C_MONITORED";
        const OTHER: &str = "C_OTHER";

        fn processor(platform: Arc<RecordingPlatform>) -> MembershipProcessor {
            MembershipProcessor::new(MembershipConfig::new(MONITORED), platform)
        }

        fn event(kind: MembershipEventKind, user: &str, channel: &str, ts: &str) -> MembershipEvent {
            MembershipEvent::new(kind, user, channel, ts.parse::<EventTimestamp>().unwrap())
        }

        fn join(user: &str, channel: &str, ts: &str) -> MembershipEvent {
            event(MembershipEventKind::Joined, user, channel, ts)
        }

        fn leave(user: &str, channel: &str, ts: &str) -> MembershipEvent {
            event(MembershipEventKind::Left, user, channel, ts)
        }

        #[tokio::test]
        async fn test_join_welcomes_once() {
            let platform = Arc::new(RecordingPlatform::default());
            let processor = processor(platform.clone());

            let outcome = processor.process(join("U1", MONITORED, "100")).await;

            assert!(matches!(outcome, ProcessOutcome::Welcomed(ref r) if r.is_complete()));
            assert!(processor.ledger().is_welcomed("U1"));
            assert_eq!(processor.ledger().welcomed_count(), 1);
            assert_eq!(platform.opened_for("U1"), 1);
        }

        #[tokio::test]
        async fn test_redelivered_join_dispatches_once() {
            let platform = Arc::new(RecordingPlatform::default());
            let processor = processor(platform.clone());

            processor.process(join("U1", MONITORED, "100")).await;
            let outcome = processor.process(join("U1", MONITORED, "100")).await;

            assert!(matches!(outcome, ProcessOutcome::Stale));
            assert_eq!(platform.opened_for("U1"), 1);
        }

        #[tokio::test]
        async fn test_leave_then_rejoin_rewelcomes() {
            let platform = Arc::new(RecordingPlatform::default());
            let processor = processor(platform.clone());

            processor.process(join("U1", MONITORED, "100")).await;
            let outcome = processor.process(leave("U1", MONITORED, "150")).await;
            assert!(matches!(outcome, ProcessOutcome::Left));
            assert_eq!(processor.ledger().welcomed_count(), 0);

            let outcome = processor.process(join("U1", MONITORED, "200")).await;
            assert!(matches!(outcome, ProcessOutcome::Welcomed(_)));
            assert_eq!(platform.opened_for("U1"), 2);
        }

        #[tokio::test]
        async fn test_other_channel_is_ignored() {
            let platform = Arc::new(RecordingPlatform::default());
            let processor = processor(platform.clone());

            let outcome = processor.process(join("U1", OTHER, "100")).await;

            assert!(matches!(outcome, ProcessOutcome::IgnoredChannel));
            assert!(processor.ledger().last_seen("U1").is_none());
            assert!(platform.calls().is_empty());

            // watermark untouched, so a monitored join at an older ts still counts
            let outcome = processor.process(join("U1", MONITORED, "50")).await;
            assert!(matches!(outcome, ProcessOutcome::Welcomed(_)));
        }

        #[tokio::test]
        async fn test_out_of_order_join_is_stale() {
            let platform = Arc::new(RecordingPlatform::default());
            let processor = processor(platform.clone());

            processor.process(join("U1", MONITORED, "100")).await;
            let outcome = processor.process(join("U1", MONITORED, "50")).await;

            assert!(matches!(outcome, ProcessOutcome::Stale));
            assert_eq!(
                processor.ledger().last_seen("U1"),
                Some("100".parse().unwrap())
            );
            assert!(processor.ledger().is_welcomed("U1"));
            assert_eq!(platform.opened_for("U1"), 1);
        }

        #[tokio::test]
        async fn test_stale_leave_does_not_unwelcome() {
            let platform = Arc::new(RecordingPlatform::default());
            let processor = processor(platform);

            processor.process(join("U1", MONITORED, "100")).await;
            let outcome = processor.process(leave("U1", MONITORED, "100")).await;

            assert!(matches!(outcome, ProcessOutcome::Stale));
            assert!(processor.ledger().is_welcomed("U1"));
        }

        #[tokio::test]
        async fn test_unordered_leave_applies_regardless_of_ts() {
            let platform = Arc::new(RecordingPlatform::default());
            let mut config = MembershipConfig::new(MONITORED);
            config.leave_ordering = LeaveOrdering::Unordered;
            let processor = MembershipProcessor::new(config, platform);

            processor.process(join("U1", MONITORED, "100")).await;
            let outcome = processor.process(leave("U1", MONITORED, "10")).await;

            assert!(matches!(outcome, ProcessOutcome::Left));
            assert!(!processor.ledger().is_welcomed("U1"));
        }

        #[tokio::test]
        async fn test_leave_in_other_channel_is_ignored() {
            let platform = Arc::new(RecordingPlatform::default());
            let processor = processor(platform);

            processor.process(join("U1", MONITORED, "100")).await;
            let outcome = processor.process(leave("U1", OTHER, "150")).await;

            assert!(matches!(outcome, ProcessOutcome::IgnoredChannel));
            assert!(processor.ledger().is_welcomed("U1"));
        }

        #[tokio::test]
        async fn test_dispatch_failure_keeps_user_welcomed() {
            let platform = Arc::new(RecordingPlatform::failing_on(
                DispatchStep::OnboardingMessage,
            ));
            let processor = processor(platform.clone());

            let outcome = processor.process(join("U1", MONITORED, "100")).await;
            match outcome {
                ProcessOutcome::Welcomed(report) => {
                    assert!(report.channel_acknowledgment.is_ok());
                    assert!(report.onboarding.is_err());
                }
                other => panic!("Expected Welcomed, got {other:?}"),
            }
            assert!(processor.ledger().is_welcomed("U1"));

            // no retry on redelivery
            let outcome = processor.process(join("U1", MONITORED, "101")).await;
            assert!(matches!(outcome, ProcessOutcome::AlreadyWelcomed));
            assert_eq!(platform.opened_for("U1"), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn test_timed_out_dispatch_keeps_user_welcomed() {
            let platform = Arc::new(RecordingPlatform::hanging_on(
                DispatchStep::ChannelAcknowledgment,
            ));
            let mut config = MembershipConfig::new(MONITORED);
            config.dispatch_timeout = Duration::from_millis(250);
            let processor = MembershipProcessor::new(config, platform);

            let outcome = processor.process(join("U1", MONITORED, "100")).await;
            match outcome {
                ProcessOutcome::Welcomed(report) => {
                    assert!(report.channel_acknowledgment.is_err());
                    assert!(report.onboarding.is_ok());
                }
                other => panic!("Expected Welcomed, got {other:?}"),
            }
            assert!(processor.ledger().is_welcomed("U1"));
        }

        #[tokio::test]
        async fn test_ingest_drops_malformed_payload() {
            let platform = Arc::new(RecordingPlatform::default());
            let processor = processor(platform.clone());

            let payload = MembershipEventPayload {
                user: None,
                channel: Some(MONITORED.to_string()),
                event_ts: Some("100".to_string()),
            };
            let outcome = processor.ingest(MembershipEventKind::Joined, payload).await;

            assert!(outcome.is_none());
            assert_eq!(processor.ledger().welcomed_count(), 0);
            assert!(platform.calls().is_empty());
        }

        #[tokio::test]
        async fn test_ingest_processes_valid_payload() {
            let platform = Arc::new(RecordingPlatform::default());
            let processor = processor(platform);

            let payload = MembershipEventPayload {
                user: Some("U1".to_string()),
                channel: Some(MONITORED.to_string()),
                event_ts: Some("1700000000.000100".to_string()),
            };
            let outcome = processor.ingest(MembershipEventKind::Joined, payload).await;

            assert!(matches!(outcome, Some(ProcessOutcome::Welcomed(_))));
        }

        #[tokio::test]
        async fn test_single_user_sequence_tracks_latest_transition() {
            let platform = Arc::new(RecordingPlatform::default());
            let processor = processor(platform);

            let sequence = [
                join("U1", MONITORED, "1"),
                leave("U1", MONITORED, "3"),
                join("U1", MONITORED, "2"),
                join("U1", MONITORED, "4"),
                leave("U1", MONITORED, "4"),
                join("U1", OTHER, "9"),
            ];
            for e in sequence {
                processor.process(e).await;
            }

            // latest accepted monitored transition is the join at ts=4
            assert!(processor.ledger().is_welcomed("U1"));
            assert_eq!(
                processor.ledger().last_seen("U1"),
                Some("4".parse().unwrap())
            );
        }

        #[tokio::test]
        async fn test_concurrent_deliveries_dispatch_once() {
            let platform = Arc::new(RecordingPlatform::default());
            let processor = Arc::new(processor(platform.clone()));

            let tasks: Vec<_> = (0..16)
                .map(|_| {
                    let processor = processor.clone();
                    tokio::spawn(async move { processor.process(join("U1", MONITORED, "100")).await })
                })
                .collect();
            for task in tasks {
                task.await.unwrap();
            }

            assert_eq!(platform.opened_for("U1"), 1);
        }
    }
}
