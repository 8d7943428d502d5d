//! Membership event processing
//!
//! Tracks who joined and left the monitored channel and welcomes each new
//! member exactly once:
//! - `types` holds the event model, timestamps and configuration
//! - `logic::ledger` is the in-memory de-duplication ledger
//! - `logic::dispatcher` sends the channel acknowledgment and onboarding DM
//! - `logic::processor` ties ingress validation, ledger and dispatch together
//!
//! The messaging platform is abstracted behind [`MessagingPlatform`] so the
//! Slack adapter (or a test double) can be plugged in.

pub mod logic;
pub mod types;

pub use logic::{
    DispatchFailure, DispatchReport, DispatchStep, JoinDecision, LeaveDecision, MembershipLedger,
    MembershipProcessor, MessagingError, MessagingPlatform, ProcessOutcome, WelcomeDispatcher,
};
pub use types::{
    EventTimestamp, LeaveOrdering, MembershipConfig, MembershipError, MembershipEvent,
    MembershipEventKind, MembershipEventPayload, MessageTemplate,
};
