//! Logic module for membership processing
//!
//! Contains:
//! - MembershipLedger for per-user watermarks and the welcomed set
//! - WelcomeDispatcher and the MessagingPlatform seam
//! - MembershipProcessor, the entry point used by event sources

mod dispatcher;
mod ledger;
mod processor;

pub use dispatcher::{
    DispatchFailure, DispatchReport, DispatchStep, MessagingError, MessagingPlatform,
    WelcomeDispatcher,
};
pub use ledger::{JoinDecision, LeaveDecision, MembershipLedger};
pub use processor::{MembershipProcessor, ProcessOutcome};
