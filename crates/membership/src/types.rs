//! Membership event model
//!
//! Defines the events handed to the processor, the timestamp ordering used
//! for de-duplication, and the processor configuration.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

pub const USER_ID_PLACEHOLDER: &str = "{user_id}";

pub const DEFAULT_WELCOME_TEMPLATE: &str = "<@{user_id}> Welcome to the BTD Tech Community :tada:! \
Check your DMs to see the onboarding message I sent to you and then please provide a formal \
introduction in the #introductions channel!";

pub const DEFAULT_ONBOARDING_TEMPLATE: &str = "Hello <@{user_id}>, Beyond the Dome (BTD) is the \
preeminent career development program that provides the platform for College of Arts and Letters \
students to explore a range of potential career paths while creating access, exposure, and \
opportunities to break into their desired career industry. Please go to this link \
https://al.nd.edu/careers/ to learn more about!\n\n Anyways.. What is the BTD Tech Career \
Community? Well, we are a subset of BTD that establishes a community of Arts and Letters students \
who are more tech-focused and desire to break into the tech-industry. Our mission is to assist in \
paving your tech-oriented career path through different resources like tech info sessions, \
events, internship opportunities and certainly a centralized hub like our Slack Workspace! So I \
highly encourage you to be involved in the community! Thank you and Toodles! ";

pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors raised while turning an inbound notification into a [`MembershipEvent`]
#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("malformed membership event: `{field}` {reason}")]
    MalformedEvent { field: &'static str, reason: String },
}

/// Failure to parse an event timestamp
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid event timestamp {value:?}: {reason}")]
pub struct TimestampParseError {
    value: String,
    reason: &'static str,
}

/// Ordinal event timestamp
///
/// Slack sends `event_ts` as `"<seconds>.<fraction>"`. Comparison is numeric on
/// the seconds and the fraction normalised to nanoseconds, so `"100.5"` sorts
/// after `"100.25"` and `"99"` before `"100"`. The string as received is kept
/// for display.
#[derive(Debug, Clone)]
pub struct EventTimestamp {
    seconds: u64,
    nanos: u32,
    raw: String,
}

const FRACTION_DIGITS: usize = 9;

impl EventTimestamp {
    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn key(&self) -> (u64, u32) {
        (self.seconds, self.nanos)
    }
}

impl FromStr for EventTimestamp {
    type Err = TimestampParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| TimestampParseError {
            value: s.to_string(),
            reason,
        };

        let raw = s.trim();
        let (whole, fraction) = match raw.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (raw, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("seconds must be decimal digits"));
        }
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("fraction must be decimal digits"));
        }
        if fraction.len() > FRACTION_DIGITS {
            return Err(invalid("fraction has more than nine digits"));
        }

        let seconds = whole
            .parse::<u64>()
            .map_err(|_| invalid("seconds out of range"))?;
        let nanos = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", fraction, width = FRACTION_DIGITS);
            padded
                .parse::<u32>()
                .map_err(|_| invalid("fraction out of range"))?
        };

        Ok(Self {
            seconds,
            nanos,
            raw: raw.to_string(),
        })
    }
}

impl fmt::Display for EventTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for EventTimestamp {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for EventTimestamp {}

impl PartialOrd for EventTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for EventTimestamp {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipEventKind {
    Joined,
    Left,
}

impl fmt::Display for MembershipEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipEventKind::Joined => f.write_str("joined"),
            MembershipEventKind::Left => f.write_str("left"),
        }
    }
}

/// Raw membership notification fields as delivered by an event source
///
/// Every field is optional here; [`MembershipEvent::from_payload`] enforces
/// presence.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MembershipEventPayload {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub event_ts: Option<String>,
}

/// A validated join or leave notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipEvent {
    pub user_id: String,
    pub channel_id: String,
    pub kind: MembershipEventKind,
    pub event_ts: EventTimestamp,
}

impl MembershipEvent {
    pub fn new(
        kind: MembershipEventKind,
        user_id: impl Into<String>,
        channel_id: impl Into<String>,
        event_ts: EventTimestamp,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            channel_id: channel_id.into(),
            kind,
            event_ts,
        }
    }

    pub fn from_payload(
        kind: MembershipEventKind,
        payload: MembershipEventPayload,
    ) -> Result<Self, MembershipError> {
        let user_id = required("user", payload.user)?;
        let channel_id = required("channel", payload.channel)?;
        let raw_ts = required("event_ts", payload.event_ts)?;
        let event_ts = raw_ts
            .parse::<EventTimestamp>()
            .map_err(|e| MembershipError::MalformedEvent {
                field: "event_ts",
                reason: e.to_string(),
            })?;

        Ok(Self {
            user_id,
            channel_id,
            kind,
            event_ts,
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> Result<String, MembershipError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(MembershipError::MalformedEvent {
            field,
            reason: "is empty".to_string(),
        }),
        None => Err(MembershipError::MalformedEvent {
            field,
            reason: "is missing".to_string(),
        }),
    }
}

/// How leave events interact with the per-user watermark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeaveOrdering {
    /// Leaves older than the watermark are stale; accepted leaves advance it.
    #[default]
    Watermarked,
    /// Leaves are applied regardless of their timestamp and never move the
    /// watermark.
    Unordered,
}

impl FromStr for LeaveOrdering {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "watermarked" => Ok(LeaveOrdering::Watermarked),
            "unordered" => Ok(LeaveOrdering::Unordered),
            other => Err(format!(
                "unknown leave ordering {other:?}, expected 'watermarked' or 'unordered'"
            )),
        }
    }
}

impl fmt::Display for LeaveOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LeaveOrdering::Watermarked => f.write_str("watermarked"),
            LeaveOrdering::Unordered => f.write_str("unordered"),
        }
    }
}

/// Message text with `{user_id}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate(String);

impl MessageTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self(template.into())
    }

    pub fn render(&self, user_id: &str) -> String {
        self.0.replace(USER_ID_PLACEHOLDER, user_id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Configuration for the membership processor
#[derive(Debug, Clone)]
pub struct MembershipConfig {
    /// Channel whose join/leave events drive onboarding
    pub monitored_channel_id: String,
    /// Public acknowledgment posted in the monitored channel
    pub welcome_template: MessageTemplate,
    /// Private onboarding text sent as a direct message
    pub onboarding_template: MessageTemplate,
    /// Upper bound for each outbound platform call
    pub dispatch_timeout: Duration,
    pub leave_ordering: LeaveOrdering,
}

impl MembershipConfig {
    pub fn new(monitored_channel_id: impl Into<String>) -> Self {
        Self {
            monitored_channel_id: monitored_channel_id.into(),
            welcome_template: MessageTemplate::new(DEFAULT_WELCOME_TEMPLATE),
            onboarding_template: MessageTemplate::new(DEFAULT_ONBOARDING_TEMPLATE),
            dispatch_timeout: DEFAULT_DISPATCH_TIMEOUT,
            leave_ordering: LeaveOrdering::default(),
        }
    }
}
