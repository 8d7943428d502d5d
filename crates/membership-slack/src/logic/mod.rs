//! Logic module for the Slack adapter
//!
//! Contains:
//! - SlackClient for making HTTP requests to Slack API
//! - SignatureVerifier for authenticating Events API requests

mod client;
mod signature;

pub use client::{SlackClient, SlackClientError};
pub use signature::{
    MAX_REQUEST_AGE_SECS, SIGNATURE_HEADER, SignatureError, SignatureVerifier, TIMESTAMP_HEADER,
};
