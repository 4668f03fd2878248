//! Authentication messages — what the user is asked to sign.
//!
//! Every message embeds a timestamp so a signature captured in one session
//! cannot be replayed as fresh proof in another. A [`SigningRequest`] is built
//! once per attempt and the same instance is both sent to the wallet and kept
//! for display; nothing regenerates the text afterwards.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::BtcAddress;

/// A message to sign with a given address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningRequest {
    pub message: String,
    pub address: BtcAddress,
}

impl SigningRequest {
    pub fn new(message: impl Into<String>, address: BtcAddress) -> Self {
        Self {
            message: message.into(),
            address,
        }
    }

    /// Request for the sign-in signature taken right after connecting.
    pub fn authentication(address: &BtcAddress, at: DateTime<Utc>) -> Self {
        Self::new(generate_auth_message(at), address.clone())
    }

    /// Request for an explicit proof-of-ownership signature.
    pub fn ownership(address: &BtcAddress, at: DateTime<Utc>) -> Self {
        Self::new(generate_ownership_message(address, at), address.clone())
    }
}

/// `2024-05-01T12:00:00.000Z`: millisecond precision, `Z` suffix.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Sign-in message used during connect.
pub fn generate_auth_message(at: DateTime<Utc>) -> String {
    format!(
        "Sign this message to authenticate with our Bitcoin app\nTimestamp: {}",
        format_timestamp(at)
    )
}

/// Ownership message used by an explicit sign action.
pub fn generate_ownership_message(address: &BtcAddress, at: DateTime<Utc>) -> String {
    format!("Verify ownership of {} at {}", address, format_timestamp(at))
}
