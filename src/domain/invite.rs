//! Group invitations addressed to an email.
//!
//! An invite carries a random token, stays pending for
//! [`INVITE_TTL_DAYS`] days, and is settled exactly once: accepted (the
//! invitee becomes a member) or declined.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{GroupId, InviteId, UserId};
use crate::error::LedgerError;

/// Days an invite stays valid after it is issued.
pub const INVITE_TTL_DAYS: i64 = 7;

/// Lifecycle state of an invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InviteStatus {
    /// Waiting for the invitee.
    Pending,
    /// The invitee joined the group.
    Accepted,
    /// The invitee declined.
    Rejected,
}

impl InviteStatus {
    /// Storage representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Parses the storage representation.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Internal`] for an unknown value.
    pub fn from_storage(value: &str) -> Result<Self, LedgerError> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" => Ok(Self::Accepted),
            "REJECTED" => Ok(Self::Rejected),
            other => Err(LedgerError::Internal(format!(
                "unknown invite status {other}"
            ))),
        }
    }
}

/// An invitation of an email address into a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    /// Invite identifier.
    pub id: InviteId,
    /// Target group.
    pub group: GroupId,
    /// Member who sent the invite.
    pub inviter: UserId,
    /// Invitee email, lowercased.
    pub invitee_email: String,
    /// Secret used to accept or decline.
    pub token: String,
    /// Lifecycle state.
    pub status: InviteStatus,
    /// Issue time.
    pub created_at: DateTime<Utc>,
    /// Pending invites cannot be accepted after this instant.
    pub expires_at: DateTime<Utc>,
}

/// A pending invite with the names shown to the invitee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingInvite {
    /// The invite.
    pub invite: Invite,
    /// Name of the target group.
    pub group_name: String,
    /// Name of the inviter, empty when unknown.
    pub inviter_name: String,
}

impl Invite {
    /// Issues a pending invite at `now` with a fresh token.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] if `email` is not an email
    /// address.
    pub fn issue(
        group: GroupId,
        inviter: UserId,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        Ok(Self {
            id: InviteId::new(),
            group,
            inviter,
            invitee_email: normalize_email(email)?,
            token: new_token(),
            status: InviteStatus::Pending,
            created_at: now,
            expires_at: now + TimeDelta::days(INVITE_TTL_DAYS),
        })
    }

    /// Returns `true` once the invite can no longer be accepted.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Returns `true` if `email` is the invitee's address.
    #[must_use]
    pub fn is_for(&self, email: &str) -> bool {
        self.invitee_email.eq_ignore_ascii_case(email.trim())
    }
}

/// Trims and lowercases an email address.
///
/// # Errors
///
/// Returns [`LedgerError::InvalidRequest`] when the value has no local
/// part or no domain.
pub fn normalize_email(email: &str) -> Result<String, LedgerError> {
    let email = email.trim().to_ascii_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(LedgerError::InvalidRequest(format!(
            "{email:?} is not an email address"
        ))),
    }
}

/// 64 hex characters carrying 244 random bits.
fn new_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
