//! Group invitations: issue, list, accept and decline.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::{
    Group, GroupId, GroupMember, Invite, InviteStatus, MemberRole, PendingInvite, UserId,
};
use crate::error::LedgerError;
use crate::persistence::LedgerStore;

/// Lets group members invite people by email and invitees answer.
///
/// The token is the only handle an invitee needs; acceptance still checks
/// that the accepting user owns the invited email.
#[derive(Debug, Clone)]
pub struct InviteService {
    store: Arc<dyn LedgerStore>,
}

impl InviteService {
    /// Creates a new `InviteService`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Invites `email` into `group` on behalf of `inviter`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the group does not exist.
    /// - [`LedgerError::Forbidden`] if `inviter` is not a member.
    /// - [`LedgerError::InvalidRequest`] for a malformed email, an email
    ///   that already belongs to a member, or an invite for the same email
    ///   that is still pending.
    pub async fn create(
        &self,
        inviter: UserId,
        group: GroupId,
        email: &str,
    ) -> Result<Invite, LedgerError> {
        if self.store.find_group(group).await?.is_none() {
            return Err(LedgerError::not_found("group", group));
        }
        let members = self.store.group_members(group).await?;
        if !members.iter().any(|m| m.user == inviter) {
            return Err(LedgerError::Forbidden(format!(
                "only members can invite to group {group}"
            )));
        }

        let invite = Invite::issue(group, inviter, email, Utc::now())?;
        if let Some(user) = self.store.find_user_by_email(&invite.invitee_email).await? {
            if members.iter().any(|m| m.user == user.id) {
                return Err(LedgerError::InvalidRequest(format!(
                    "{} is already a member of group {group}",
                    invite.invitee_email
                )));
            }
        }
        if !self.store.insert_invite(&invite).await? {
            return Err(LedgerError::InvalidRequest(format!(
                "an invite for {} is already pending",
                invite.invitee_email
            )));
        }
        tracing::info!(
            invite_id = %invite.id,
            group_id = %group,
            %inviter,
            expires_at = %invite.expires_at,
            "invite created"
        );
        Ok(invite)
    }

    /// Pending, unexpired invites addressed to `user`'s email, newest
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] for an unknown user.
    pub async fn pending_for(&self, user: UserId) -> Result<Vec<PendingInvite>, LedgerError> {
        let user = self
            .store
            .find_user(user)
            .await?
            .ok_or_else(|| LedgerError::not_found("user", user))?;
        self.store.pending_invites_for(&user.email, Utc::now()).await
    }

    /// Accepts the invite identified by `token` as `user`, who joins the
    /// group as a regular member.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] for an unknown token or user.
    /// - [`LedgerError::InvalidRequest`] if the invite was already settled,
    ///   has expired, or `user` is already a member.
    /// - [`LedgerError::Forbidden`] if the invite is for another email.
    pub async fn accept(&self, user: UserId, token: &str) -> Result<Group, LedgerError> {
        let invite = self.open_invite(user, token).await?;
        if invite.is_expired(Utc::now()) {
            return Err(LedgerError::InvalidRequest(format!(
                "invite {} has expired",
                invite.id
            )));
        }
        let members = self.store.group_members(invite.group).await?;
        if members.iter().any(|m| m.user == user) {
            return Err(LedgerError::InvalidRequest(format!(
                "user {user} is already a member of group {}",
                invite.group
            )));
        }

        let membership = GroupMember {
            group: invite.group,
            user,
            role: MemberRole::Member,
        };
        if !self.store.accept_invite(invite.id, &membership).await? {
            return Err(already_settled(&invite));
        }
        tracing::info!(invite_id = %invite.id, group_id = %invite.group, %user, "invite accepted");
        self.store
            .find_group(invite.group)
            .await?
            .ok_or_else(|| LedgerError::not_found("group", invite.group))
    }

    /// Declines the invite identified by `token` as `user`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] for an unknown token or user.
    /// - [`LedgerError::InvalidRequest`] if the invite was already settled.
    /// - [`LedgerError::Forbidden`] if the invite is for another email.
    pub async fn decline(&self, user: UserId, token: &str) -> Result<(), LedgerError> {
        let invite = self.open_invite(user, token).await?;
        if !self.store.reject_invite(invite.id).await? {
            return Err(already_settled(&invite));
        }
        tracing::info!(invite_id = %invite.id, %user, "invite declined");
        Ok(())
    }

    /// Loads a pending invite addressed to `user`.
    async fn open_invite(&self, user: UserId, token: &str) -> Result<Invite, LedgerError> {
        let invite = self
            .store
            .find_invite_by_token(token)
            .await?
            .ok_or_else(|| LedgerError::not_found("invite", "token"))?;
        if invite.status != InviteStatus::Pending {
            return Err(already_settled(&invite));
        }
        let account = self
            .store
            .find_user(user)
            .await?
            .ok_or_else(|| LedgerError::not_found("user", user))?;
        if !invite.is_for(&account.email) {
            return Err(LedgerError::Forbidden(format!(
                "invite {} is for a different email",
                invite.id
            )));
        }
        Ok(invite)
    }
}

fn already_settled(invite: &Invite) -> LedgerError {
    LedgerError::InvalidRequest(format!("invite {} was already answered", invite.id))
}
