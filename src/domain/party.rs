//! Users, sharing groups, and categories.

use serde::{Deserialize, Serialize};

use super::{CategoryId, GroupId, UserId};

/// A registered user. Immutable as far as the ledger is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Login email, unique per user.
    pub email: String,
}

/// Role of a user inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    /// Creator of the group; may manage membership.
    Owner,
    /// Regular participant.
    Member,
}

impl MemberRole {
    /// Storage representation of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "OWNER",
            Self::Member => "MEMBER",
        }
    }

    /// Parses the storage representation; unknown values map to `Member`.
    #[must_use]
    pub fn from_storage(value: &str) -> Self {
        if value.eq_ignore_ascii_case("OWNER") {
            Self::Owner
        } else {
            Self::Member
        }
    }
}

/// A sharing group whose members split shared expenses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Group identifier.
    pub id: GroupId,
    /// Display name.
    pub name: String,
    /// Owning user.
    pub owner: UserId,
}

/// Membership of a user in a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    /// Group the membership belongs to.
    pub group: GroupId,
    /// Member user.
    pub user: UserId,
    /// Role inside the group.
    pub role: MemberRole,
}

/// A user-defined expense category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Category identifier.
    pub id: CategoryId,
    /// Owning user.
    pub owner: UserId,
    /// Display name.
    pub name: String,
}
