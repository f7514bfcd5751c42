//! Type-safe entity identifiers.
//!
//! Every entity in the ledger is keyed by a newtype around [`uuid::Uuid`]
//! (v4) so that, for example, a [`UserId`] can never be passed where an
//! [`ExpenseId`] is expected.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Creates a new random identifier (UUID v4).
            #[must_use]
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Creates an identifier from an existing [`uuid::Uuid`].
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner [`uuid::Uuid`].
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for uuid::Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Identifier of a registered user.
    UserId
);
entity_id!(
    /// Identifier of an expense.
    ExpenseId
);
entity_id!(
    /// Identifier of one member's share of a shared expense.
    SplitId
);
entity_id!(
    /// Identifier of a scheduled installment.
    InstallmentId
);
entity_id!(
    /// Identifier of a recurring expense definition.
    RecurringId
);
entity_id!(
    /// Identifier of a sharing group.
    GroupId
);
entity_id!(
    /// Identifier of an expense category.
    CategoryId
);
entity_id!(
    /// Identifier of an income entry.
    IncomeId
);
entity_id!(
    /// Identifier of a group invitation.
    InviteId
);
