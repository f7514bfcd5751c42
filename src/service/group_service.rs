//! Group and category management.

use std::sync::Arc;

use crate::domain::{Category, CategoryId, Group, GroupId, GroupMember, MemberRole, UserId};
use crate::error::LedgerError;
use crate::persistence::LedgerStore;

/// Manages sharing groups, their memberships and per-user categories.
#[derive(Debug, Clone)]
pub struct GroupService {
    store: Arc<dyn LedgerStore>,
}

impl GroupService {
    /// Creates a new `GroupService`.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Creates a group owned by `owner`, who becomes its first member.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] for an empty name, or a
    /// store failure.
    pub async fn create_group(&self, owner: UserId, name: &str) -> Result<Group, LedgerError> {
        let name = non_empty(name, "group name")?;
        let group = Group {
            id: GroupId::new(),
            name,
            owner,
        };
        self.store.insert_group(&group).await?;
        tracing::info!(group_id = %group.id, %owner, "group created");
        Ok(group)
    }

    /// Members of a group `user` belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] if the group does not exist or
    /// `user` is not a member.
    pub async fn members(
        &self,
        user: UserId,
        group: GroupId,
    ) -> Result<Vec<GroupMember>, LedgerError> {
        let members = self.store.group_members(group).await?;
        if !members.iter().any(|m| m.user == user) {
            return Err(LedgerError::not_found("group", group));
        }
        Ok(members)
    }

    /// Adds `member` to a group owned by `owner`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the group or the user does not exist.
    /// - [`LedgerError::Forbidden`] if `owner` does not own the group.
    /// - [`LedgerError::InvalidRequest`] if `member` already belongs to it.
    pub async fn add_member(
        &self,
        owner: UserId,
        group: GroupId,
        member: UserId,
    ) -> Result<GroupMember, LedgerError> {
        self.owned_group(owner, group).await?;
        if self.store.find_user(member).await?.is_none() {
            return Err(LedgerError::not_found("user", member));
        }
        let members = self.store.group_members(group).await?;
        if members.iter().any(|m| m.user == member) {
            return Err(LedgerError::InvalidRequest(format!(
                "user {member} is already a member of group {group}"
            )));
        }

        let membership = GroupMember {
            group,
            user: member,
            role: MemberRole::Member,
        };
        self.store.insert_member(&membership).await?;
        tracing::info!(group_id = %group, user = %member, "member added");
        Ok(membership)
    }

    /// Removes `member` from a group owned by `owner`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the group or the membership does not
    ///   exist.
    /// - [`LedgerError::Forbidden`] if `owner` does not own the group.
    /// - [`LedgerError::InvalidRequest`] if the owner tries to leave.
    pub async fn remove_member(
        &self,
        owner: UserId,
        group: GroupId,
        member: UserId,
    ) -> Result<(), LedgerError> {
        self.owned_group(owner, group).await?;
        if member == owner {
            return Err(LedgerError::InvalidRequest(
                "the group owner cannot be removed".to_string(),
            ));
        }
        if !self.store.delete_member(group, member).await? {
            return Err(LedgerError::not_found("member", member));
        }
        tracing::info!(group_id = %group, user = %member, "member removed");
        Ok(())
    }

    /// Creates a category owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidRequest`] for an empty name, or a
    /// store failure.
    pub async fn create_category(
        &self,
        owner: UserId,
        name: &str,
    ) -> Result<Category, LedgerError> {
        let category = Category {
            id: CategoryId::new(),
            owner,
            name: non_empty(name, "category name")?,
        };
        self.store.insert_category(&category).await?;
        tracing::debug!(category_id = %category.id, %owner, "category created");
        Ok(category)
    }

    /// Categories owned by `owner`, ordered by name.
    ///
    /// # Errors
    ///
    /// Propagates store failures.
    pub async fn list_categories(&self, owner: UserId) -> Result<Vec<Category>, LedgerError> {
        self.store.categories_for(owner).await
    }

    async fn owned_group(&self, owner: UserId, id: GroupId) -> Result<Group, LedgerError> {
        let group = self
            .store
            .find_group(id)
            .await?
            .ok_or_else(|| LedgerError::not_found("group", id))?;
        if group.owner != owner {
            return Err(LedgerError::Forbidden(format!(
                "only the owner can manage members of group {id}"
            )));
        }
        Ok(group)
    }
}

fn non_empty(value: &str, what: &str) -> Result<String, LedgerError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidRequest(format!(
            "{what} must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::persistence::InMemoryStore;

    async fn setup() -> (Arc<InMemoryStore>, GroupService) {
        let store = Arc::new(InMemoryStore::new());
        let service = GroupService::new(Arc::<InMemoryStore>::clone(&store));
        (store, service)
    }

    #[tokio::test]
    async fn owner_is_first_member() {
        let (store, service) = setup().await;
        let owner = store.add_user("Ursula", "u@example.com").await;
        let group = assert_ok!(service.create_group(owner.id, " Flat ").await);
        assert_eq!(group.name, "Flat");

        let members = assert_ok!(service.members(owner.id, group.id).await);
        assert_eq!(members.len(), 1);
        assert!(members.iter().all(|m| m.role == MemberRole::Owner));
    }

    #[tokio::test]
    async fn only_owner_manages_members() {
        let (store, service) = setup().await;
        let owner = store.add_user("Ursula", "u@example.com").await;
        let v = store.add_user("Victor", "v@example.com").await;
        let w = store.add_user("Wanda", "w@example.com").await;
        let group = assert_ok!(service.create_group(owner.id, "Flat").await);

        assert_ok!(service.add_member(owner.id, group.id, v.id).await);
        let err = assert_err!(service.add_member(v.id, group.id, w.id).await);
        assert!(matches!(err, LedgerError::Forbidden(_)));
        let err = assert_err!(service.add_member(owner.id, group.id, v.id).await);
        assert!(matches!(err, LedgerError::InvalidRequest(_)));
        let err = assert_err!(service.add_member(owner.id, group.id, UserId::new()).await);
        assert!(matches!(err, LedgerError::NotFound { .. }));

        let err = assert_err!(service.members(w.id, group.id).await);
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn owner_cannot_leave() {
        let (store, service) = setup().await;
        let owner = store.add_user("Ursula", "u@example.com").await;
        let v = store.add_user("Victor", "v@example.com").await;
        let group = assert_ok!(service.create_group(owner.id, "Flat").await);
        assert_ok!(service.add_member(owner.id, group.id, v.id).await);

        assert_err!(service.remove_member(owner.id, group.id, owner.id).await);
        assert_ok!(service.remove_member(owner.id, group.id, v.id).await);
        let err = assert_err!(service.remove_member(owner.id, group.id, v.id).await);
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn categories_are_listed_by_name() {
        let (store, service) = setup().await;
        let owner = store.add_user("Ursula", "u@example.com").await;
        assert_ok!(service.create_category(owner.id, "Travel").await);
        assert_ok!(service.create_category(owner.id, "Food").await);
        assert_err!(service.create_category(owner.id, "  ").await);

        let names: Vec<String> = assert_ok!(service.list_categories(owner.id).await)
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Food".to_string(), "Travel".to_string()]);
    }
}
