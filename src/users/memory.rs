use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::AppResult;
use crate::users::repo::{email_taken, not_found, AccountStore};
use crate::users::repo_types::{
    Account, AccountChanges, ListFilter, NewAccount, Role, SafeAccount, SortField, SortOrder,
};

/// In-process store with the same contract as the Postgres one.
#[derive(Default)]
pub struct MemoryAccountStore {
    rows: RwLock<HashMap<Uuid, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn password_hash(&self, id: Uuid) -> Option<String> {
        self.rows
            .read()
            .await
            .get(&id)
            .and_then(|a| a.password_hash.clone())
    }

    /// Rewrites timestamps so inactivity can be exercised.
    pub async fn backdate(
        &self,
        id: Uuid,
        created_at: OffsetDateTime,
        last_login_at: Option<OffsetDateTime>,
    ) {
        if let Some(row) = self.rows.write().await.get_mut(&id) {
            row.created_at = created_at;
            row.last_login_at = last_login_at;
        }
    }
}

fn compare(a: &Account, b: &Account, field: SortField) -> Ordering {
    match field {
        SortField::Name => a.name.cmp(&b.name),
        SortField::Email => a.email.cmp(&b.email),
        SortField::Role => role_rank(a).cmp(&role_rank(b)),
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::LastLoginAt => a.last_login_at.cmp(&b.last_login_at),
    }
}

// Matches the declaration order of the Postgres enum.
fn role_rank(a: &Account) -> u8 {
    match a.role {
        Role::Admin => 0,
        Role::User => 1,
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn create(&self, new: NewAccount) -> AppResult<SafeAccount> {
        let mut rows = self.rows.write().await;
        if rows.values().any(|a| a.email == new.email) {
            return Err(email_taken());
        }
        let now = OffsetDateTime::now_utc();
        let account = Account {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        rows.insert(account.id, account.clone());
        Ok(account.into())
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<SafeAccount>> {
        Ok(self.rows.read().await.get(&id).cloned().map(SafeAccount::from))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<Account>> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn list(&self, filter: ListFilter) -> AppResult<Vec<SafeAccount>> {
        let mut rows: Vec<Account> = self
            .rows
            .read()
            .await
            .values()
            .filter(|a| filter.role.map_or(true, |r| a.role == r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            let primary = compare(a, b, filter.sort_by);
            let primary = match filter.order {
                SortOrder::Asc => primary,
                SortOrder::Desc => primary.reverse(),
            };
            primary.then_with(|| a.id.cmp(&b.id))
        });
        Ok(rows.into_iter().map(SafeAccount::from).collect())
    }

    async fn list_inactive(&self, cutoff: OffsetDateTime) -> AppResult<Vec<SafeAccount>> {
        let mut rows: Vec<SafeAccount> = self
            .rows
            .read()
            .await
            .values()
            .cloned()
            .map(SafeAccount::from)
            .filter(|a| a.is_inactive(cutoff))
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn update(&self, id: Uuid, changes: AccountChanges) -> AppResult<SafeAccount> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&id).ok_or_else(|| not_found(id))?;
        if let Some(name) = changes.name {
            row.name = name;
        }
        if let Some(hash) = changes.password_hash {
            row.password_hash = Some(hash);
        }
        if let Some(role) = changes.role {
            row.role = role;
        }
        row.updated_at = OffsetDateTime::now_utc();
        Ok(row.clone().into())
    }

    async fn record_login(&self, id: Uuid, at: OffsetDateTime) -> AppResult<()> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&id).ok_or_else(|| not_found(id))?;
        row.last_login_at = Some(at);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> AppResult<()> {
        self.rows
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn new_account(name: &str, email: &str, role: Role) -> NewAccount {
        NewAccount {
            name: name.into(),
            email: email.into(),
            password_hash: Some("hash".into()),
            role,
        }
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = MemoryAccountStore::new();
        store.create(new_account("A", "a@x.com", Role::User)).await.unwrap();
        let err = store
            .create(new_account("B", "a@x.com", Role::User))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.count().await, 1);
    }

    #[tokio::test]
    async fn lists_filter_and_sort() {
        let store = MemoryAccountStore::new();
        store.create(new_account("Carla", "c@x.com", Role::User)).await.unwrap();
        store.create(new_account("Ana", "a@x.com", Role::Admin)).await.unwrap();
        store.create(new_account("Bia", "b@x.com", Role::User)).await.unwrap();

        let users = store
            .list(ListFilter {
                role: Some(Role::User),
                sort_by: SortField::Name,
                order: SortOrder::Desc,
            })
            .await
            .unwrap();
        let names: Vec<_> = users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["Carla", "Bia"]);
    }

    #[tokio::test]
    async fn update_and_delete_unknown_ids_are_not_found() {
        let store = MemoryAccountStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.update(id, AccountChanges::default()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(store.delete(id).await, Err(AppError::NotFound(_))));
    }
}
