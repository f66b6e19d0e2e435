use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{claims::Principal, password::PasswordCodec},
    error::{AppError, AppResult},
    users::{
        dto::{CreateUserRequest, UpdateUserRequest},
        repo::{not_found, AccountStore},
        repo_types::{AccountChanges, ListFilter, NewAccount, Role, SafeAccount},
    },
};

/// Accounts idle for longer than this show up in the inactive report.
pub const INACTIVITY_WINDOW: Duration = Duration::days(30);

/// Authorization and field-mutation rules for accounts.
///
/// Every operation takes the acting [`Principal`] explicitly. All checks run
/// before the store is written, so a rejected call changes nothing.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    codec: PasswordCodec,
}

fn require_admin(principal: &Principal) -> AppResult<()> {
    if principal.is_admin() {
        Ok(())
    } else {
        warn!(user_id = %principal.id, "admin-only operation denied");
        Err(AppError::Forbidden(
            "You do not have permission to access this resource".into(),
        ))
    }
}

impl AccountService {
    pub fn new(store: Arc<dyn AccountStore>, codec: PasswordCodec) -> Self {
        Self { store, codec }
    }

    /// Self-registration. The role is always `USER`, whatever was sent.
    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register(&self, req: CreateUserRequest) -> AppResult<SafeAccount> {
        if req.role == Some(Role::Admin) {
            warn!("registration tried to claim admin role; forcing USER");
        }
        let account = self.create(req, Role::User).await?;
        info!(user_id = %account.id, "user registered");
        Ok(account)
    }

    /// Admin creation; the supplied role is honoured.
    #[instrument(skip(self, principal, req), fields(actor = %principal.id, email = %req.email))]
    pub async fn create_by_admin(
        &self,
        principal: &Principal,
        req: CreateUserRequest,
    ) -> AppResult<SafeAccount> {
        require_admin(principal)?;
        let role = req.role.unwrap_or_default();
        let account = self.create(req, role).await?;
        info!(user_id = %account.id, role = ?account.role, "user created by admin");
        Ok(account)
    }

    async fn create(&self, req: CreateUserRequest, role: Role) -> AppResult<SafeAccount> {
        if self.store.find_by_email(&req.email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".into()));
        }
        let password_hash = self.codec.hash_blocking(req.password).await?;
        // The store's unique constraint still decides races between writers.
        self.store
            .create(NewAccount {
                name: req.name,
                email: req.email,
                password_hash: Some(password_hash),
                role,
            })
            .await
    }

    #[instrument(skip(self, principal), fields(actor = %principal.id))]
    pub async fn list(
        &self,
        principal: &Principal,
        filter: ListFilter,
    ) -> AppResult<Vec<SafeAccount>> {
        require_admin(principal)?;
        self.store.list(filter).await
    }

    #[instrument(skip(self, principal), fields(actor = %principal.id))]
    pub async fn get(&self, principal: &Principal, id: Uuid) -> AppResult<SafeAccount> {
        require_admin(principal)?;
        self.store.find_by_id(id).await?.ok_or_else(|| not_found(id))
    }

    #[instrument(skip(self, principal), fields(actor = %principal.id))]
    pub async fn profile(&self, principal: &Principal) -> AppResult<SafeAccount> {
        self.store
            .find_by_id(principal.id)
            .await?
            .ok_or_else(|| not_found(principal.id))
    }

    /// Self-service update. A role in the request is dropped without error.
    #[instrument(skip(self, principal, req), fields(actor = %principal.id))]
    pub async fn update_profile(
        &self,
        principal: &Principal,
        mut req: UpdateUserRequest,
    ) -> AppResult<SafeAccount> {
        if req.role.take().is_some() && !principal.is_admin() {
            warn!(user_id = %principal.id, "ignoring role change on own profile");
        }
        self.update(principal, principal.id, req).await
    }

    /// Update through the admin route; non-admins are refused even for their
    /// own id.
    #[instrument(skip(self, principal, req), fields(actor = %principal.id, target = %target_id))]
    pub async fn update_by_admin(
        &self,
        principal: &Principal,
        target_id: Uuid,
        req: UpdateUserRequest,
    ) -> AppResult<SafeAccount> {
        require_admin(principal)?;
        self.update(principal, target_id, req).await
    }

    #[instrument(skip(self, principal, req), fields(actor = %principal.id, target = %target_id))]
    pub async fn update(
        &self,
        principal: &Principal,
        target_id: Uuid,
        req: UpdateUserRequest,
    ) -> AppResult<SafeAccount> {
        let is_self = principal.id == target_id;
        let is_admin = principal.is_admin();

        if !is_self && !is_admin {
            warn!("update of another account denied");
            return Err(AppError::Forbidden(
                "You do not have permission to update this user".into(),
            ));
        }

        let target = self
            .store
            .find_by_id(target_id)
            .await?
            .ok_or_else(|| not_found(target_id))?;

        let role = match req.role {
            Some(role) if is_admin => Some(role),
            Some(_) => {
                // Only reachable for a non-admin acting on their own account.
                warn!("non-admin role change dropped");
                None
            }
            None => None,
        };

        let password_hash = match req.password {
            Some(new_password) => {
                if is_self {
                    self.check_current_password(&target, req.current_password)
                        .await?;
                }
                Some(self.codec.hash_blocking(new_password).await?)
            }
            None => None,
        };

        let changes = AccountChanges {
            name: req.name,
            password_hash,
            role,
        };
        let password_changed = changes.password_hash.is_some();
        let updated = self.store.update(target_id, changes).await?;
        info!(role = ?updated.role, password_changed, "user updated");
        Ok(updated)
    }

    async fn check_current_password(
        &self,
        target: &SafeAccount,
        current: Option<String>,
    ) -> AppResult<()> {
        let Some(current) = current else {
            return Err(AppError::BadRequest(
                "Current password is required to change the password".into(),
            ));
        };
        let stored = self
            .store
            .find_by_email(&target.email)
            .await?
            .and_then(|a| a.password_hash);
        if !self.codec.verify_blocking(current, stored).await? {
            warn!(user_id = %target.id, "current password mismatch");
            return Err(AppError::BadRequest("Current password is incorrect".into()));
        }
        Ok(())
    }

    #[instrument(skip(self, principal), fields(actor = %principal.id))]
    pub async fn delete(&self, principal: &Principal, target_id: Uuid) -> AppResult<()> {
        require_admin(principal)?;
        if principal.id == target_id {
            return Err(AppError::BadRequest(
                "You cannot delete your own account through this route".into(),
            ));
        }
        self.store.delete(target_id).await?;
        info!(target = %target_id, "user deleted");
        Ok(())
    }

    pub async fn inactive(&self, principal: &Principal) -> AppResult<Vec<SafeAccount>> {
        self.inactive_at(principal, OffsetDateTime::now_utc()).await
    }

    /// Accounts last seen (or, if never seen, created) strictly before
    /// `now - INACTIVITY_WINDOW`.
    #[instrument(skip(self, principal), fields(actor = %principal.id))]
    pub async fn inactive_at(
        &self,
        principal: &Principal,
        now: OffsetDateTime,
    ) -> AppResult<Vec<SafeAccount>> {
        require_admin(principal)?;
        self.store.list_inactive(now - INACTIVITY_WINDOW).await
    }
}
