use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::{
    auth::{
        claims::Principal,
        dto::{LoginResponse, PublicUser},
        jwt::SessionIssuer,
        password::PasswordCodec,
    },
    error::{AppError, AppResult},
    users::{repo::AccountStore, repo_types::SafeAccount},
};

const INVALID_CREDENTIALS: &str = "Invalid credentials";

/// Turns presented credentials into an authenticated principal.
#[derive(Clone)]
pub struct AuthGate {
    store: Arc<dyn AccountStore>,
    codec: PasswordCodec,
    sessions: SessionIssuer,
}

impl AuthGate {
    pub fn new(store: Arc<dyn AccountStore>, codec: PasswordCodec, sessions: SessionIssuer) -> Self {
        Self {
            store,
            codec,
            sessions,
        }
    }

    /// Email + password. Unknown email and wrong password fail identically,
    /// and both pay for one Argon2 verification.
    #[instrument(skip(self, password))]
    pub async fn password_grant(&self, email: &str, password: &str) -> AppResult<SafeAccount> {
        let Some(account) = self.store.find_by_email(email).await? else {
            self.codec
                .verify_blocking(password.to_string(), None)
                .await?;
            warn!("login unknown email");
            return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.into()));
        };

        let ok = self
            .codec
            .verify_blocking(password.to_string(), account.password_hash.clone())
            .await?;
        if !ok {
            warn!(user_id = %account.id, "login invalid password");
            return Err(AppError::Unauthenticated(INVALID_CREDENTIALS.into()));
        }

        Ok(account.into())
    }

    /// Bearer token. Fails with `Unauthenticated` unless the token is valid
    /// and its subject still exists.
    pub async fn token_grant(&self, token: &str) -> AppResult<Principal> {
        let principal: Principal = self.sessions.verify(token).await?.into();
        debug!(
            user_id = %principal.id,
            email = %principal.email,
            name = %principal.name,
            role = ?principal.role,
            "request authenticated"
        );
        Ok(principal)
    }

    /// Password grant followed by session issue.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginResponse> {
        let account = self.password_grant(email, password).await?;
        let access_token = self.sessions.issue(&account).await?;
        info!(user_id = %account.id, "user logged in");
        Ok(LoginResponse {
            access_token,
            user: PublicUser::from(account),
        })
    }
}
