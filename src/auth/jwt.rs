use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, instrument, warn};

use crate::{
    auth::claims::Claims,
    config::JwtConfig,
    error::{AppError, AppResult},
    users::{repo::AccountStore, repo_types::SafeAccount},
};

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::from_secs(cfg.ttl_minutes.max(1).unsigned_abs().saturating_mul(60)),
        }
    }

    pub fn sign(&self, account: &SafeAccount) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = TimeDuration::try_from(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .context("token expiry out of range")?;
        let claims = Claims {
            sub: account.id,
            email: account.email.clone(),
            role: account.role,
            name: account.name.clone(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %account.id, "jwt signed");
        Ok(token)
    }

    /// Checks signature, expiry, issuer and audience.
    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims)
    }
}

/// Mints session tokens and re-validates them against the account store.
#[derive(Clone)]
pub struct SessionIssuer {
    keys: JwtKeys,
    store: Arc<dyn AccountStore>,
}

impl SessionIssuer {
    pub fn new(keys: JwtKeys, store: Arc<dyn AccountStore>) -> Self {
        Self { keys, store }
    }

    /// Signs a token for `account` and stamps its `last_login_at`.
    #[instrument(skip(self, account), fields(user_id = %account.id))]
    pub async fn issue(&self, account: &SafeAccount) -> AppResult<String> {
        self.store
            .record_login(account.id, OffsetDateTime::now_utc())
            .await?;
        let token = self.keys.sign(account)?;
        Ok(token)
    }

    /// Fails with `Unauthenticated` on a bad signature, expiry, or when the
    /// subject no longer exists.
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> AppResult<Claims> {
        let claims = self.keys.verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::Unauthenticated("Invalid or expired token".into())
        })?;

        if self.store.find_by_id(claims.sub).await?.is_none() {
            warn!(user_id = %claims.sub, "token subject no longer exists");
            return Err(AppError::Unauthenticated(
                "Token user no longer exists".into(),
            ));
        }

        Ok(claims)
    }
}
