use std::sync::Arc;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

use crate::config::PasswordConfig;

/// Hashes and verifies passwords with Argon2id at a fixed work factor.
#[derive(Clone)]
pub struct PasswordCodec {
    params: Params,
    /// Stand-in verified against when there is no stored hash, so a missing
    /// credential costs the same as a wrong one.
    dummy_hash: Arc<str>,
    #[cfg(test)]
    verifications: Arc<AtomicUsize>,
}

impl PasswordCodec {
    pub fn new(cfg: &PasswordConfig) -> anyhow::Result<Self> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| anyhow::anyhow!("invalid argon2 parameters: {}", e))?;
        let mut codec = Self {
            params,
            dummy_hash: Arc::from(""),
            #[cfg(test)]
            verifications: Arc::new(AtomicUsize::new(0)),
        };
        codec.dummy_hash = Arc::from(codec.hash("dummy-password")?);
        Ok(codec)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    pub fn hash(&self, plain: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                anyhow::anyhow!(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// An absent hash never verifies, but still runs a full Argon2 pass
    /// against the dummy hash. Parameters embedded in `hash` win over the
    /// configured ones, so older hashes keep working.
    pub fn verify(&self, plain: &str, hash: Option<&str>) -> anyhow::Result<bool> {
        let (stored, present) = match hash {
            Some(h) => (h, true),
            None => (&*self.dummy_hash, false),
        };
        let parsed = PasswordHash::new(stored).map_err(|e| {
            error!(error = %e, "argon2 parse hash error");
            anyhow::anyhow!(e.to_string())
        })?;
        #[cfg(test)]
        self.verifications.fetch_add(1, Ordering::SeqCst);
        let ok = self
            .argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok();
        Ok(ok && present)
    }

    /// Number of Argon2 verifications run by this codec and its clones.
    #[cfg(test)]
    pub(crate) fn verifications(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }

    /// Runs [`PasswordCodec::hash`] on the blocking pool.
    pub async fn hash_blocking(&self, plain: String) -> anyhow::Result<String> {
        let codec = self.clone();
        tokio::task::spawn_blocking(move || codec.hash(&plain)).await?
    }

    /// Runs [`PasswordCodec::verify`] on the blocking pool.
    pub async fn verify_blocking(
        &self,
        plain: String,
        hash: Option<String>,
    ) -> anyhow::Result<bool> {
        let codec = self.clone();
        tokio::task::spawn_blocking(move || codec.verify(&plain, hash.as_deref())).await?
    }
}

#[cfg(test)]
pub(crate) fn test_codec() -> PasswordCodec {
    PasswordCodec::new(&PasswordConfig {
        memory_kib: 64,
        iterations: 1,
        parallelism: 1,
    })
    .expect("test params are valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let codec = test_codec();
        let password = "Secur3P@ssw0rd!";
        let hash = codec.hash(password).expect("hashing should succeed");
        assert!(codec.verify(password, Some(&hash)).expect("verify should succeed"));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let codec = test_codec();
        let hash = codec.hash("correct-horse-battery-staple").expect("hashing should succeed");
        assert!(!codec
            .verify("wrong-password", Some(&hash))
            .expect("verify should not error"));
    }

    #[test]
    fn absent_hash_never_verifies() {
        let codec = test_codec();
        assert!(!codec.verify("anything", None).expect("no error for absent hash"));
        assert!(!codec.verify("", None).expect("no error for absent hash"));
        assert!(!codec
            .verify("dummy-password", None)
            .expect("no error for absent hash"));
    }

    #[test]
    fn absent_hash_still_runs_argon2() {
        let codec = test_codec();
        let before = codec.verifications();
        codec.verify("anything", None).unwrap();
        assert_eq!(codec.verifications(), before + 1);
    }

    #[test]
    fn same_password_hashes_differently() {
        let codec = test_codec();
        let a = codec.hash("Password1").unwrap();
        let b = codec.hash("Password1").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
    }

    #[test]
    fn verify_errors_on_malformed_hash() {
        let err = test_codec()
            .verify("anything", Some("not-a-valid-hash"))
            .unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn rejects_impossible_params() {
        let res = PasswordCodec::new(&PasswordConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(res.is_err());
    }

    #[tokio::test]
    async fn blocking_variants_agree() {
        let codec = test_codec();
        let hash = codec.hash_blocking("Password1".into()).await.unwrap();
        assert!(codec
            .verify_blocking("Password1".into(), Some(hash.clone()))
            .await
            .unwrap());
        assert!(!codec
            .verify_blocking("Password2".into(), Some(hash))
            .await
            .unwrap());
    }
}
