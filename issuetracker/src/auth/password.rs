//! Password hashing and verification.
//!
//! The free functions are the synchronous Argon2id primitives. [`CredentialStore`]
//! wraps them for use from async handlers: work runs on the blocking pool, at most
//! `max_concurrent_hashes` at a time, and lookups for unknown users still pay for
//! one verification.

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{instrument, trace};

use crate::config::PasswordConfig;
use crate::errors::Error;

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    /// Create Argon2 instance with these parameters.
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

impl Default for Argon2Params {
    /// Secure defaults for production (Argon2id RFC recommendations)
    fn default() -> Self {
        Self {
            memory_kib: 19456, // 19 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Hash a password into a PHC string carrying its own salt and cost parameters.
pub fn hash_password(password: &str, params: Argon2Params) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = params.to_argon2()?;

    let hash = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| Error::Internal {
        operation: format!("hash password: {e}"),
    })?;

    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
///
/// Verification uses the parameters embedded in the hash itself, and the final
/// comparison is constant-time. The stored hash is never rewritten.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, Error> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| Error::Internal {
        operation: format!("parse hash: {e}"),
    })?;

    let argon2 = Argon2::default();
    Ok(argon2.verify_password(password.as_bytes(), &parsed_hash).is_ok())
}

/// Async front for password hashing, shared by every request.
#[derive(Debug)]
pub struct CredentialStore {
    params: Argon2Params,
    permits: Arc<Semaphore>,
    /// Verified against when the user does not exist
    dummy_hash: String,
}

impl CredentialStore {
    pub fn new(params: Argon2Params, max_concurrent_hashes: usize) -> Result<Self, Error> {
        let dummy_hash = hash_password("issuetracker-dummy-password", params)?;
        Ok(Self {
            params,
            permits: Arc::new(Semaphore::new(max_concurrent_hashes)),
            dummy_hash,
        })
    }

    pub fn from_config(config: &PasswordConfig) -> Result<Self, Error> {
        Self::new(config.argon2_params(), config.max_concurrent_hashes)
    }

    /// Hash a password on the blocking pool.
    #[instrument(skip_all)]
    pub async fn hash(&self, password: String) -> Result<String, Error> {
        let params = self.params;
        self.run_blocking(move || hash_password(&password, params)).await
    }

    /// Verify a password on the blocking pool.
    ///
    /// With no stored hash (unknown user) the dummy hash is verified instead and
    /// the result is always `false`.
    #[instrument(skip_all, fields(known_user = stored_hash.is_some()))]
    pub async fn verify(&self, password: String, stored_hash: Option<String>) -> Result<bool, Error> {
        let known_user = stored_hash.is_some();
        let hash = stored_hash.unwrap_or_else(|| self.dummy_hash.clone());

        let matched = self.run_blocking(move || verify_password(&password, &hash)).await?;
        Ok(known_user && matched)
    }

    async fn run_blocking<T, F>(&self, work: F) -> Result<T, Error>
    where
        F: FnOnce() -> Result<T, Error> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self.permits.clone().acquire_owned().await.map_err(|e| Error::Internal {
            operation: format!("acquire hashing permit: {e}"),
        })?;
        trace!(available = self.permits.available_permits(), "Acquired hashing permit");

        // The permit lives as long as the hash itself, even if the caller is dropped
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work()
        })
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password task: {e}"),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fast_params() -> Argon2Params {
        Argon2Params {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_password_hashing() {
        let password = "correct horse battery staple";
        let hash = hash_password(password, fast_params()).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_same_input_different_hashes() {
        let password = "same_password";

        let hash1 = hash_password(password, fast_params()).unwrap();
        let hash2 = hash_password(password, fast_params()).unwrap();

        // Same input should produce different hashes due to salt
        assert_ne!(hash1, hash2);

        // But both should verify correctly
        assert!(verify_password(password, &hash1).unwrap());
        assert!(verify_password(password, &hash2).unwrap());
    }

    #[test]
    fn test_verify_uses_params_embedded_in_hash() {
        let hash = hash_password("password", Argon2Params::default()).unwrap();
        assert!(hash.contains("m=19456,t=2,p=1"));
        assert!(verify_password("password", &hash).unwrap());
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        assert!(verify_password("password", "not-a-phc-string").is_err());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = Argon2Params {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(hash_password("password", params).is_err());
    }

    #[tokio::test]
    async fn test_credential_store_round_trip() {
        let store = CredentialStore::new(fast_params(), 2).unwrap();

        let hash = store.hash("hunter22".to_string()).await.unwrap();
        assert!(store.verify("hunter22".to_string(), Some(hash.clone())).await.unwrap());
        assert!(!store.verify("hunter23".to_string(), Some(hash)).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_user_never_verifies() {
        let store = CredentialStore::new(fast_params(), 1).unwrap();

        // Even the dummy password itself must not authenticate a missing user
        assert!(!store.verify("issuetracker-dummy-password".to_string(), None).await.unwrap());
        assert!(!store.verify("anything".to_string(), None).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_hashing_is_bounded_but_completes() {
        let store = Arc::new(CredentialStore::new(fast_params(), 1).unwrap());

        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.hash(format!("password-{i}")).await })
            })
            .collect();

        for (i, task) in futures::future::join_all(tasks).await.into_iter().enumerate() {
            let hash = task.unwrap().unwrap();
            assert!(verify_password(&format!("password-{i}"), &hash).unwrap());
        }
        assert_eq!(store.permits.available_permits(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_cancelled_callers_do_not_lift_the_bound() {
        let store = Arc::new(CredentialStore::new(fast_params(), 1).unwrap());
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        // Each caller gives up (client disconnect) while its hash is still queued or running
        for _ in 0..4 {
            let (store, running, peak) = (store.clone(), running.clone(), peak.clone());
            let caller = tokio::spawn(async move {
                store
                    .run_blocking(move || {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(300));
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            });
            tokio::time::sleep(Duration::from_millis(50)).await;
            caller.abort();
            assert!(caller.await.unwrap_err().is_cancelled());
        }

        // Wait for the detached hash to finish and hand its permit back
        drop(store.permits.acquire().await.unwrap());
        assert!(peak.load(Ordering::SeqCst) <= 1, "hashes ran concurrently past the bound");
        assert_eq!(running.load(Ordering::SeqCst), 0);

        let hash = store.hash("still-works".to_string()).await.unwrap();
        assert!(verify_password("still-works", &hash).unwrap());
    }
}
