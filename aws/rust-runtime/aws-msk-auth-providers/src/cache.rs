/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Expiry-aware credential cache owned by an individual source.

use aws_credential_types::provider;
use aws_credential_types::Credentials;
use aws_smithy_async::time::SharedTimeSource;
use std::future::Future;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Credentials are reloaded this long before they actually expire.
pub(crate) const DEFAULT_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Read-mostly cache: readers take a shared lock, loads are serialized so that concurrent
/// callers wait for a single in-flight load instead of each calling the backend.
#[derive(Debug)]
pub(crate) struct ExpiringCache {
    value: RwLock<Option<Credentials>>,
    load: tokio::sync::Mutex<()>,
    buffer: Duration,
    time: SharedTimeSource,
}

impl ExpiringCache {
    pub(crate) fn new(buffer: Duration, time: SharedTimeSource) -> Self {
        Self {
            value: RwLock::new(None),
            load: tokio::sync::Mutex::new(()),
            buffer,
            time,
        }
    }

    fn fresh(&self) -> Option<Credentials> {
        let value = self.value.read().unwrap_or_else(PoisonError::into_inner);
        value.as_ref().filter(|creds| !self.expired(creds)).cloned()
    }

    fn expired(&self, credentials: &Credentials) -> bool {
        match credentials.expiry() {
            Some(expiry) => self.time.now() + self.buffer >= expiry,
            None => false,
        }
    }

    pub(crate) async fn get_or_load<F, Fut>(&self, loader: F) -> provider::Result
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = provider::Result>,
    {
        if let Some(credentials) = self.fresh() {
            return Ok(credentials);
        }
        let _loading = self.load.lock().await;
        // another caller may have finished a load while we waited for the lock
        if let Some(credentials) = self.fresh() {
            return Ok(credentials);
        }
        let credentials = loader().await?;
        tracing::debug!(expiry = ?credentials.expiry(), "caching loaded credentials");
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = Some(credentials.clone());
        Ok(credentials)
    }

    pub(crate) fn invalidate(&self) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[cfg(test)]
mod test {
    use super::{ExpiringCache, DEFAULT_EXPIRY_BUFFER};
    use aws_credential_types::provider::error::CredentialsError;
    use aws_credential_types::Credentials;
    use aws_smithy_async::test_util::ManualTimeSource;
    use aws_smithy_async::time::SharedTimeSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, UNIX_EPOCH};

    fn expiring(secs: u64) -> Credentials {
        Credentials::new(
            "AKID",
            "SECRET",
            Some("TOKEN".into()),
            Some(UNIX_EPOCH + Duration::from_secs(secs)),
            "test",
        )
    }

    #[tokio::test]
    async fn reuses_credentials_until_buffer() {
        let time = ManualTimeSource::new(UNIX_EPOCH);
        let cache = ExpiringCache::new(DEFAULT_EXPIRY_BUFFER, SharedTimeSource::new(time.clone()));
        let loads = &AtomicUsize::new(0);
        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(expiring(3600))
        };

        cache.get_or_load(load).await.expect("loaded");
        cache.get_or_load(load).await.expect("cached");
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        // inside the expiry buffer: reload
        time.advance(Duration::from_secs(3600 - 30));
        cache.get_or_load(load).await.expect("reloaded");
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let cache = ExpiringCache::new(DEFAULT_EXPIRY_BUFFER, SharedTimeSource::default());
        let loads = &AtomicUsize::new(0);
        let load = move || async move {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(Credentials::from_keys("AKID", "SECRET", None))
        };
        cache.get_or_load(load).await.expect("loaded");
        cache.invalidate();
        cache.get_or_load(load).await.expect("loaded");
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let cache = ExpiringCache::new(DEFAULT_EXPIRY_BUFFER, SharedTimeSource::default());
        cache
            .get_or_load(|| async { Err(CredentialsError::not_loaded("nope")) })
            .await
            .expect_err("failure");
        let creds = cache
            .get_or_load(|| async { Ok(Credentials::from_keys("AKID", "SECRET", None)) })
            .await
            .expect("second load");
        assert_eq!(creds.access_key_id(), "AKID");
    }
}
