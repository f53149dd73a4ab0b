/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Release of resource-holding credential sources

use aws_msk_credential_types::provider::ReleaseResources;
use std::borrow::Cow;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Releases every registered source exactly once
///
/// A failure to release one source is logged and does not stop the remaining sources from being
/// released.
#[derive(Default)]
pub struct LifecycleManager {
    resources: Vec<(Cow<'static, str>, Arc<dyn ReleaseResources>)>,
    closed: AtomicBool,
}

impl Debug for LifecycleManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleManager")
            .field(
                "resources",
                &self.resources.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        resource: Arc<dyn ReleaseResources>,
    ) {
        self.resources.push((name.into(), resource));
    }

    /// Release all registered sources. Later calls do nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for (name, resource) in &self.resources {
            match resource.release() {
                Ok(()) => tracing::debug!(provider = %name, "closed credential provider"),
                Err(err) => {
                    tracing::warn!(provider = %name, error = %err, "Error closing credential provider")
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use crate::lifecycle::LifecycleManager;
    use crate::test_util::FakeResource;
    use std::sync::Arc;
    use tracing_test::traced_test;

    #[test]
    fn closes_each_resource_once() {
        let first = Arc::new(FakeResource::default());
        let second = Arc::new(FakeResource::default());
        let mut manager = LifecycleManager::new();
        manager.register("first", first.clone());
        manager.register("second", second.clone());

        manager.close();
        manager.close();
        assert_eq!(first.releases(), 1);
        assert_eq!(second.releases(), 1);
    }

    #[traced_test]
    #[test]
    fn failure_does_not_stop_remaining_releases() {
        let broken = Arc::new(FakeResource::failing());
        let healthy = Arc::new(FakeResource::default());
        let mut manager = LifecycleManager::new();
        manager.register("broken", broken.clone());
        manager.register("healthy", healthy.clone());

        manager.close();
        assert_eq!(broken.releases(), 1);
        assert_eq!(healthy.releases(), 1);
        assert!(logs_contain("Error closing credential provider"));
        assert!(logs_contain("connection reset"));
    }

    #[traced_test]
    #[test]
    fn close_after_close_releases_nothing() {
        let resource = Arc::new(FakeResource::default());
        let mut manager = LifecycleManager::new();
        manager.register("only", resource.clone());
        manager.close();
        manager.close();
        assert_eq!(resource.releases(), 1);
        assert!(logs_contain("closed credential provider"));
        assert!(format!("{:?}", manager).contains("closed: true"));
    }
}
