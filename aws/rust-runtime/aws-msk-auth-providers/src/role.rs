/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Assume an IAM role through STS

use crate::cache::{ExpiringCache, DEFAULT_EXPIRY_BUFFER};
use crate::sts::{AssumeRoleError, AssumeRoleRequest, StsTokenExchange, TokenExchange};
use crate::sts::{DEFAULT_SESSION_DURATION, DEFAULT_STS_REGION};
use aws_credential_types::provider::{self, error::CredentialsError, future, ProvideCredentials};
use aws_msk_credential_types::error::{ProviderClosed, ReleaseError};
use aws_msk_credential_types::provider::{CredentialSource, ReleaseResources};
use aws_smithy_async::time::SharedTimeSource;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Session name used when none is configured.
pub const DEFAULT_ROLE_SESSION_NAME: &str = "aws-msk-iam-auth";

/// Temporary credentials for a role, assumed with the backend's ambient credentials
///
/// Credentials are cached until shortly before they expire and are then transparently
/// re-assumed. Concurrent callers share a single in-flight exchange. A rejected exchange (bad
/// ARN, trust policy, network) surfaces as a
/// [`CredentialsError::ProviderError`] whose source is an [`AssumeRoleError`].
///
/// The provider owns its STS client; [releasing](ReleaseResources::release) it drops the client
/// and the provider no longer produces credentials.
#[derive(Debug)]
pub struct AssumeRoleProvider {
    role_arn: String,
    session_name: String,
    region: String,
    duration: Duration,
    exchange: Mutex<Option<Arc<dyn TokenExchange>>>,
    cache: ExpiringCache,
}

impl AssumeRoleProvider {
    pub fn builder(role_arn: impl Into<String>) -> Builder {
        Builder {
            role_arn: role_arn.into(),
            session_name: None,
            region: None,
            duration: None,
            exchange: None,
            time_source: SharedTimeSource::default(),
        }
    }

    pub fn role_arn(&self) -> &str {
        &self.role_arn
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    fn exchange(&self) -> Result<Arc<dyn TokenExchange>, CredentialsError> {
        self.exchange
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ProviderClosed::new("AssumeRoleProvider").into())
    }

    async fn assume(&self, exchange: Arc<dyn TokenExchange>) -> provider::Result {
        tracing::debug!(role_arn = %self.role_arn, session_name = %self.session_name, "assuming role");
        let request = AssumeRoleRequest {
            role_arn: &self.role_arn,
            session_name: &self.session_name,
            duration: self.duration,
            base_credentials: None,
        };
        exchange.assume_role(request).await.map_err(|err| {
            CredentialsError::provider_error(AssumeRoleError::new(self.role_arn.clone(), err))
        })
    }

    async fn credentials(&self) -> provider::Result {
        let exchange = self.exchange()?;
        self.cache.get_or_load(|| self.assume(exchange)).await
    }
}

impl ProvideCredentials for AssumeRoleProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials())
    }
}

impl CredentialSource for AssumeRoleProvider {
    fn refresh(&self) {
        self.cache.invalidate();
    }
}

impl ReleaseResources for AssumeRoleProvider {
    fn release(&self) -> Result<(), ReleaseError> {
        let released = self
            .exchange
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            tracing::debug!(role_arn = %self.role_arn, "releasing assume role provider");
            self.cache.invalidate();
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Builder {
    role_arn: String,
    session_name: Option<String>,
    region: Option<String>,
    duration: Option<Duration>,
    exchange: Option<Arc<dyn TokenExchange>>,
    time_source: SharedTimeSource,
}

impl Builder {
    /// Session name for the assumed role, `aws-msk-iam-auth` by default
    pub fn session_name(mut self, session_name: impl Into<String>) -> Self {
        self.session_name = Some(session_name.into());
        self
    }

    /// Region of the STS endpoint, `aws-global` by default
    ///
    /// Ignored when a custom [`exchange`](Builder::exchange) is set.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn exchange(mut self, exchange: Arc<dyn TokenExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    pub fn time_source(mut self, time_source: SharedTimeSource) -> Self {
        self.time_source = time_source;
        self
    }

    pub fn build(self) -> AssumeRoleProvider {
        let region = self.region;
        let exchange = self.exchange.unwrap_or_else(|| {
            Arc::new(StsTokenExchange::new(
                region.unwrap_or_else(|| DEFAULT_STS_REGION.to_string()),
            ))
        });
        AssumeRoleProvider {
            role_arn: self.role_arn,
            session_name: self
                .session_name
                .unwrap_or_else(|| DEFAULT_ROLE_SESSION_NAME.to_string()),
            region: exchange.region().to_string(),
            duration: self.duration.unwrap_or(DEFAULT_SESSION_DURATION),
            exchange: Mutex::new(Some(exchange)),
            cache: ExpiringCache::new(DEFAULT_EXPIRY_BUFFER, self.time_source),
        }
    }
}
