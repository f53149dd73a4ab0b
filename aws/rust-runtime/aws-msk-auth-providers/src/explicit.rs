/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Explicitly configured credential sources

use crate::options::SourceSpec;
use crate::profile::ProfileCredentialsProvider;
use crate::role::AssumeRoleProvider;
use crate::sts::TokenExchange;
use aws_msk_credential_types::provider::{
    CredentialSource, ReleaseResources, SharedCredentialSource,
};
use aws_types::os_shim_internal::{Env, Fs};
use std::borrow::Cow;
use std::fmt;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// A named source for the front of the chain
///
/// Sources built with [`owning`](ExplicitSource::owning) hold resources and are released when
/// the owning [`MskCredentialsProvider`](crate::MskCredentialsProvider) is closed.
#[derive(Clone)]
pub struct ExplicitSource {
    name: Cow<'static, str>,
    provider: SharedCredentialSource,
    resources: Option<Arc<dyn ReleaseResources>>,
}

impl Debug for ExplicitSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplicitSource")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("owns_resources", &self.resources.is_some())
            .finish()
    }
}

impl ExplicitSource {
    /// A source that holds nothing to release
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        provider: impl CredentialSource + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            provider: SharedCredentialSource::new(provider),
            resources: None,
        }
    }

    /// A source that must be released when its owner is closed
    pub fn owning<P>(name: impl Into<Cow<'static, str>>, provider: P) -> Self
    where
        P: CredentialSource + ReleaseResources + 'static,
    {
        let provider = Arc::new(provider);
        Self {
            name: name.into(),
            provider: SharedCredentialSource::from(provider.clone() as Arc<dyn CredentialSource>),
            resources: Some(provider),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owns_resources(&self) -> bool {
        self.resources.is_some()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Cow<'static, str>,
        SharedCredentialSource,
        Option<Arc<dyn ReleaseResources>>,
    ) {
        (self.name, self.provider, self.resources)
    }
}

/// Builds live sources from their descriptions
pub trait SourceFactory: Send + Sync + Debug {
    fn create(&self, spec: &SourceSpec) -> ExplicitSource;
}

/// Builds [`ProfileCredentialsProvider`] and [`AssumeRoleProvider`] sources
#[derive(Debug, Default, Clone)]
pub struct DefaultSourceFactory {
    env: Env,
    fs: Fs,
    exchange: Option<Arc<dyn TokenExchange>>,
}

impl DefaultSourceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    #[doc(hidden)]
    pub fn env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    #[doc(hidden)]
    pub fn fs(mut self, fs: Fs) -> Self {
        self.fs = fs;
        self
    }

    /// Token exchange shared by every built source instead of one STS client per source
    pub fn exchange(mut self, exchange: Arc<dyn TokenExchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }
}

impl SourceFactory for DefaultSourceFactory {
    fn create(&self, spec: &SourceSpec) -> ExplicitSource {
        match spec {
            SourceSpec::Profile { profile_name } => {
                let mut builder = ProfileCredentialsProvider::builder()
                    .profile_name(profile_name.clone())
                    .env(self.env.clone())
                    .fs(self.fs.clone());
                builder.set_exchange(self.exchange.clone());
                ExplicitSource::owning(spec.name(), builder.build())
            }
            SourceSpec::AssumeRole {
                role_arn,
                session_name,
                sts_region,
            } => {
                let mut builder = AssumeRoleProvider::builder(role_arn.clone())
                    .session_name(session_name.clone())
                    .region(sts_region.clone());
                if let Some(exchange) = &self.exchange {
                    builder = builder.exchange(exchange.clone());
                }
                ExplicitSource::owning(spec.name(), builder.build())
            }
        }
    }
}
