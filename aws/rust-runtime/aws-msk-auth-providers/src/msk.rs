/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! The credential provider handed to an IAM-authenticated MSK client

use crate::chain::ChainProvider;
use crate::debug::{IdentityDebugVerifier, StsIdentityVerifier, VerifyIdentity};
use crate::explicit::{DefaultSourceFactory, SourceFactory};
use crate::lifecycle::LifecycleManager;
use crate::options::{ConfigurationOptions, ConfigurationResolver};
use crate::DefaultProviderChain;
use aws_credential_types::provider::{self, future, ProvideCredentials};
use aws_msk_credential_types::provider::{CredentialSource, SharedCredentialSource};
use std::sync::Arc;

const DEFAULT_CHAIN: &str = "DefaultChain";

/// Credentials for MSK IAM authentication, built from client options
///
/// Explicitly configured sources (profile, then role) are tried before the
/// [`DefaultProviderChain`]. The first source to produce credentials wins.
///
/// Sources that hold resources are released by [`close`](MskCredentialsProvider::close), which
/// also runs when the provider is dropped.
#[derive(Debug)]
pub struct MskCredentialsProvider {
    chain: ChainProvider,
    verifier: IdentityDebugVerifier,
    lifecycle: LifecycleManager,
}

impl MskCredentialsProvider {
    pub fn new(options: ConfigurationOptions) -> Self {
        Self::builder().options(options).build()
    }

    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Names of the sources in the order they are tried
    pub fn source_names(&self) -> impl Iterator<Item = &str> {
        self.chain.names()
    }

    pub fn should_debug_creds(&self) -> bool {
        self.verifier.settings().enabled
    }

    /// Release every resource-holding source. Safe to call more than once.
    pub fn close(&self) {
        self.lifecycle.close();
    }

    async fn credentials(&self) -> provider::Result {
        let credentials = self.chain.provide_credentials().await?;
        self.verifier.verify(&credentials).await;
        Ok(credentials)
    }
}

impl ProvideCredentials for MskCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials())
    }
}

impl CredentialSource for MskCredentialsProvider {
    fn refresh(&self) {
        self.chain.refresh();
    }
}

impl Drop for MskCredentialsProvider {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug, Default)]
pub struct Builder {
    options: ConfigurationOptions,
    source_factory: Option<Arc<dyn SourceFactory>>,
    default_chain: Option<SharedCredentialSource>,
    identity_verifier: Option<Arc<dyn VerifyIdentity>>,
}

impl Builder {
    pub fn options(mut self, options: ConfigurationOptions) -> Self {
        self.options = options;
        self
    }

    /// Override how explicit sources are built from the options
    pub fn source_factory(mut self, factory: Arc<dyn SourceFactory>) -> Self {
        self.source_factory = Some(factory);
        self
    }

    /// Replace the terminal [`DefaultProviderChain`]
    pub fn default_chain(mut self, provider: impl CredentialSource + 'static) -> Self {
        self.default_chain = Some(SharedCredentialSource::new(provider));
        self
    }

    /// Override the backend used when `awsDebugCreds` is enabled
    pub fn identity_verifier(mut self, verifier: Arc<dyn VerifyIdentity>) -> Self {
        self.identity_verifier = Some(verifier);
        self
    }

    pub fn build(self) -> MskCredentialsProvider {
        let resolved = ConfigurationResolver::new(&self.options).resolve();
        let factory = self
            .source_factory
            .unwrap_or_else(|| Arc::new(DefaultSourceFactory::new()));
        let mut lifecycle = LifecycleManager::new();
        let mut explicit: Option<ChainProvider> = None;
        for spec in &resolved.sources {
            let (name, provider, resources) = factory.create(spec).into_parts();
            if let Some(resources) = resources {
                lifecycle.register(name.clone(), resources);
            }
            explicit = Some(match explicit {
                Some(chain) => chain.or_else(name, provider),
                None => ChainProvider::first_try(name, provider),
            });
        }
        let default_chain = self.default_chain.unwrap_or_else(|| {
            SharedCredentialSource::new(DefaultProviderChain::builder().build())
        });
        let chain = match explicit {
            Some(chain) => chain.or_else(DEFAULT_CHAIN, default_chain),
            None => ChainProvider::first_try(DEFAULT_CHAIN, default_chain),
        };
        let backend = self
            .identity_verifier
            .unwrap_or_else(|| Arc::new(StsIdentityVerifier));
        MskCredentialsProvider {
            chain,
            verifier: IdentityDebugVerifier::new(resolved.debug, backend),
            lifecycle,
        }
    }
}
