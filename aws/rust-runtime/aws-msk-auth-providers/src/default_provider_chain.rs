/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

use crate::chain::ChainProvider;
use crate::environment::EnvironmentVariableCredentialsProvider;
use crate::metadata::MetadataTransport;
use crate::sts::TokenExchange;
use crate::system_properties::SystemPropertiesCredentialsProvider;
use aws_credential_types::provider::{future, ProvideCredentials};
use aws_msk_credential_types::properties::Properties;
use aws_msk_credential_types::provider::CredentialSource;
use aws_smithy_async::time::SharedTimeSource;
use aws_types::os_shim_internal::{Env, Fs};
use std::sync::Arc;

/// Default AWS Credential Provider Chain
///
/// Resolution order:
/// 1. Environment variables: [`EnvironmentVariableCredentialsProvider`](crate::environment::EnvironmentVariableCredentialsProvider)
/// 2. System properties: [`SystemPropertiesCredentialsProvider`](crate::system_properties::SystemPropertiesCredentialsProvider)
/// 3. Web identity token: [`WebIdentityTokenCredentialProvider`](crate::web_identity_token::WebIdentityTokenCredentialProvider)
/// 4. Shared config (`~/.aws/config`, `~/.aws/credentials`): [`ProfileCredentialsProvider`](crate::profile::ProfileCredentialsProvider)
/// 5. Container or instance metadata: [`Ec2ContainerCredentialsProvider`](crate::metadata::Ec2ContainerCredentialsProvider)
///
/// The chain itself holds no cache; the sources that exchange or fetch temporary credentials
/// cache them individually.
///
/// ## Example:
/// Create a default chain with a custom region:
/// ```rust
/// let credentials_provider = aws_msk_auth_providers::DefaultProviderChain::builder()
///     .region("us-west-1")
///     .build();
/// ```
///
/// Create a default chain with no overrides:
/// ```rust
/// let credentials_provider = aws_msk_auth_providers::default_provider();
/// ```
#[derive(Debug)]
pub struct DefaultProviderChain(ChainProvider);

impl DefaultProviderChain {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Names of the sources in the order they are tried
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.names()
    }
}

impl ProvideCredentials for DefaultProviderChain {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        self.0.provide_credentials()
    }
}

impl CredentialSource for DefaultProviderChain {
    fn refresh(&self) {
        self.0.refresh()
    }
}

/// Builder for [`DefaultProviderChain`](DefaultProviderChain)
#[derive(Debug, Default)]
pub struct Builder {
    profile_file_builder: crate::profile::Builder,
    web_identity_builder: crate::web_identity_token::Builder,
    metadata_builder: crate::metadata::Builder,
    env: Option<Env>,
    properties: Option<Properties>,
}

impl Builder {
    /// Set the region used when making requests to STS as part of the provider chain
    ///
    /// When unset, web identity exchange uses `AWS_REGION`; role profiles use `aws-global`.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        let region = region.into();
        self.profile_file_builder.set_region(Some(region.clone()));
        self.web_identity_builder.set_region(Some(region));
        self
    }

    /// Override the token exchange used by the web identity and profile sources
    pub fn token_exchange(mut self, exchange: Arc<dyn TokenExchange>) -> Self {
        self.profile_file_builder
            .set_exchange(Some(exchange.clone()));
        self.web_identity_builder.set_exchange(Some(exchange));
        self
    }

    /// Override the HTTP transport used for the container and instance metadata endpoints
    pub fn metadata_transport(mut self, transport: Arc<dyn MetadataTransport>) -> Self {
        self.metadata_builder.set_transport(Some(transport));
        self
    }

    #[doc(hidden)]
    /// Override the filesystem used for this provider
    ///
    /// This method exists primarily for testing credential providers
    pub fn fs(mut self, fs: Fs) -> Self {
        self.profile_file_builder.set_fs(fs.clone());
        self.web_identity_builder.set_fs(fs);
        self
    }

    #[doc(hidden)]
    /// Override the environment used for this provider
    ///
    /// This method exists primarily for testing credential providers
    pub fn env(mut self, env: Env) -> Self {
        self.env = Some(env.clone());
        self.profile_file_builder.set_env(env.clone());
        self.web_identity_builder.set_env(env.clone());
        self.metadata_builder.set_env(env);
        self
    }

    #[doc(hidden)]
    /// Override the system properties used for this provider
    ///
    /// This method exists primarily for testing credential providers
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = Some(properties);
        self
    }

    #[doc(hidden)]
    pub fn time_source(mut self, time_source: SharedTimeSource) -> Self {
        self.profile_file_builder.set_time_source(time_source.clone());
        self.web_identity_builder.set_time_source(time_source.clone());
        self.metadata_builder.set_time_source(time_source);
        self
    }

    pub fn build(self) -> DefaultProviderChain {
        let env_provider =
            EnvironmentVariableCredentialsProvider::new_with_env(self.env.unwrap_or_default());
        let properties_provider = SystemPropertiesCredentialsProvider::new_with_properties(
            self.properties.unwrap_or_default(),
        );
        let web_identity_token_provider = self.web_identity_builder.build();
        let profile_provider = self.profile_file_builder.build();
        let metadata_provider = self.metadata_builder.build();
        let provider_chain = ChainProvider::first_try("Environment", env_provider)
            .or_else("SystemProperties", properties_provider)
            .or_else("WebIdentityToken", web_identity_token_provider)
            .or_else("Profile", profile_provider)
            .or_else("Ec2Container", metadata_provider);
        DefaultProviderChain(provider_chain)
    }
}
