/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Credential providers for IAM-authenticated MSK clients
//!
//! [`MskCredentialsProvider`] turns a small set of client options into a single credential
//! provider:
//!
//! 1. `awsProfileName`: a named profile from the shared config files
//! 2. `awsRoleArn` (+ `awsRoleSessionName`, `awsStsRegion`): a role assumed through STS
//! 3. the [`DefaultProviderChain`], tried last
//!
//! The first source to produce credentials wins. Failures of individual sources are logged and
//! only surface if every source fails.
//!
//! ```no_run
//! use aws_msk_auth_providers::{ConfigurationOptions, MskCredentialsProvider};
//! use aws_credential_types::provider::ProvideCredentials;
//!
//! # async fn docs() {
//! let options: ConfigurationOptions = [("awsProfileName", "analytics")].into_iter().collect();
//! let provider = MskCredentialsProvider::new(options);
//! let credentials = provider.provide_credentials().await;
//! provider.close();
//! # }
//! ```

mod cache;
pub mod chain;
pub mod debug;
pub mod default_provider_chain;
pub mod environment;
pub mod explicit;
pub mod lifecycle;
pub mod metadata;
pub mod msk;
pub mod options;
pub mod profile;
pub mod role;
pub mod sts;
pub mod system_properties;
pub mod web_identity_token;

#[cfg(test)]
mod test_util;

pub use default_provider_chain::DefaultProviderChain;
pub use msk::MskCredentialsProvider;
pub use options::{ConfigurationOptions, ConfigurationResolver, DebugSettings, SourceSpec};

/// Default provider chain with no overrides
pub fn default_provider() -> DefaultProviderChain {
    DefaultProviderChain::builder().build()
}
