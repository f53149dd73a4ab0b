/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Credential provider chains
//!
//! A chain asks each of its providers, in order, for credentials. The first provider to return a
//! complete set of credentials wins; nothing is merged across providers. A failing provider is
//! logged and skipped. Only when every provider has failed does the chain fail, with a
//! [`NoCredentialsAvailable`] listing every failure.
//!
//! The chain does not retry a provider, impose an overall timeout, or cache anything itself:
//! caching belongs to the individual providers, and the worst-case latency of a chain is the sum
//! of the worst-case latencies of its providers.

use aws_credential_types::provider::{self, error::CredentialsError, future, ProvideCredentials};
use aws_credential_types::Credentials;
use aws_msk_credential_types::error::{NoCredentialsAvailable, SourceFailure};
use aws_msk_credential_types::provider::CredentialSource;
use aws_smithy_types::error::display::DisplayErrorContext;
use std::borrow::Cow;
use tracing::Instrument;

/// Credentials provider that checks a series of inner providers
///
/// ## Example
/// ```rust
/// use aws_msk_auth_providers::chain::ChainProvider;
/// use aws_msk_auth_providers::environment::EnvironmentVariableCredentialsProvider;
/// use aws_msk_auth_providers::profile::ProfileCredentialsProvider;
///
/// let provider = ChainProvider::first_try("Environment", EnvironmentVariableCredentialsProvider::new())
///     .or_else("Profile", ProfileCredentialsProvider::builder().build());
/// assert_eq!(provider.names().collect::<Vec<_>>(), vec!["Environment", "Profile"]);
/// ```
#[derive(Debug)]
pub struct ChainProvider {
    providers: Vec<(Cow<'static, str>, Box<dyn CredentialSource>)>,
}

impl ChainProvider {
    pub fn first_try(
        name: impl Into<Cow<'static, str>>,
        provider: impl CredentialSource + 'static,
    ) -> Self {
        ChainProvider {
            providers: vec![(name.into(), Box::new(provider))],
        }
    }

    pub fn or_else(
        mut self,
        name: impl Into<Cow<'static, str>>,
        provider: impl CredentialSource + 'static,
    ) -> Self {
        self.providers.push((name.into(), Box::new(provider)));
        self
    }

    /// Names of the providers in the order they are tried
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|(name, _)| name.as_ref())
    }

    async fn credentials(&self) -> provider::Result {
        let mut failures = Vec::with_capacity(self.providers.len());
        for (name, provider) in &self.providers {
            let span = tracing::debug_span!("load_credentials", provider = %name);
            match provider.provide_credentials().instrument(span).await {
                Ok(credentials) if is_complete(&credentials) => {
                    tracing::debug!(provider = %name, "loaded credentials");
                    return Ok(credentials);
                }
                Ok(_) => {
                    tracing::debug!(provider = %name, "provider returned incomplete credentials");
                    failures.push(SourceFailure {
                        source_name: name.clone(),
                        message: "access key or secret key was empty".into(),
                    });
                }
                Err(err) => match NoCredentialsAvailable::find(&err) {
                    // nested chains contribute their own failures
                    Some(nested) => {
                        tracing::debug!(provider = %name, "nested provider chain was exhausted");
                        failures.extend(nested.failures().iter().cloned());
                    }
                    None => {
                        if matches!(err, CredentialsError::CredentialsNotLoaded(_)) {
                            tracing::debug!(provider = %name, error = %DisplayErrorContext(&err), "provider in chain did not provide credentials");
                        } else {
                            tracing::debug!(provider = %name, error = %DisplayErrorContext(&err), "provider in chain failed to load credentials");
                        }
                        failures.push(SourceFailure {
                            source_name: name.clone(),
                            message: DisplayErrorContext(&err).to_string(),
                        });
                    }
                },
            }
        }
        Err(CredentialsError::not_loaded(NoCredentialsAvailable::new(
            failures,
        )))
    }
}

/// Both halves of the key pair are present
///
/// A session token is optional, but an access key without its secret (or the reverse) can never
/// be used to sign a request.
fn is_complete(credentials: &Credentials) -> bool {
    !credentials.access_key_id().is_empty() && !credentials.secret_access_key().is_empty()
}

impl ProvideCredentials for ChainProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::new(self.credentials())
    }
}

impl CredentialSource for ChainProvider {
    fn refresh(&self) {
        for (_, provider) in &self.providers {
            provider.refresh();
        }
    }
}

#[cfg(test)]
mod test {
    use crate::chain::ChainProvider;
    use crate::test_util::CountingProvider;
    use aws_credential_types::provider::ProvideCredentials;
    use aws_credential_types::Credentials;
    use aws_msk_credential_types::error::NoCredentialsAvailable;
    use aws_msk_credential_types::provider::CredentialSource;
    use tracing_test::traced_test;

    #[tokio::test]
    async fn first_success_wins() {
        let first = CountingProvider::failing("first is broken");
        let second = CountingProvider::ok(Credentials::from_keys("second", "secret", None));
        let third = CountingProvider::ok(Credentials::from_keys("third", "secret", None));
        let chain = ChainProvider::first_try("first", first.clone())
            .or_else("second", second.clone())
            .or_else("third", third.clone());

        let creds = chain.provide_credentials().await.expect("second succeeds");
        assert_eq!(creds.access_key_id(), "second");
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
        assert_eq!(third.calls(), 0);
    }

    #[traced_test]
    #[tokio::test]
    async fn exhausted_chain_lists_all_failures() {
        let chain = ChainProvider::first_try("first", CountingProvider::not_loaded())
            .or_else("second", CountingProvider::failing("access denied"));
        let err = chain.provide_credentials().await.expect_err("all fail");
        let failures = NoCredentialsAvailable::find(&err)
            .expect("aggregate failure")
            .failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].source_name, "first");
        assert_eq!(failures[1].source_name, "second");
        assert!(failures[1].message.contains("access denied"));
        assert!(logs_contain("provider in chain failed to load credentials"));
    }

    #[tokio::test]
    async fn incomplete_credentials_are_never_returned() {
        let chain = ChainProvider::first_try(
            "partial",
            CountingProvider::ok(Credentials::from_keys("AKID", "", None)),
        );
        let err = chain.provide_credentials().await.expect_err("partial");
        let aggregate = NoCredentialsAvailable::find(&err).expect("aggregate failure");
        assert!(aggregate
            .to_string()
            .contains("partial: access key or secret key was empty"));
    }

    #[tokio::test]
    async fn nested_chain_failures_are_flattened() {
        let nested = ChainProvider::first_try("inner-a", CountingProvider::not_loaded())
            .or_else("inner-b", CountingProvider::not_loaded());
        let chain = ChainProvider::first_try("outer", CountingProvider::not_loaded())
            .or_else("nested", nested);
        let err = chain.provide_credentials().await.expect_err("fails");
        let names: Vec<_> = NoCredentialsAvailable::find(&err)
            .expect("aggregate failure")
            .failures()
            .iter()
            .map(|f| f.source_name.as_ref())
            .collect();
        assert_eq!(names, vec!["outer", "inner-a", "inner-b"]);
    }

    #[tokio::test]
    async fn refresh_reaches_every_provider() {
        let first = CountingProvider::not_loaded();
        let second = CountingProvider::not_loaded();
        let chain = ChainProvider::first_try("first", first.clone()).or_else("second", second.clone());
        chain.refresh();
        assert_eq!(first.refreshes(), 1);
        assert_eq!(second.refreshes(), 1);
        // refresh does not prefetch
        assert_eq!(first.calls(), 0);
        assert_eq!(second.calls(), 0);
    }
}
