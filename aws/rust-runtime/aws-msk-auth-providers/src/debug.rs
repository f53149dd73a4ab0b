/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Identity debugging for resolved credentials
//!
//! When `awsDebugCreds` is `true` and debug logging is enabled, every successful resolution is
//! followed by an STS `GetCallerIdentity` call made with exactly the credentials that were
//! returned, and the resulting identity is logged. The outcome of that call never changes what the
//! caller receives.

use crate::options::DebugSettings;
use crate::sts::pinned_client;
use aws_credential_types::Credentials;
use aws_msk_credential_types::error::BoxError;
use aws_smithy_async::future::BoxFuture;
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use tracing::Level;

/// Identity the credentials resolve to, as reported by STS
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: Option<String>,
    pub account: Option<String>,
    pub arn: Option<String>,
}

impl Display for CallerIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{UserId: {},Account: {},Arn: {}}}",
            self.user_id.as_deref().unwrap_or(""),
            self.account.as_deref().unwrap_or(""),
            self.arn.as_deref().unwrap_or("")
        )
    }
}

#[derive(Debug)]
pub struct VerifyIdentityError {
    source: BoxError,
}

impl VerifyIdentityError {
    pub fn new(source: impl Into<BoxError>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl Display for VerifyIdentityError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "failed to verify credential identity: {}", self.source)
    }
}

impl Error for VerifyIdentityError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref() as _)
    }
}

/// Backend that reports which identity a set of credentials belongs to
pub trait VerifyIdentity: Send + Sync + Debug {
    fn caller_identity<'a>(
        &'a self,
        region: &'a str,
        credentials: Credentials,
    ) -> BoxFuture<'a, CallerIdentity, VerifyIdentityError>;
}

/// [`VerifyIdentity`] backed by STS `GetCallerIdentity`
///
/// Each call builds a new client whose only credentials are the ones being verified.
#[derive(Debug, Default, Clone, Copy)]
pub struct StsIdentityVerifier;

impl VerifyIdentity for StsIdentityVerifier {
    fn caller_identity<'a>(
        &'a self,
        region: &'a str,
        credentials: Credentials,
    ) -> BoxFuture<'a, CallerIdentity, VerifyIdentityError> {
        Box::pin(async move {
            let resp = pinned_client(region, credentials)
                .get_caller_identity()
                .send()
                .await
                .map_err(VerifyIdentityError::new)?;
            Ok(CallerIdentity {
                user_id: resp.user_id().map(str::to_string),
                account: resp.account().map(str::to_string),
                arn: resp.arn().map(str::to_string),
            })
        })
    }
}

/// Logs the identity behind freshly resolved credentials
#[derive(Debug, Clone)]
pub struct IdentityDebugVerifier {
    settings: DebugSettings,
    backend: Arc<dyn VerifyIdentity>,
}

impl IdentityDebugVerifier {
    pub fn new(settings: DebugSettings, backend: Arc<dyn VerifyIdentity>) -> Self {
        Self { settings, backend }
    }

    pub fn settings(&self) -> &DebugSettings {
        &self.settings
    }

    /// Debugging was requested and debug logging is enabled for this module
    pub fn is_active(&self) -> bool {
        self.settings.enabled && tracing::enabled!(Level::DEBUG)
    }

    pub async fn verify(&self, credentials: &Credentials) {
        if !self.is_active() {
            return;
        }
        match self
            .backend
            .caller_identity(&self.settings.sts_region, credentials.clone())
            .await
        {
            Ok(identity) => tracing::debug!("The identity of the credentials is {}", identity),
            Err(err) => tracing::warn!(
                error = %err,
                sts_region = %self.settings.sts_region,
                "Error identifying caller identity"
            ),
        }
    }
}
