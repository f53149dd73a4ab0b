/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Credential source capabilities
//!
//! Every MSK credential source is a [`CredentialSource`]: an
//! [`aws_credential_types::provider::ProvideCredentials`] that can additionally be told to
//! reconsider whatever it has cached. Sources that own closeable resources also implement
//! [`ReleaseResources`]; the capability is declared by the source type itself, so the owner of a
//! source knows at compile time whether it must be released.

use crate::error::ReleaseError;
use aws_credential_types::provider::{future, ProvideCredentials};
use aws_credential_types::Credentials;
use std::sync::Arc;

/// A credential provider whose cached credentials can be invalidated
pub trait CredentialSource: ProvideCredentials {
    /// Discard any cached credentials so the next call reconsiders them.
    ///
    /// This must not fetch new credentials itself.
    fn refresh(&self) {}
}

/// Pre-resolved credentials never change.
impl CredentialSource for Credentials {}

/// Type-erased, cheaply cloneable [`CredentialSource`]
#[derive(Clone, Debug)]
pub struct SharedCredentialSource(Arc<dyn CredentialSource>);

impl SharedCredentialSource {
    pub fn new(source: impl CredentialSource + 'static) -> Self {
        Self(Arc::new(source))
    }
}

impl From<Arc<dyn CredentialSource>> for SharedCredentialSource {
    fn from(source: Arc<dyn CredentialSource>) -> Self {
        Self(source)
    }
}

impl ProvideCredentials for SharedCredentialSource {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        self.0.provide_credentials()
    }
}

impl CredentialSource for SharedCredentialSource {
    fn refresh(&self) {
        self.0.refresh()
    }
}

/// Release of resources held by a credential source
///
/// Implementations must tolerate being called more than once; only the first call has an effect.
pub trait ReleaseResources: Send + Sync {
    fn release(&self) -> Result<(), ReleaseError>;
}
