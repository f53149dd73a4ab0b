/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Errors specific to MSK credential sources
//!
//! Sources report failures through
//! [`CredentialsError`](aws_credential_types::provider::error::CredentialsError). The types here
//! are carried as the source of that error when a chain is exhausted or a released source is
//! asked for credentials.

use aws_credential_types::provider::error::CredentialsError;
use std::borrow::Cow;
use std::error::Error;
use std::fmt;
use std::fmt::{Display, Formatter};

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// A single failed source, recorded when an entire chain is exhausted.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SourceFailure {
    pub source_name: Cow<'static, str>,
    pub message: String,
}

impl Display for SourceFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source_name, self.message)
    }
}

/// Every source in a chain failed
///
/// Chains report this as [`CredentialsError::CredentialsNotLoaded`]; use
/// [`NoCredentialsAvailable::find`] to get at the individual failures.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct NoCredentialsAvailable {
    failures: Vec<SourceFailure>,
}

impl NoCredentialsAvailable {
    pub fn new(failures: Vec<SourceFailure>) -> Self {
        Self { failures }
    }

    /// Failures in the order the sources were tried
    pub fn failures(&self) -> &[SourceFailure] {
        &self.failures
    }

    /// The aggregate failure behind `err`, when `err` came from an exhausted chain
    pub fn find(err: &CredentialsError) -> Option<&NoCredentialsAvailable> {
        err.source()
            .and_then(|source| source.downcast_ref::<NoCredentialsAvailable>())
    }
}

impl Display for NoCredentialsAvailable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Unable to load AWS credentials from any provider in the chain: [")?;
        for (idx, failure) in self.failures.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", failure)?;
        }
        write!(f, "]")
    }
}

impl Error for NoCredentialsAvailable {}

/// The source was released and can no longer produce credentials.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProviderClosed {
    provider: Cow<'static, str>,
}

impl ProviderClosed {
    pub fn new(provider: impl Into<Cow<'static, str>>) -> Self {
        Self {
            provider: provider.into(),
        }
    }
}

impl Display for ProviderClosed {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "the credentials provider `{}` has been closed", self.provider)
    }
}

impl Error for ProviderClosed {}

impl From<ProviderClosed> for CredentialsError {
    fn from(err: ProviderClosed) -> Self {
        CredentialsError::provider_error(err)
    }
}

/// A resource could not be released cleanly.
#[derive(Debug)]
pub struct ReleaseError {
    resource: Cow<'static, str>,
    source: BoxError,
}

impl ReleaseError {
    pub fn new(resource: impl Into<Cow<'static, str>>, source: impl Into<BoxError>) -> Self {
        Self {
            resource: resource.into(),
            source: source.into(),
        }
    }
}

impl Display for ReleaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "failed to release `{}`: {}", self.resource, self.source)
    }
}

impl Error for ReleaseError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.source.as_ref() as _)
    }
}
