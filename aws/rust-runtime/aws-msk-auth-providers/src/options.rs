/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Client options and their translation into credential sources
//!
//! | key                  | effect                                                     |
//! |----------------------|------------------------------------------------------------|
//! | `awsProfileName`     | adds a profile source for the named profile                |
//! | `awsRoleArn`         | adds an assume-role source for the role                    |
//! | `awsRoleSessionName` | session name for the role, `aws-msk-iam-auth` by default   |
//! | `awsStsRegion`       | STS region for the role and for identity debugging         |
//! | `awsDebugCreds`      | `true` enables identity debugging                          |
//!
//! Other keys are ignored. Values are never validated here: a malformed role ARN only fails
//! when the role source is asked for credentials.

use crate::role::DEFAULT_ROLE_SESSION_NAME;
use crate::sts::DEFAULT_STS_REGION;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const AWS_PROFILE_NAME: &str = "awsProfileName";
pub const AWS_ROLE_ARN: &str = "awsRoleArn";
pub const AWS_ROLE_SESSION_NAME: &str = "awsRoleSessionName";
pub const AWS_STS_REGION: &str = "awsStsRegion";
pub const AWS_DEBUG_CREDS: &str = "awsDebugCreds";

/// Immutable string options supplied by the host
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigurationOptions(HashMap<String, String>);

impl ConfigurationOptions {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, String>> for ConfigurationOptions {
    fn from(options: HashMap<String, String>) -> Self {
        Self(options)
    }
}

impl<K, V> FromIterator<(K, V)> for ConfigurationOptions
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugSettings {
    pub enabled: bool,
    pub sts_region: String,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            sts_region: DEFAULT_STS_REGION.to_string(),
        }
    }
}

/// Description of an explicitly configured credential source
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SourceSpec {
    Profile {
        profile_name: String,
    },
    AssumeRole {
        role_arn: String,
        session_name: String,
        sts_region: String,
    },
}

impl SourceSpec {
    /// Name of the source within the chain
    pub fn name(&self) -> &'static str {
        match self {
            SourceSpec::Profile { .. } => "Profile",
            SourceSpec::AssumeRole { .. } => "AssumeRole",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfiguration {
    pub sources: Vec<SourceSpec>,
    pub debug: DebugSettings,
}

/// Reads [`ConfigurationOptions`] into source descriptions and debug settings
#[derive(Debug, Clone, Copy)]
pub struct ConfigurationResolver<'a> {
    options: &'a ConfigurationOptions,
}

impl<'a> ConfigurationResolver<'a> {
    pub fn new(options: &'a ConfigurationOptions) -> Self {
        tracing::debug!(
            "Number of options to configure credential provider {}",
            options.len()
        );
        Self { options }
    }

    pub fn resolve(&self) -> ResolvedConfiguration {
        ResolvedConfiguration {
            sources: self.sources(),
            debug: DebugSettings {
                enabled: self.should_debug_creds(),
                sts_region: self.sts_region(),
            },
        }
    }

    /// Explicit sources in the order they are tried: profile, then role
    pub fn sources(&self) -> Vec<SourceSpec> {
        let mut sources = Vec::with_capacity(2);
        if let Some(profile_name) = self.options.get(AWS_PROFILE_NAME) {
            tracing::debug!("Profile name {}", profile_name);
            sources.push(SourceSpec::Profile {
                profile_name: profile_name.to_string(),
            });
        }
        if let Some(role_arn) = self.options.get(AWS_ROLE_ARN) {
            tracing::debug!("Role ARN {}", role_arn);
            let session_name = self
                .options
                .get(AWS_ROLE_SESSION_NAME)
                .unwrap_or(DEFAULT_ROLE_SESSION_NAME);
            sources.push(SourceSpec::AssumeRole {
                role_arn: role_arn.to_string(),
                session_name: session_name.to_string(),
                sts_region: self.sts_region(),
            });
        }
        sources
    }

    /// Only the exact string `true` enables debugging
    pub fn should_debug_creds(&self) -> bool {
        self.options.get(AWS_DEBUG_CREDS) == Some("true")
    }

    pub fn sts_region(&self) -> String {
        self.options
            .get(AWS_STS_REGION)
            .unwrap_or(DEFAULT_STS_REGION)
            .to_string()
    }
}
