/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Load credentials from the process environment

use aws_credential_types::provider::{self, error::CredentialsError, future, ProvideCredentials};
use aws_credential_types::Credentials;
use aws_msk_credential_types::provider::CredentialSource;
use aws_types::os_shim_internal::Env;

const ACCESS_KEY_VARS: &[&str] = &["AWS_ACCESS_KEY_ID", "AWS_ACCESS_KEY"];
const SECRET_KEY_VARS: &[&str] = &["AWS_SECRET_ACCESS_KEY", "AWS_SECRET_KEY"];
const SESSION_TOKEN_VAR: &str = "AWS_SESSION_TOKEN";

/// Load credentials from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`
///
/// The legacy names `AWS_ACCESS_KEY` and `AWS_SECRET_KEY` are accepted as fallbacks. Blank values
/// are treated as unset.
#[derive(Debug, Clone)]
pub struct EnvironmentVariableCredentialsProvider {
    env: Env,
}

impl Default for EnvironmentVariableCredentialsProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentVariableCredentialsProvider {
    pub fn new() -> Self {
        Self::new_with_env(Env::real())
    }

    pub fn new_with_env(env: Env) -> Self {
        Self { env }
    }

    fn credentials(&self) -> provider::Result {
        let access_key = first_set(&self.env, ACCESS_KEY_VARS).ok_or_else(|| {
            CredentialsError::not_loaded("environment variable not set: AWS_ACCESS_KEY_ID")
        })?;
        let secret_key = first_set(&self.env, SECRET_KEY_VARS).ok_or_else(|| {
            CredentialsError::invalid_configuration(
                "AWS_ACCESS_KEY_ID is set but AWS_SECRET_ACCESS_KEY is not",
            )
        })?;
        let session_token = first_set(&self.env, &[SESSION_TOKEN_VAR]);
        Ok(Credentials::new(
            access_key,
            secret_key,
            session_token,
            None,
            "Environment",
        ))
    }
}

fn first_set(env: &Env, vars: &[&str]) -> Option<String> {
    vars.iter()
        .filter_map(|var| env.get(var).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

impl ProvideCredentials for EnvironmentVariableCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::ready(self.credentials())
    }
}

impl CredentialSource for EnvironmentVariableCredentialsProvider {}
