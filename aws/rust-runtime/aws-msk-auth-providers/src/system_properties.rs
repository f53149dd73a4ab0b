/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Load credentials from host-supplied system properties
//!
//! The host application may forward credentials as process-wide properties (see
//! [`set_system_property`](aws_msk_credential_types::properties::set_system_property)).
//! Recognized keys are `aws.accessKeyId`, `aws.secretKey` (or `aws.secretAccessKey`) and
//! `aws.sessionToken`.

use aws_credential_types::provider::{self, error::CredentialsError, future, ProvideCredentials};
use aws_credential_types::Credentials;
use aws_msk_credential_types::properties::Properties;
use aws_msk_credential_types::provider::CredentialSource;

const ACCESS_KEY_PROPERTY: &str = "aws.accessKeyId";
const SECRET_KEY_PROPERTIES: &[&str] = &["aws.secretKey", "aws.secretAccessKey"];
const SESSION_TOKEN_PROPERTY: &str = "aws.sessionToken";

#[derive(Debug, Clone, Default)]
pub struct SystemPropertiesCredentialsProvider {
    properties: Properties,
}

impl SystemPropertiesCredentialsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_properties(properties: Properties) -> Self {
        Self { properties }
    }

    fn get(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.properties.get(key))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    }

    fn credentials(&self) -> provider::Result {
        let access_key = self.get(&[ACCESS_KEY_PROPERTY]).ok_or_else(|| {
            CredentialsError::not_loaded("system property not set: aws.accessKeyId")
        })?;
        let secret_key = self.get(SECRET_KEY_PROPERTIES).ok_or_else(|| {
            CredentialsError::invalid_configuration(
                "aws.accessKeyId is set but aws.secretKey is not",
            )
        })?;
        Ok(Credentials::new(
            access_key,
            secret_key,
            self.get(&[SESSION_TOKEN_PROPERTY]),
            None,
            "SystemProperties",
        ))
    }
}

impl ProvideCredentials for SystemPropertiesCredentialsProvider {
    fn provide_credentials<'a>(&'a self) -> future::ProvideCredentials<'a>
    where
        Self: 'a,
    {
        future::ProvideCredentials::ready(self.credentials())
    }
}

impl CredentialSource for SystemPropertiesCredentialsProvider {}
