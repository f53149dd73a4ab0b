/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Capabilities shared by every MSK IAM credential source.
//!
//! Credentials themselves and the asynchronous
//! [`ProvideCredentials`](aws_credential_types::provider::ProvideCredentials) trait come from
//! `aws-credential-types`. This crate adds what an MSK client needs on top of them: a
//! [`CredentialSource`](provider::CredentialSource) can be told to drop cached credentials, a
//! [`ReleaseResources`](provider::ReleaseResources) source owns closeable resources, and the
//! [`error`] module describes exhausted chains and closed sources. Actual sources live in
//! `aws-msk-auth-providers`.

pub mod error;
pub mod properties;
pub mod provider;
