/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Host-supplied system properties
//!
//! The host application may forward settings (eg. credentials from its own configuration) as
//! process-wide properties. [`Properties`] reads them the way `aws_types::os_shim_internal::Env`
//! reads environment variables: from the real registry, or from an in-memory fake in tests.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

fn property_registry() -> &'static RwLock<HashMap<String, String>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, String>>> = OnceLock::new();
    REGISTRY.get_or_init(Default::default)
}

/// Set a process-wide system property.
pub fn set_system_property(key: impl Into<String>, value: impl Into<String>) {
    property_registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(key.into(), value.into());
}

/// Remove a process-wide system property, returning its previous value.
pub fn clear_system_property(key: &str) -> Option<String> {
    property_registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(key)
}

/// System property abstraction
///
/// The real implementation reads the process-wide registry populated through
/// [`set_system_property`], the fake reads a fixed map.
#[derive(Clone, Debug)]
pub struct Properties(Inner);

#[derive(Clone, Debug)]
enum Inner {
    Real,
    Fake(Arc<HashMap<String, String>>),
}

impl Default for Properties {
    fn default() -> Self {
        Self::real()
    }
}

impl Properties {
    pub fn real() -> Self {
        Self(Inner::Real)
    }

    pub fn from_slice<'a>(props: &[(&'a str, &'a str)]) -> Self {
        let map = props
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self(Inner::Fake(Arc::new(map)))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match &self.0 {
            Inner::Real => property_registry()
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(key)
                .cloned(),
            Inner::Fake(map) => map.get(key).cloned(),
        }
    }
}
