/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0.
 */

//! Loading and merging of the shared `config` and `credentials` files
//!
//! Both files are INI documents. In `~/.aws/config`, profiles other than `default` are declared
//! as `[profile NAME]`; in `~/.aws/credentials` sections are bare profile names. When both files
//! define the same key for a profile, the credentials file wins.

use super::ProfileFileError;
use aws_types::os_shim_internal::{Env, Fs};
use ini::Ini;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

const ENV_VAR_CONFIG_FILE: &str = "AWS_CONFIG_FILE";
const ENV_VAR_CREDENTIALS_FILE: &str = "AWS_SHARED_CREDENTIALS_FILE";

pub(super) type Profile = HashMap<String, String>;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(super) struct ProfileSet {
    profiles: HashMap<String, Profile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Config,
    Credentials,
}

impl ProfileSet {
    pub(super) fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name)
    }

    /// Load both shared files. Missing files are skipped; unreadable or malformed ones are errors.
    pub(super) async fn load(env: &Env, fs: &Fs) -> Result<Self, ProfileFileError> {
        let mut set = ProfileSet::default();
        for kind in [FileKind::Config, FileKind::Credentials] {
            let path = match file_path(env, kind) {
                Some(path) => path,
                None => continue,
            };
            let contents = match fs.read_to_end(&path).await {
                Ok(contents) => contents,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    tracing::debug!(path = %path.display(), "shared profile file not found");
                    continue;
                }
                Err(err) => {
                    return Err(ProfileFileError::CouldNotReadProfileFile {
                        path,
                        message: err.to_string(),
                    })
                }
            };
            let contents = String::from_utf8_lossy(&contents);
            set.merge(kind, &contents)
                .map_err(|message| ProfileFileError::CouldNotParseProfile {
                    path: path.clone(),
                    message,
                })?;
        }
        Ok(set)
    }

    fn merge(&mut self, kind: FileKind, contents: &str) -> Result<(), String> {
        let parsed = Ini::load_from_str(contents).map_err(|err| err.to_string())?;
        for (section, properties) in parsed.iter() {
            let name = match section.and_then(|section| profile_name(kind, section)) {
                Some(name) => name,
                None => continue,
            };
            let profile = self.profiles.entry(name.to_string()).or_default();
            for (key, value) in properties.iter() {
                profile.insert(key.to_string(), value.to_string());
            }
        }
        Ok(())
    }
}

fn profile_name(kind: FileKind, section: &str) -> Option<&str> {
    let section = section.trim();
    match kind {
        FileKind::Credentials => Some(section),
        FileKind::Config if section == "default" => Some(section),
        FileKind::Config => section
            .strip_prefix("profile")
            .filter(|rest| rest.starts_with(char::is_whitespace))
            .map(str::trim),
    }
}

fn file_path(env: &Env, kind: FileKind) -> Option<PathBuf> {
    let (var, file_name) = match kind {
        FileKind::Config => (ENV_VAR_CONFIG_FILE, "config"),
        FileKind::Credentials => (ENV_VAR_CREDENTIALS_FILE, "credentials"),
    };
    match env.get(var) {
        Ok(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => home_dir(env).map(|home| home.join(".aws").join(file_name)),
    }
}

/// Home directory from `HOME`, falling back to `USERPROFILE`
fn home_dir(env: &Env) -> Option<PathBuf> {
    ["HOME", "USERPROFILE"]
        .iter()
        .filter_map(|var| env.get(var).ok())
        .find(|dir| !dir.is_empty())
        .map(PathBuf::from)
}
