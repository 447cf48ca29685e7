// bcctl - CLI for the BigCommerce catalog REST API
// Copyright (C) 2024 Mathias Uhl <mathiasuhl@gmx.de>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub store_hash: String,
    pub access_token: String,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub environments: BTreeMap<String, Environment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_environment: Option<String>,
}

/// One row of `env list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentEntry<'a> {
    pub name: &'a str,
    pub environment: &'a Environment,
    pub is_default: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate a home directory for the current user")]
    MissingConfigDir,
    #[error("environment '{0}' not found; use `bcctl env list` to see available environments")]
    UnknownEnvironment(String),
    #[error(
        "store hash and access token are required; pass --store-hash/--access-token or add an environment with `bcctl env add <name> <store-hash> <access-token>`"
    )]
    MissingCredentials,
}

/// Credentials sent with every API request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub store_hash: String,
    pub access_token: String,
}

/// Per-invocation values that take precedence over the stored environment.
#[derive(Debug, Default, Clone)]
pub struct CredentialOverrides {
    pub environment: Option<String>,
    pub store_hash: Option<String>,
    pub access_token: Option<String>,
}

impl Config {
    /// Adds or replaces an environment. The first one added becomes the
    /// default.
    pub fn add(&mut self, name: &str, environment: Environment) {
        self.environments.insert(name.to_string(), environment);
        if self.default_environment.is_none() {
            self.default_environment = Some(name.to_string());
        }
    }

    /// Removes an environment, promoting the first remaining one if it was
    /// the default. Returns `false` when the name is unknown.
    pub fn remove(&mut self, name: &str) -> bool {
        if self.environments.remove(name).is_none() {
            return false;
        }
        if self.default_environment.as_deref() == Some(name) {
            self.default_environment = self.environments.keys().next().cloned();
        }
        true
    }

    pub fn set_default(&mut self, name: &str) -> bool {
        if !self.environments.contains_key(name) {
            return false;
        }
        self.default_environment = Some(name.to_string());
        true
    }

    pub fn get(&self, name: &str) -> Option<&Environment> {
        self.environments.get(name)
    }

    pub fn default_environment(&self) -> Option<&Environment> {
        self.default_environment
            .as_deref()
            .and_then(|name| self.environments.get(name))
    }

    pub fn entries(&self) -> Vec<EnvironmentEntry<'_>> {
        self.environments
            .iter()
            .map(|(name, environment)| EnvironmentEntry {
                name,
                environment,
                is_default: self.default_environment.as_deref() == Some(name.as_str()),
            })
            .collect()
    }
}

pub fn config_path() -> Result<PathBuf> {
    if let Ok(custom) = env::var("BCCTL_CONFIG_DIR") {
        return Ok(PathBuf::from(custom).join("config.json"));
    }
    let home = home_dir().ok_or(ConfigError::MissingConfigDir)?;
    Ok(home.join(".bc-cli").join("config.json"))
}

pub fn load(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let contents = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
    let config =
        serde_json::from_str(&contents).with_context(|| format!("parsing {:?}", path))?;
    Ok(config)
}

pub fn save(path: &Path, config: &Config) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }
    let serialized = serde_json::to_string_pretty(config).context("serializing config")?;
    fs::write(path, serialized).with_context(|| format!("writing {:?}", path))?;
    Ok(())
}

/// Picks the named (or default) environment and overlays per-invocation
/// values on top of it.
pub fn resolve(path: &Path, overrides: CredentialOverrides) -> Result<Credentials> {
    let config = load(path)?;

    let base = match overrides.environment.as_deref() {
        Some(name) => Some(
            config
                .get(name)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownEnvironment(name.to_string()))?,
        ),
        None => config.default_environment().cloned(),
    };

    let store_hash = overrides
        .store_hash
        .or_else(|| base.as_ref().map(|e| e.store_hash.clone()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(ConfigError::MissingCredentials)?;
    let access_token = overrides
        .access_token
        .or_else(|| base.as_ref().map(|e| e.access_token.clone()))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(ConfigError::MissingCredentials)?;

    Ok(Credentials {
        store_hash,
        access_token,
    })
}

/// `abcdefghij...wxyz` for long tokens, `*****` for short ones.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 14 {
        return "*****".into();
    }
    let head: String = chars[..10].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
