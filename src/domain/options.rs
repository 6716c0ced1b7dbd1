// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend connection options and their environment-variable projection.
//!
//! Each field maps onto one environment variable through a statically
//! declared table, so projection never needs runtime reflection.

use serde::{Deserialize, Serialize};

/// Environment variable holding the backend address.
pub const ENV_ADDRESS: &str = "CONFIG_BACKEND_ADDRESS";
/// Environment variable holding the key prefix.
pub const ENV_PREFIX: &str = "CONFIG_BACKEND_PREFIX";
/// Environment variable holding the watch list file path.
pub const ENV_WATCH_CONFIG: &str = "CONFIG_WATCH_CONFIG";
/// Environment variable holding the access key.
pub const ENV_ACCESS_KEY: &str = "CONFIG_BACKEND_ACCESS_KEY";
/// Environment variable holding the secret key.
pub const ENV_SECRET_KEY: &str = "CONFIG_BACKEND_SECRET_KEY";

/// Connection options shared by the remote backends.
///
/// # Examples
///
/// ```
/// use snapcfg::domain::BackendOptions;
///
/// let opts = BackendOptions::from_lookup(|name| match name {
///     "CONFIG_BACKEND_ADDRESS" => Some("localhost:2379".to_string()),
///     _ => None,
/// });
/// assert_eq!(opts.address, "localhost:2379");
/// assert!(opts.prefix.is_empty());
/// ```
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendOptions {
    /// Backend address (`host:port` or URL).
    #[serde(default)]
    pub address: String,
    /// Key prefix all configuration lives under.
    #[serde(default)]
    pub prefix: String,
    /// Path to a watch list file.
    #[serde(default)]
    pub watch_config: String,
    /// Access key or user name.
    #[serde(default)]
    pub access_key: String,
    /// Secret key or password.
    #[serde(default)]
    pub secret_key: String,
}

const ENV_NAMES: [&str; 5] = [
    ENV_ADDRESS,
    ENV_PREFIX,
    ENV_WATCH_CONFIG,
    ENV_ACCESS_KEY,
    ENV_SECRET_KEY,
];

impl BackendOptions {
    /// The environment variable names, in declaration order.
    pub fn env_names() -> [&'static str; 5] {
        ENV_NAMES
    }

    fn field(&self, name: &str) -> &str {
        match name {
            ENV_ADDRESS => &self.address,
            ENV_PREFIX => &self.prefix,
            ENV_WATCH_CONFIG => &self.watch_config,
            ENV_ACCESS_KEY => &self.access_key,
            ENV_SECRET_KEY => &self.secret_key,
            _ => "",
        }
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            ENV_ADDRESS => Some(&mut self.address),
            ENV_PREFIX => Some(&mut self.prefix),
            ENV_WATCH_CONFIG => Some(&mut self.watch_config),
            ENV_ACCESS_KEY => Some(&mut self.access_key),
            ENV_SECRET_KEY => Some(&mut self.secret_key),
            _ => None,
        }
    }

    /// Builds options from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds options from an arbitrary lookup. Missing names leave the field empty.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut opts = Self::default();
        for name in ENV_NAMES {
            if let (Some(value), Some(field)) = (lookup(name), opts.field_mut(name)) {
                *field = value;
            }
        }
        opts
    }

    /// Non-empty fields as `(variable, value)` pairs.
    pub fn env_pairs(&self) -> Vec<(&'static str, String)> {
        ENV_NAMES
            .iter()
            .filter_map(|name| {
                let value = self.field(name);
                (!value.is_empty()).then(|| (*name, value.to_string()))
            })
            .collect()
    }

    /// Exports non-empty fields to the process environment.
    ///
    /// A variable that is already set is left untouched. Returns the names
    /// that were written.
    pub fn store_env(&self) -> Vec<&'static str> {
        let mut written = Vec::new();
        for (name, value) in self.env_pairs() {
            if std::env::var_os(name).is_some() {
                tracing::debug!("Keeping existing {}", name);
                continue;
            }
            std::env::set_var(name, value);
            written.push(name);
        }
        written
    }
}

impl std::fmt::Debug for BackendOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendOptions")
            .field("address", &self.address)
            .field("prefix", &self.prefix)
            .field("watch_config", &self.watch_config)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}
