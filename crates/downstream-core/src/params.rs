//! Build parameter collection.
//!
//! Sources, in insertion order (later writes win):
//! 1. the upstream build number, when the runner provides one
//! 2. `KEY=VALUE` literals and `.env`-style files, in the order given
//! 3. `params_from_env` keys read from the environment

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use drone_client::BuildParams;

use crate::env::{ProcessEnv, UPSTREAM_BUILD_NUMBER_PARAM, UPSTREAM_BUILD_NUMBER_VAR};
use crate::error::ParamError;

/// Shown instead of values that came from the environment.
pub const REDACTED: &str = "[from-environment]";

/// Merged parameters plus which keys were sourced from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet {
    values: BuildParams,
    from_env: BTreeSet<String>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The mapping sent with triggers.
    pub fn as_map(&self) -> &BuildParams {
        &self.values
    }

    /// Echo lines for progress output, environment-sourced values redacted.
    pub fn echo_lines(&self) -> Vec<String> {
        if self.values.is_empty() {
            return Vec::new();
        }
        let mut lines = vec!["  with params:".to_string()];
        lines.extend(self.values.iter().map(|(k, v)| {
            let shown = if self.from_env.contains(k) {
                REDACTED
            } else {
                v.as_str()
            };
            format!("  - {k}: {shown}")
        }));
        lines
    }

    fn insert_from_env(&mut self, key: &str, value: &str) {
        self.insert(key, value);
        self.from_env.insert(key.to_string());
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.echo_lines() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Merge literal pairs, parameter files and environment keys.
pub fn collect_params(
    literals_and_paths: &[String],
    env_keys: &[String],
    env: &ProcessEnv,
) -> Result<ParameterSet, ParamError> {
    let mut params = ParameterSet::new();

    if let Some(upstream) = env.get(UPSTREAM_BUILD_NUMBER_VAR) {
        params.insert(UPSTREAM_BUILD_NUMBER_PARAM, upstream);
    }

    for entry in literals_and_paths {
        match entry.split_once('=') {
            Some((key, value)) => params.insert(key, value),
            None => read_params_file(entry, &mut params)?,
        }
    }

    for key in env_keys {
        let value = env.get(key).ok_or_else(|| ParamError::EnvVarNotSet {
            key: key.clone(),
        })?;
        params.insert_from_env(key, value);
    }

    Ok(params)
}

fn read_params_file(path: &str, params: &mut ParameterSet) -> Result<(), ParamError> {
    if !Path::new(path).exists() {
        return Err(ParamError::NoSuchFile {
            entry: path.to_string(),
        });
    }

    let unreadable = |e: dotenvy::Error| ParamError::UnreadableFile {
        path: path.to_string(),
        reason: e.to_string(),
    };

    for item in dotenvy::from_path_iter(path).map_err(unreadable)? {
        let (key, value) = item.map_err(unreadable)?;
        params.insert(key, value);
    }
    Ok(())
}
