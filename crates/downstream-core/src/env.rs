//! Read-only snapshot of the process environment.
//!
//! Captured once at startup so validation and parameter collection see one
//! consistent view, and tests never touch the real environment.

use std::collections::BTreeMap;

/// Upstream build number provided by the Drone runner.
pub const UPSTREAM_BUILD_NUMBER_VAR: &str = "DRONE_BUILD_NUMBER";

/// Parameter key the upstream build number is forwarded under.
pub const UPSTREAM_BUILD_NUMBER_PARAM: &str = "DRONE_UPSTREAM_BUILD_NUMBER";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessEnv {
    vars: BTreeMap<String, String>,
}

impl ProcessEnv {
    /// Snapshot the current process environment. Non-UTF-8 entries are skipped.
    pub fn capture() -> Self {
        ProcessEnv {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// First of `keys` that is set to a non-empty value.
    pub fn first_non_empty(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.get(k))
            .find(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ProcessEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        ProcessEnv {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
