//! Plugin configuration and its validation into [`Settings`].

use std::time::Duration;

use crate::env::ProcessEnv;
use crate::error::{DownstreamError, Result};
use crate::params::{collect_params, ParameterSet};
use crate::target::Target;

/// Tick interval while looking for a build to trigger.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Tick interval while blocking on a triggered build.
pub const DEFAULT_BLOCK_INTERVAL: Duration = Duration::from_secs(10);

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_BLOCK_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Upper bound for any configured duration (30 days).
pub const MAX_DURATION_SECONDS: u64 = 30 * 24 * 60 * 60;

const SERVER_FALLBACK_VARS: &[&str] = &["DOWNSTREAM_SERVER"];
const TOKEN_FALLBACK_VARS: &[&str] = &["DRONE_TOKEN", "DOWNSTREAM_TOKEN"];

/// Unvalidated configuration as bound from flags and plugin variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginConfig {
    pub repositories: Vec<String>,
    pub server: Option<String>,
    pub token: Option<String>,
    pub wait: bool,
    pub timeout: Duration,
    pub last_successful: bool,
    /// `KEY=VALUE` literals or paths to `.env`-style files
    pub params: Vec<String>,
    /// Environment variable names forwarded as params
    pub params_from_env: Vec<String>,
    /// Environment to promote to; plain restart when unset
    pub deploy: Option<String>,
    pub block: bool,
    pub block_timeout: Duration,
}

impl Default for PluginConfig {
    fn default() -> Self {
        PluginConfig {
            repositories: Vec::new(),
            server: None,
            token: None,
            wait: false,
            timeout: DEFAULT_TIMEOUT,
            last_successful: false,
            params: Vec::new(),
            params_from_env: Vec::new(),
            deploy: None,
            block: false,
            block_timeout: DEFAULT_BLOCK_TIMEOUT,
        }
    }
}

/// Validated settings for one invocation.
///
/// Invariants: `wait` and `last_successful` are never both set; with
/// `deploy` set, every target has a selector that is numeric unless
/// `last_successful` is set.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: String,
    pub token: String,
    pub targets: Vec<Target>,
    pub wait: bool,
    pub last_successful: bool,
    pub timeout: Duration,
    pub deploy: Option<String>,
    pub block: bool,
    pub block_timeout: Duration,
    pub params: ParameterSet,
    pub poll_interval: Duration,
    pub block_interval: Duration,
}

impl Settings {
    /// Validate `config` against the environment snapshot.
    ///
    /// Checks run before any network call, in this order: token, server,
    /// wait/last_successful exclusivity, params, target entries, deploy
    /// selectors.
    pub fn validate(config: PluginConfig, env: &ProcessEnv) -> Result<Self> {
        let token = non_empty(config.token)
            .or_else(|| env.first_non_empty(TOKEN_FALLBACK_VARS).map(str::to_string))
            .ok_or(DownstreamError::MissingToken)?;

        let server = resolve_server(config.server, env).ok_or(DownstreamError::MissingServer)?;

        if config.wait && config.last_successful {
            return Err(DownstreamError::ConflictingWaitFlags);
        }

        let params = collect_params(&config.params, &config.params_from_env, env)?;

        let targets = config
            .repositories
            .iter()
            .map(|entry| Target::parse(entry.trim()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let deploy = non_empty(config.deploy);
        if deploy.is_some() {
            for target in &targets {
                check_deploy_selector(target, config.last_successful)?;
            }
        }

        Ok(Settings {
            server,
            token,
            targets,
            wait: config.wait,
            last_successful: config.last_successful,
            timeout: config.timeout,
            deploy,
            block: config.block,
            block_timeout: config.block_timeout,
            params,
            poll_interval: DEFAULT_POLL_INTERVAL,
            block_interval: DEFAULT_BLOCK_INTERVAL,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Explicit server, then `DOWNSTREAM_SERVER`, then the runner's own
/// `DRONE_SYSTEM_PROTO://DRONE_SYSTEM_HOST`.
fn resolve_server(server: Option<String>, env: &ProcessEnv) -> Option<String> {
    if let Some(server) =
        non_empty(server).or_else(|| env.first_non_empty(SERVER_FALLBACK_VARS).map(str::to_string))
    {
        return Some(server);
    }

    let host = env.first_non_empty(&["DRONE_SYSTEM_HOST"])?;
    let proto = env.first_non_empty(&["DRONE_SYSTEM_PROTO"])?;
    Some(format!("{proto}://{host}"))
}

fn check_deploy_selector(target: &Target, last_successful: bool) -> Result<()> {
    if target.selector.is_none() {
        return Err(DownstreamError::MissingDeploySelector {
            entry: target.entry.clone(),
        });
    }
    if target.selector_is_branch() && !last_successful {
        return Err(DownstreamError::NonNumericDeploySelector {
            entry: target.entry.clone(),
        });
    }
    Ok(())
}

/// Parse a Go-style duration (`90s`, `1m30s`, `1.5h`, `250ms`) or a bare
/// number of seconds. Values above [`MAX_DURATION_SECONDS`] are rejected.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let invalid = || DownstreamError::InvalidDuration(raw.to_string());
    let s = raw.trim();
    if s.is_empty() {
        return Err(invalid());
    }
    if let Ok(secs) = s.parse::<u64>() {
        return bounded(Duration::from_secs(secs)).ok_or_else(invalid);
    }

    let mut total = 0f64;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(invalid)?;
        let value: f64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(invalid()),
        };
        rest = &rest[unit_len..];
        total += value * scale;
    }

    Duration::try_from_secs_f64(total)
        .ok()
        .and_then(bounded)
        .ok_or_else(invalid)
}

fn bounded(duration: Duration) -> Option<Duration> {
    (duration.as_secs() <= MAX_DURATION_SECONDS).then_some(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> PluginConfig {
        PluginConfig {
            repositories: vec!["octo/app".to_string()],
            server: Some("https://drone.example.com".to_string()),
            token: Some("secret".to_string()),
            ..PluginConfig::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let settings = Settings::validate(base_config(), &ProcessEnv::default()).unwrap();
        assert_eq!(settings.server, "https://drone.example.com");
        assert_eq!(settings.targets.len(), 1);
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT);
        assert_eq!(settings.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.block_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_wait_and_last_successful_conflict() {
        let config = PluginConfig {
            wait: true,
            last_successful: true,
            ..base_config()
        };
        let err = Settings::validate(config, &ProcessEnv::default()).unwrap_err();
        assert!(matches!(err, DownstreamError::ConflictingWaitFlags));
    }

    #[test]
    fn test_missing_token_and_server() {
        let env = ProcessEnv::default();
        let err = Settings::validate(
            PluginConfig {
                token: None,
                ..base_config()
            },
            &env,
        )
        .unwrap_err();
        assert!(matches!(err, DownstreamError::MissingToken));

        let err = Settings::validate(
            PluginConfig {
                server: Some(String::new()),
                ..base_config()
            },
            &env,
        )
        .unwrap_err();
        assert!(matches!(err, DownstreamError::MissingServer));
    }

    #[test]
    fn test_token_and_server_fall_back_to_environment() {
        let env: ProcessEnv = [
            ("DOWNSTREAM_TOKEN", "from-env"),
            ("DRONE_SYSTEM_HOST", "drone.internal"),
            ("DRONE_SYSTEM_PROTO", "http"),
        ]
        .into_iter()
        .collect();
        let config = PluginConfig {
            token: None,
            server: None,
            ..base_config()
        };

        let settings = Settings::validate(config, &env).unwrap();
        assert_eq!(settings.token, "from-env");
        assert_eq!(settings.server, "http://drone.internal");
    }

    #[test]
    fn test_malformed_target_rejected() {
        let config = PluginConfig {
            repositories: vec!["octo/app".to_string(), "not-a-repo".to_string()],
            ..base_config()
        };
        let err = Settings::validate(config, &ProcessEnv::default()).unwrap_err();
        assert!(err.to_string().contains("not-a-repo"));
    }

    #[test]
    fn test_deploy_selector_rules() {
        let env = ProcessEnv::default();
        let deploy = |repo: &str, last_successful: bool| PluginConfig {
            repositories: vec![repo.to_string()],
            deploy: Some("production".to_string()),
            last_successful,
            ..base_config()
        };

        assert!(Settings::validate(deploy("octo/app@42", false), &env).is_ok());
        assert!(Settings::validate(deploy("octo/app@main", true), &env).is_ok());

        let err = Settings::validate(deploy("octo/app@main", false), &env).unwrap_err();
        assert!(matches!(err, DownstreamError::NonNumericDeploySelector { .. }));

        let err = Settings::validate(deploy("octo/app", true), &env).unwrap_err();
        assert!(matches!(err, DownstreamError::MissingDeploySelector { .. }));
    }

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration("60s").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        for raw in ["", "abc", "10x", "m", "5s3", "-5s"] {
            assert!(parse_duration(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_parse_duration_rejects_oversized_values() {
        for raw in [
            "99999999999999999999s",
            "99999999999999999999",
            "18446744073709551615",
            "1000000h",
            "721h",
        ] {
            let err = parse_duration(raw).unwrap_err();
            assert!(matches!(err, DownstreamError::InvalidDuration(ref r) if r == raw));
        }
        assert_eq!(
            parse_duration("720h").unwrap(),
            Duration::from_secs(MAX_DURATION_SECONDS)
        );
    }
}
