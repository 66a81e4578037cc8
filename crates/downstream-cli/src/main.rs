//! downstream - trigger builds on other repositories of a Drone server
//!
//! Runs as a Drone plugin step (settings arrive as `PLUGIN_*` variables) or
//! from a shell with the equivalent flags.
//!
//! ## Modes
//!
//! - restart: re-run the latest (or last successful) build of each target
//! - deploy: promote a build of each target to `--deploy` environment
//!
//! `--wait` holds off while the target build is still running, `--block`
//! waits for each triggered build to finish.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use downstream_core::{
    parse_duration, route_signals, run_all, InterruptGate, PluginConfig, ProcessEnv, Settings,
    Signal,
};
use drone_client::{DroneClient, DroneConfig};
use tracing::{error, info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "downstream")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Trigger downstream Drone builds and deployments", long_about = None)]
struct Cli {
    /// Repositories to trigger, `owner/name[@branch|@build]`
    #[arg(long, env = "PLUGIN_REPOSITORIES", value_delimiter = ',')]
    repositories: Vec<String>,

    /// Drone server URL
    #[arg(long, env = "PLUGIN_SERVER")]
    server: Option<String>,

    /// Drone API token
    #[arg(long, env = "PLUGIN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Wait for a running build to finish before triggering
    #[arg(long, env = "PLUGIN_WAIT")]
    wait: bool,

    /// How long to wait for a build to become triggerable
    #[arg(long, env = "PLUGIN_WAIT_TIMEOUT", default_value = "60s", value_parser = duration_arg)]
    timeout: Duration,

    /// Trigger the last successful build of the branch instead of the latest
    #[arg(long, env = "PLUGIN_LAST_SUCCESSFUL")]
    last_successful: bool,

    /// Build params, `KEY=VALUE` or path to an env file
    #[arg(long, env = "PLUGIN_PARAMS", value_delimiter = ',')]
    params: Vec<String>,

    /// Environment variables forwarded as build params
    #[arg(long, env = "PLUGIN_PARAMS_FROM_ENV", value_delimiter = ',')]
    params_from_env: Vec<String>,

    /// Promote to this environment instead of restarting
    #[arg(long, env = "PLUGIN_DEPLOY")]
    deploy: Option<String>,

    /// Block until each triggered build finishes
    #[arg(long, env = "PLUGIN_BLOCK")]
    block: bool,

    /// How long to block on a triggered build
    #[arg(
        long,
        alias = "blockTimeout",
        env = "PLUGIN_BLOCK_TIMEOUT",
        default_value = "60m",
        value_parser = duration_arg
    )]
    block_timeout: Duration,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn into_config(self) -> PluginConfig {
        PluginConfig {
            repositories: self
                .repositories
                .into_iter()
                .filter(|r| !r.trim().is_empty())
                .collect(),
            server: self.server,
            token: self.token,
            wait: self.wait,
            timeout: self.timeout,
            last_successful: self.last_successful,
            params: self.params,
            params_from_env: self.params_from_env,
            deploy: self.deploy,
            block: self.block,
            block_timeout: self.block_timeout,
        }
    }
}

fn duration_arg(raw: &str) -> std::result::Result<Duration, String> {
    parse_duration(raw).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    downstream_core::init_tracing(cli.json, level);

    let env = ProcessEnv::capture();
    let settings = Settings::validate(cli.into_config(), &env)?;

    let client = DroneClient::new(DroneConfig::new(&settings.server, &settings.token))
        .with_context(|| format!("Failed to create client for {}", settings.server))?;

    // SIGINT/SIGTERM cancel the downstream build while blocking on it and
    // abort the run at any other time.
    let interrupts = InterruptGate::new();
    tokio::select! {
        result = run_all(&client, &settings, &interrupts) => {
            let triggered = result?;
            info!(count = triggered.len(), "downstream run complete");
            Ok(())
        }
        signal = unconsumed_signal(&interrupts) => {
            error!("received {}, aborting", signal);
            std::process::exit(signal.exit_code());
        }
    }
}

/// First signal no blocking call took. Never resolves when listeners
/// cannot be installed.
async fn unconsumed_signal(interrupts: &InterruptGate) -> Signal {
    match route_signals(interrupts).await {
        Ok(signal) => signal,
        Err(err) => {
            warn!("failed to install signal handlers: {}", err);
            std::future::pending().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["downstream"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_comma_separated_lists() {
        let cli = parse(&[
            "--repositories",
            "octo/app@main,octo/lib",
            "--params",
            "A=1,B=2",
        ]);
        assert_eq!(cli.repositories, vec!["octo/app@main", "octo/lib"]);
        assert_eq!(cli.params, vec!["A=1", "B=2"]);
    }

    #[test]
    fn test_duration_flags() {
        let cli = parse(&["--timeout", "1m30s", "--blockTimeout", "45"]);
        assert_eq!(cli.timeout, Duration::from_secs(90));
        assert_eq!(cli.block_timeout, Duration::from_secs(45));

        let err = Cli::try_parse_from(["downstream", "--timeout", "soon"]).unwrap_err();
        assert!(err.to_string().contains("invalid duration"));

        let err = Cli::try_parse_from(["downstream", "--block-timeout", "99999999999999999999s"])
            .unwrap_err();
        assert!(err.to_string().contains("invalid duration"));
    }

    #[test]
    fn test_into_config_drops_blank_repositories() {
        let cli = parse(&["--repositories", "octo/app,,", "--deploy", "prod"]);
        let config = cli.into_config();
        assert_eq!(config.repositories, vec!["octo/app"]);
        assert_eq!(config.deploy.as_deref(), Some("prod"));
    }
}
