//! Per-target trigger orchestration.
//!
//! Each target runs a tick loop: resolve the reference build, wait while it
//! is in flight (when `wait` is set), then restart it or promote it to the
//! deploy environment. After a trigger the new build is optionally blocked
//! on until it finishes.
//!
//! Fetch and trigger failures are retried on the next tick only once the
//! target is already waiting on an in-flight build. Before that they are
//! fatal, as is any durable absence (missing build, no passing build).

use std::time::Duration;

use drone_client::{Build, CiClient};
use tokio::time::Instant;
use tracing::{warn, Instrument};

use crate::blocker::CompletionBlocker;
use crate::error::{DownstreamError, Result};
use crate::interrupt::InterruptGate;
use crate::obs::{emit_transient_retry, emit_triggered, emit_waiting, target_span};
use crate::poller::{deadline_after, BuildPoller};
use crate::settings::Settings;
use crate::target::Target;

/// Mutable state of one target's tick loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    /// An in-flight reference build was seen and `wait` is set.
    pub waiting: bool,
    pub deadline: Instant,
    pub tick_interval: Duration,
}

impl PollState {
    /// Fresh state with the deadline `timeout` from now.
    pub fn start(tick_interval: Duration, timeout: Duration) -> Self {
        PollState {
            waiting: false,
            deadline: deadline_after(timeout),
            tick_interval,
        }
    }
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing triggered yet; tick again.
    Continue,
    /// The new build started by the trigger.
    Triggered(Build),
}

pub struct TriggerOrchestrator<'a, C: CiClient + ?Sized> {
    client: &'a C,
    settings: &'a Settings,
    interrupts: &'a InterruptGate,
}

impl<'a, C: CiClient + ?Sized> TriggerOrchestrator<'a, C> {
    /// `interrupts` is armed only while blocking on a triggered build.
    pub fn new(client: &'a C, settings: &'a Settings, interrupts: &'a InterruptGate) -> Self {
        TriggerOrchestrator {
            client,
            settings,
            interrupts,
        }
    }

    /// Trigger `target` and, when blocking is enabled, wait for the new
    /// build to succeed.
    pub async fn run_target(&self, target: &Target) -> Result<Build> {
        let build = self.trigger(target).await?;

        if self.settings.block {
            let blocker = CompletionBlocker::new(
                self.client,
                self.settings.block_interval,
                self.settings.block_timeout,
            );
            blocker
                .block_until_finished(target, build.number, self.interrupts)
                .await?
                .into_result(target, build.number)?;
        }

        Ok(build)
    }

    /// Tick until a trigger succeeds, a fatal error occurs, or the poll
    /// timeout passes.
    pub async fn trigger(&self, target: &Target) -> Result<Build> {
        let mut state = PollState::start(self.settings.poll_interval, self.settings.timeout);
        let mut poller = BuildPoller::new(state.tick_interval, state.deadline);

        while poller.tick().await.is_some() {
            if let TickOutcome::Triggered(build) = self.step(target, &mut state).await? {
                return Ok(build);
            }
        }

        Err(DownstreamError::PollTimeout {
            entry: target.entry.clone(),
        })
    }

    /// One tick of the decision procedure.
    pub async fn step(&self, target: &Target, state: &mut PollState) -> Result<TickOutcome> {
        let attempt = match &self.settings.deploy {
            Some(environment) => self.deploy_step(target, environment, state).await,
            None => self.restart_step(target, state).await,
        };

        match attempt {
            Err(err) if state.waiting && err.is_transient() => {
                emit_transient_retry(&target.entry, &err);
                Ok(TickOutcome::Continue)
            }
            other => other,
        }
    }

    async fn deploy_step(
        &self,
        target: &Target,
        environment: &str,
        state: &mut PollState,
    ) -> Result<TickOutcome> {
        let reference = if self.settings.last_successful {
            self.last_successful_build(target).await?
        } else {
            self.build_by_number(target).await?
        };

        if self.hold_for_in_flight(target, &reference, state) {
            return Ok(TickOutcome::Continue);
        }

        let triggered = self
            .client
            .promote_build(
                &target.owner,
                &target.name,
                reference.number,
                environment,
                self.settings.params.as_map(),
            )
            .await
            .map_err(|source| DownstreamError::Trigger {
                entry: target.entry.clone(),
                action: "deploy",
                source,
            })?;

        println!(
            "starting deploy for {}/{} env - {} build - {}",
            target.owner, target.name, environment, reference.number
        );
        self.echo_params();
        emit_triggered(&target.entry, "deploy", reference.number, triggered.number);

        Ok(TickOutcome::Triggered(triggered))
    }

    async fn restart_step(&self, target: &Target, state: &mut PollState) -> Result<TickOutcome> {
        let mut reference = self
            .client
            .last_build(&target.owner, &target.name, target.branch())
            .await
            .map_err(|source| {
                if source.is_not_found() {
                    DownstreamError::LatestBuildNotFound {
                        entry: target.entry.clone(),
                        source,
                    }
                } else {
                    DownstreamError::Fetch {
                        entry: target.entry.clone(),
                        source,
                    }
                }
            })?;

        if self.hold_for_in_flight(target, &reference, state) {
            return Ok(TickOutcome::Continue);
        }

        if self.settings.last_successful && !reference.status.is_success() {
            reference = self.last_successful_build(target).await?;
        }

        let triggered = self
            .client
            .restart_build(
                &target.owner,
                &target.name,
                reference.number,
                self.settings.params.as_map(),
            )
            .await
            .map_err(|source| DownstreamError::Trigger {
                entry: target.entry.clone(),
                action: "build",
                source,
            })?;

        println!("Restarting build {} for {}", reference.number, target.entry);
        self.echo_params();
        emit_triggered(&target.entry, "restart", reference.number, triggered.number);

        Ok(TickOutcome::Triggered(triggered))
    }

    /// True when `wait` is set and `reference` is still pending or running.
    /// Enters the waiting state on first sight.
    fn hold_for_in_flight(&self, target: &Target, reference: &Build, state: &mut PollState) -> bool {
        if !self.settings.wait || !reference.status.is_in_flight() {
            return false;
        }

        if !state.waiting {
            println!(
                "BuildLast for repository: {}, returned build number: {} with a status of {}. Will retry for {:?}.",
                target.entry, reference.number, reference.status, self.settings.timeout
            );
            emit_waiting(&target.entry, reference.number, reference.status.as_str());
            state.waiting = true;
        }
        true
    }

    async fn build_by_number(&self, target: &Target) -> Result<Build> {
        // validation guarantees a numeric selector on this path
        let number = target.build_number().unwrap_or_default();
        self.client
            .build(&target.owner, &target.name, number)
            .await
            .map_err(|source| {
                if source.is_not_found() {
                    DownstreamError::BuildNotFound {
                        entry: target.entry.clone(),
                        number,
                    }
                } else {
                    DownstreamError::Fetch {
                        entry: target.entry.clone(),
                        source,
                    }
                }
            })
    }

    /// Newest passing build on the selector's branch.
    async fn last_successful_build(&self, target: &Target) -> Result<Build> {
        let no_successful = || DownstreamError::NoSuccessfulBuild {
            entry: target.entry.clone(),
        };

        let builds = self
            .client
            .list_builds(&target.owner, &target.name)
            .await
            .map_err(|source| {
                if source.is_not_found() {
                    no_successful()
                } else {
                    DownstreamError::Fetch {
                        entry: target.entry.clone(),
                        source,
                    }
                }
            })?;

        builds
            .into_iter()
            .find(|b| b.source == target.branch() && b.status.is_success())
            .ok_or_else(no_successful)
    }

    fn echo_params(&self) {
        for line in self.settings.params.echo_lines() {
            println!("{line}");
        }
    }
}

/// Process every target in order, stopping at the first failure.
///
/// Returns the triggered builds.
pub async fn run_all<C: CiClient + ?Sized>(
    client: &C,
    settings: &Settings,
    interrupts: &InterruptGate,
) -> Result<Vec<Build>> {
    if settings.targets.is_empty() {
        warn!("no repositories configured; nothing to trigger");
        return Ok(Vec::new());
    }

    let orchestrator = TriggerOrchestrator::new(client, settings, interrupts);
    let mut triggered = Vec::with_capacity(settings.targets.len());

    for target in &settings.targets {
        let build = orchestrator
            .run_target(target)
            .instrument(target_span(&target.entry))
            .await?;
        triggered.push(build);
    }

    Ok(triggered)
}
