//! Block until a triggered build finishes.
//!
//! Polls the build every `interval` until it reaches a terminal status, the
//! timeout passes, or an interrupt arrives. On interrupt the downstream
//! build is cancelled. Interrupts are only accepted while a block call runs.

use std::future::Future;
use std::time::Duration;

use drone_client::{BuildStatus, CiClient};

use crate::error::{DownstreamError, Result};
use crate::interrupt::InterruptGate;
use crate::obs::emit_block_finished;
use crate::poller::{deadline_after, BuildPoller};
use crate::target::Target;

/// How blocking ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockOutcome {
    Success,
    Failure(BuildStatus),
    TimedOut,
    Cancelled,
}

impl BlockOutcome {
    fn label(&self) -> &'static str {
        match self {
            BlockOutcome::Success => "success",
            BlockOutcome::Failure(_) => "failure",
            BlockOutcome::TimedOut => "timed_out",
            BlockOutcome::Cancelled => "cancelled",
        }
    }

    /// Map to the run result: only `Success` lets the run continue.
    pub fn into_result(self, target: &Target, number: u64) -> Result<()> {
        let entry = target.entry.clone();
        match self {
            BlockOutcome::Success => Ok(()),
            BlockOutcome::Failure(status) => Err(DownstreamError::BuildFailed {
                entry,
                number,
                status,
            }),
            BlockOutcome::TimedOut => Err(DownstreamError::BlockTimeout { entry, number }),
            BlockOutcome::Cancelled => Err(DownstreamError::Cancelled { entry, number }),
        }
    }
}

pub struct CompletionBlocker<'a, C: CiClient + ?Sized> {
    client: &'a C,
    interval: Duration,
    timeout: Duration,
}

impl<'a, C: CiClient + ?Sized> CompletionBlocker<'a, C> {
    pub fn new(client: &'a C, interval: Duration, timeout: Duration) -> Self {
        CompletionBlocker {
            client,
            interval,
            timeout,
        }
    }

    /// Block on build `number`, cancelling it when `interrupts` delivers a
    /// signal.
    ///
    /// The gate is armed for the duration of this call only.
    pub async fn block_until_finished(
        &self,
        target: &Target,
        number: u64,
        interrupts: &InterruptGate,
    ) -> Result<BlockOutcome> {
        let mut window = interrupts.arm();
        let outcome = self.block(target, number, window.interrupted()).await;
        drop(window);
        outcome
    }

    /// Block on build `number`, cancelling it when `interrupt` completes.
    ///
    /// Fetch errors are fatal. A failed cancel is reported as
    /// [`DownstreamError::CancelFailed`].
    pub async fn block<F>(&self, target: &Target, number: u64, interrupt: F) -> Result<BlockOutcome>
    where
        F: Future<Output = ()>,
    {
        println!("\nblocking until triggered build is finished");

        let mut poller = BuildPoller::new(self.interval, deadline_after(self.timeout));
        tokio::pin!(interrupt);

        let outcome = loop {
            tokio::select! {
                biased;
                _ = &mut interrupt => {
                    self.client
                        .cancel_build(&target.owner, &target.name, number)
                        .await
                        .map_err(|source| DownstreamError::CancelFailed {
                            entry: target.entry.clone(),
                            number,
                            source,
                        })?;
                    println!("canceled downstream job {number}");
                    break BlockOutcome::Cancelled;
                }
                tick = poller.tick() => {
                    if tick.is_none() {
                        break BlockOutcome::TimedOut;
                    }

                    let build = self
                        .client
                        .build(&target.owner, &target.name, number)
                        .await
                        .map_err(|source| DownstreamError::BlockFetch {
                            entry: target.entry.clone(),
                            number,
                            source,
                        })?;

                    if build.status.is_success() {
                        break BlockOutcome::Success;
                    }
                    if build.status.is_failure() {
                        break BlockOutcome::Failure(build.status);
                    }
                    println!("Waiting for build {number} in status {}", build.status);
                }
            }
        };

        emit_block_finished(&target.entry, number, outcome.label());
        Ok(outcome)
    }
}
