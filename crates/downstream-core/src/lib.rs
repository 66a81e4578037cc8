//! Downstream Core Library
//!
//! Triggers builds or deployments on other repositories of a Drone server and
//! optionally blocks until they finish.
//!
//! Flow per target: parse the entry, poll the remote build state until a
//! trigger is allowed, trigger, then optionally block on the new build.
//! Targets run strictly one after another; the first failure ends the run.

pub mod blocker;
pub mod env;
pub mod error;
pub mod interrupt;
pub mod obs;
pub mod orchestrator;
pub mod params;
pub mod poller;
pub mod settings;
pub mod target;
pub mod telemetry;

pub use blocker::{BlockOutcome, CompletionBlocker};
pub use env::ProcessEnv;
pub use error::{DownstreamError, ParamError, Result, TargetParseError};
pub use interrupt::{route_signals, InterruptGate, InterruptWindow, Signal};
pub use obs::target_span;
pub use orchestrator::{run_all, PollState, TickOutcome, TriggerOrchestrator};
pub use params::{collect_params, ParameterSet};
pub use poller::{deadline_after, BuildPoller};
pub use settings::{parse_duration, PluginConfig, Settings, MAX_DURATION_SECONDS};
pub use target::Target;
pub use telemetry::init_tracing;

/// Downstream version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
