//! Drone-Client: Remote CI access for downstream triggering
//!
//! This crate owns everything the orchestrator knows about the remote CI
//! server: the build model, the `CiClient` trait it drives, the HTTP
//! implementation against the Drone REST API, and in-memory fakes for tests.
//!
//! ## Operations
//!
//! - `last_build`: latest build of a branch
//! - `build`: a build by number
//! - `list_builds`: recent builds, newest first
//! - `restart_build` / `promote_build`: triggers
//! - `cancel_build`: stop a running build

pub mod build;
pub mod client;
pub mod drone;
pub mod error;
pub mod fakes;

pub use build::{Build, BuildStatus};
pub use client::{BuildParams, CiClient, ClientResult};
pub use drone::{DroneClient, DroneConfig};
pub use error::ClientError;
