//! Gatling reconciler for the Gatling operator
//!
//! This crate turns a Gatling resource into runner and reporter Jobs and
//! drives the Runner → Reporter → Notification workflow.
//!
//! Related crates:
//! - `gatling-common`: CRD, errors, events and telemetry
//! - `gatling-providers`: storage commands and notification backends

pub mod client;
pub mod commands;
pub mod compiler;
pub mod controller;
pub mod error;
pub mod notifier;
pub mod phases;
pub mod storage;

// Re-export controller types
pub use client::{GatlingKubeClient, GatlingKubeClientImpl};
pub use controller::{error_policy, reconcile, Context, ControllerConfig, CONTROLLER_NAME};
pub use error::ControllerError;
pub use notifier::{Notifier, ProviderNotifier};

// Re-export common error types
pub use gatling_common::{Error, Result};
