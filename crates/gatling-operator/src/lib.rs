//! Gatling operator process: configuration, CRD install and controller wiring

#![deny(missing_docs)]

/// Command line and environment configuration
pub mod config;
/// Controller construction
pub mod controller_runner;
/// CRD installation on startup
pub mod startup;
