//! Common types for the Gatling operator: CRDs, errors, events and telemetry

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod events;
pub mod kube_utils;
pub mod metrics;
pub mod telemetry;

pub use error::Error;
pub use events::{EventPublisher, KubeEventPublisher, NoopEventPublisher};

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group of the Gatling CRD
pub const API_GROUP: &str = "gatling-operator.tech.zozo.com";

/// Field manager used for server-side apply and status patches
pub const FIELD_MANAGER: &str = "gatling-operator";

/// Label carrying the owning Gatling resource name
pub const LABEL_APP: &str = "app";

/// Label distinguishing runner pods from other pods of the same run
pub const LABEL_TYPE: &str = "type";
