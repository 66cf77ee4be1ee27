//! Custom Resource Definitions for the Gatling operator

mod gatling;

pub use gatling::{
    CloudStorageSpec, Gatling, GatlingSpec, GatlingStatus, NotificationServiceSpec,
    PersistentVolumeClaimSpec, PersistentVolumeSpec, PodSpec, SimulationFormat, TestScenarioSpec,
    DEFAULT_GATLING_IMAGE, DEFAULT_NOTIFICATION_PROVIDER, DEFAULT_RCLONE_IMAGE,
    DEFAULT_RESOURCES_DIRECTORY_PATH, DEFAULT_RESULTS_DIRECTORY_PATH,
    DEFAULT_SIMULATIONS_DIRECTORY_PATH,
};
