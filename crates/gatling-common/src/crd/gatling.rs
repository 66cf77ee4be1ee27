//! Gatling CRD types
//!
//! Defines `Gatling`: one distributed load-test run, with optional report
//! generation and notification. All workflow progress is recorded in
//! `GatlingStatus` so the controller can resume after a restart.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{
    Affinity, EnvVar, PersistentVolumeClaimSpec as K8sPersistentVolumeClaimSpec,
    PersistentVolumeSpec as K8sPersistentVolumeSpec, PodSecurityContext, ResourceRequirements,
    SecurityContext, Toleration, Volume, VolumeMount,
};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Load-test image used when `podSpec.gatlingImage` is unset
pub const DEFAULT_GATLING_IMAGE: &str = "ghcr.io/st-tech/gatling:latest";

/// rclone image used when `podSpec.rcloneImage` is unset
pub const DEFAULT_RCLONE_IMAGE: &str = "rclone/rclone:latest";

/// Directory the simulations are copied to inside the runner container
pub const DEFAULT_SIMULATIONS_DIRECTORY_PATH: &str = "/opt/gatling/user-files/simulations";

/// Directory holding simulation resources inside the runner container
pub const DEFAULT_RESOURCES_DIRECTORY_PATH: &str = "/opt/gatling/user-files/resources";

/// Directory the load-test tool writes its results to
pub const DEFAULT_RESULTS_DIRECTORY_PATH: &str = "/opt/gatling/results";

/// Notification provider used when `notificationServiceSpec.provider` is unset
pub const DEFAULT_NOTIFICATION_PROVIDER: &str = "slack";

// =============================================================================
// Simulation format
// =============================================================================

/// How the simulations are packaged inside the load-test image
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SimulationFormat {
    /// Gatling bundle layout, run via `gatling.sh`
    #[default]
    Bundle,
    /// Gradle project, run via the gatling gradle plugin
    Gradle,
}

impl std::fmt::Display for SimulationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bundle => write!(f, "bundle"),
            Self::Gradle => write!(f, "gradle"),
        }
    }
}

// =============================================================================
// Pod Spec
// =============================================================================

/// Pod-level settings shared by the runner and reporter jobs
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    /// Image running the load test and the report generator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gatling_image: Option<String>,

    /// Image used for every storage transfer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rclone_image: Option<String>,

    /// Resources of the runner container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Scheduling affinity of runner and reporter pods
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    /// Tolerations of runner and reporter pods
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    /// Service account the pods run as; the waiter needs pod list/patch rights
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    /// Extra volumes attached to runner pods
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<Volume>,

    /// Pod-level security context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<PodSecurityContext>,

    /// Security context of the runner container only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner_container_security_context: Option<SecurityContext>,
}

// =============================================================================
// Cloud storage, notification and volume specs
// =============================================================================

/// Where runner logs and the generated report are stored
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CloudStorageSpec {
    /// Storage provider name: aws, gcp, azure or s3
    #[serde(default)]
    pub provider: String,

    /// Bucket (or container) name
    #[serde(default)]
    pub bucket: String,

    /// Bucket region, where the provider needs one
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,

    /// Environment passed to every transfer container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
}

/// Where the completion notification is posted
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationServiceSpec {
    /// Notification provider name; defaults to slack
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,

    /// Secret holding the provider credentials
    #[serde(default)]
    pub secret_name: String,
}

/// A PersistentVolume created alongside the run
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeSpec {
    /// Name of the PersistentVolume
    pub name: String,
    /// Kubernetes PersistentVolume spec
    pub spec: K8sPersistentVolumeSpec,
}

/// A PersistentVolumeClaim created alongside the run
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimSpec {
    /// Name of the PersistentVolumeClaim
    pub name: String,
    /// Kubernetes PersistentVolumeClaim spec
    pub spec: K8sPersistentVolumeClaimSpec,
}

// =============================================================================
// Test scenario
// =============================================================================

/// What to run and how many pods run it
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestScenarioSpec {
    /// UTC wall-clock time (`%Y-%m-%d %H:%M:%S`) at which all runners start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    /// Number of runner pods
    #[serde(default = "default_parallelism")]
    #[schemars(range(min = 1))]
    pub parallelism: i32,

    /// Packaging format of the simulations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulations_format: Option<SimulationFormat>,

    /// Simulations directory inside the runner container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulations_directory_path: Option<String>,

    /// Resources directory inside the runner container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources_directory_path: Option<String>,

    /// Results directory inside the runner container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_directory_path: Option<String>,

    /// Fully qualified simulation class to run
    pub simulation_class: String,

    /// Simulation sources, one entry per file
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub simulation_data: BTreeMap<String, String>,

    /// Resource files, one entry per file
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resource_data: BTreeMap<String, String>,

    /// Load-test tool configuration files, one entry per file
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gatling_conf: BTreeMap<String, String>,

    /// Environment of the runner container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    /// Extra mounts of the runner container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

fn default_parallelism() -> i32 {
    1
}

impl Default for TestScenarioSpec {
    fn default() -> Self {
        Self {
            start_time: None,
            parallelism: default_parallelism(),
            simulations_format: None,
            simulations_directory_path: None,
            resources_directory_path: None,
            results_directory_path: None,
            simulation_class: String::new(),
            simulation_data: BTreeMap::new(),
            resource_data: BTreeMap::new(),
            gatling_conf: BTreeMap::new(),
            env: Vec::new(),
            volume_mounts: Vec::new(),
        }
    }
}

// =============================================================================
// CRD
// =============================================================================

/// A distributed Gatling load test with optional report and notification
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "gatling-operator.tech.zozo.com",
    version = "v1alpha1",
    kind = "Gatling",
    plural = "gatlings",
    namespaced,
    status = "GatlingStatus",
    printcolumn = r#"{"name":"Runned","type":"string","jsonPath":".status.runnerCompletions"}"#,
    printcolumn = r#"{"name":"Reported","type":"boolean","jsonPath":".status.reportCompleted"}"#,
    printcolumn = r#"{"name":"Notified","type":"boolean","jsonPath":".status.notificationCompleted"}"#,
    printcolumn = r#"{"name":"ReportURL","type":"string","jsonPath":".status.reportUrl"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GatlingSpec {
    /// Upload runner logs and build an HTML report from them
    #[serde(default)]
    pub generate_report: bool,

    /// Keep the per-pod HTML report next to the raw results
    #[serde(default)]
    pub generate_local_report: bool,

    /// Post a notification once the run (and report) is done
    #[serde(default)]
    pub notify_report: bool,

    /// Delete the jobs and this resource once the workflow finishes
    #[serde(default)]
    pub cleanup_after_job_done: bool,

    /// Pod settings
    #[serde(default)]
    pub pod_spec: PodSpec,

    /// Report storage settings
    #[serde(default)]
    pub cloud_storage_spec: CloudStorageSpec,

    /// Optional PersistentVolume to create
    #[serde(rename = "persistentVolume", default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_spec: Option<PersistentVolumeSpec>,

    /// Optional PersistentVolumeClaim to create
    #[serde(
        rename = "persistentVolumeClaim",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub persistent_volume_claim_spec: Option<PersistentVolumeClaimSpec>,

    /// Notification settings
    #[serde(default)]
    pub notification_service_spec: NotificationServiceSpec,

    /// Scenario settings
    #[serde(default)]
    pub test_scenario_spec: TestScenarioSpec,
}

// =============================================================================
// Status
// =============================================================================

/// Observed progress of a Gatling run
///
/// Every field is always serialized so a merge patch can reset flags from a
/// previous run back to their zero value.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GatlingStatus {
    /// Runner pods currently active
    #[serde(default)]
    pub active: i32,

    /// Runner pods that succeeded
    #[serde(default)]
    pub succeeded: i32,

    /// Runner pods that failed
    #[serde(default)]
    pub failed: i32,

    /// Name of the runner job once created
    #[serde(default)]
    pub runner_job_name: String,

    /// Epoch seconds at which the runner job was requested
    #[serde(default)]
    pub runner_start_time: i64,

    /// Runner phase finished with every pod successful
    #[serde(default)]
    pub runner_completed: bool,

    /// Progress text `<succeeded>/<parallelism>`
    #[serde(default)]
    pub runner_completions: String,

    /// Name of the reporter job once created
    #[serde(default)]
    pub reporter_job_name: String,

    /// Epoch seconds at which the reporter job was requested
    #[serde(default)]
    pub reporter_start_time: i64,

    /// Report phase finished
    #[serde(default)]
    pub report_completed: bool,

    /// Storage location the runners upload to and the reporter reads from
    #[serde(default)]
    pub report_storage_path: String,

    /// Public address of the generated report
    #[serde(default)]
    pub report_url: String,

    /// Notification phase finished
    #[serde(default)]
    pub notification_completed: bool,

    /// Last fatal message; the workflow stops once this is set
    #[serde(default)]
    pub error: Option<String>,
}

impl GatlingStatus {
    /// Whether the stored report path and URL can be reused for this run
    pub fn has_storage_info(&self) -> bool {
        !self.report_storage_path.is_empty() && !self.report_url.is_empty()
    }
}

// =============================================================================
// Defaults and derived names
// =============================================================================

fn or_default<'a>(value: &'a Option<String>, default: &'a str) -> &'a str {
    match value.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => default,
    }
}

impl GatlingSpec {
    /// Load-test image, falling back to [`DEFAULT_GATLING_IMAGE`]
    pub fn gatling_image(&self) -> &str {
        or_default(&self.pod_spec.gatling_image, DEFAULT_GATLING_IMAGE)
    }

    /// Transfer image, falling back to [`DEFAULT_RCLONE_IMAGE`]
    pub fn rclone_image(&self) -> &str {
        or_default(&self.pod_spec.rclone_image, DEFAULT_RCLONE_IMAGE)
    }

    /// Service account name, if one is configured
    pub fn service_account_name(&self) -> Option<&str> {
        self.pod_spec
            .service_account_name
            .as_deref()
            .filter(|s| !s.is_empty())
    }

    /// Simulation packaging format, bundle unless set
    pub fn simulation_format(&self) -> SimulationFormat {
        self.test_scenario_spec
            .simulations_format
            .unwrap_or_default()
    }

    /// Simulations directory inside the runner container
    pub fn simulations_directory_path(&self) -> &str {
        or_default(
            &self.test_scenario_spec.simulations_directory_path,
            DEFAULT_SIMULATIONS_DIRECTORY_PATH,
        )
    }

    /// Mount point of the simulations ConfigMap; files are copied from here
    /// into [`Self::simulations_directory_path`] before the run starts
    pub fn temp_simulations_directory_path(&self) -> String {
        format!("{}-temp", self.simulations_directory_path())
    }

    /// Resources directory inside the runner container
    pub fn resources_directory_path(&self) -> &str {
        or_default(
            &self.test_scenario_spec.resources_directory_path,
            DEFAULT_RESOURCES_DIRECTORY_PATH,
        )
    }

    /// Results directory inside the runner and reporter containers
    pub fn results_directory_path(&self) -> &str {
        or_default(
            &self.test_scenario_spec.results_directory_path,
            DEFAULT_RESULTS_DIRECTORY_PATH,
        )
    }

    /// Number of runner pods, never below one
    pub fn parallelism(&self) -> i32 {
        self.test_scenario_spec.parallelism.max(1)
    }

    /// Start time text, empty meaning "start immediately"
    pub fn start_time(&self) -> &str {
        self.test_scenario_spec.start_time.as_deref().unwrap_or("")
    }

    /// Notification provider name, falling back to [`DEFAULT_NOTIFICATION_PROVIDER`]
    pub fn notification_provider(&self) -> &str {
        match self.notification_service_spec.provider.as_str() {
            "" => DEFAULT_NOTIFICATION_PROVIDER,
            p => p,
        }
    }

    /// Storage provider name, empty when unset
    pub fn cloud_storage_provider(&self) -> &str {
        &self.cloud_storage_spec.provider
    }

    /// Storage bucket name, empty when unset
    pub fn cloud_storage_bucket(&self) -> &str {
        &self.cloud_storage_spec.bucket
    }

    /// Storage region, empty when unset
    pub fn cloud_storage_region(&self) -> &str {
        &self.cloud_storage_spec.region
    }

    /// Whether enough storage settings exist to build a report
    ///
    /// Provider and bucket are always required; region only for aws. The
    /// reporter phase is skipped when this is false.
    pub fn has_storage_coordinates(&self) -> bool {
        let provider = self.cloud_storage_provider();
        !provider.is_empty()
            && !self.cloud_storage_bucket().is_empty()
            && !(provider == "aws" && self.cloud_storage_region().is_empty())
    }

    /// Progress text shown in the `Runned` column
    pub fn runner_completions(&self, succeeded: i32) -> String {
        format!("{}/{}", succeeded, self.parallelism())
    }
}

impl Gatling {
    /// Current status, or an all-zero status for a fresh resource
    pub fn status_or_default(&self) -> GatlingStatus {
        self.status.clone().unwrap_or_default()
    }

    /// Whether the whole workflow has finished
    ///
    /// The runner must be done; the report must be done when requested;
    /// the notification must be done when requested.
    pub fn is_completed(&self) -> bool {
        let status = match &self.status {
            Some(s) => s,
            None => return false,
        };
        status.runner_completed
            && (!self.spec.generate_report || status.report_completed)
            && (!self.spec.notify_report || status.notification_completed)
    }

    /// Name of the runner job
    pub fn runner_job_name(&self) -> String {
        format!("{}-runner", self.name_any())
    }

    /// Name of the reporter job
    pub fn reporter_job_name(&self) -> String {
        format!("{}-reporter", self.name_any())
    }

    /// Name of the ConfigMap carrying simulation sources
    pub fn simulations_config_map_name(&self) -> String {
        format!("{}-simulations-data", self.name_any())
    }

    /// Name of the ConfigMap carrying resource files
    pub fn resources_config_map_name(&self) -> String {
        format!("{}-resources-data", self.name_any())
    }

    /// Name of the ConfigMap carrying load-test configuration files
    pub fn gatling_conf_config_map_name(&self) -> String {
        format!("{}-gatling-conf", self.name_any())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    fn gatling(spec: GatlingSpec) -> Gatling {
        Gatling::new("load-test", spec)
    }

    #[test]
    fn empty_spec_falls_back_to_defaults() {
        let spec = GatlingSpec::default();
        assert_eq!(spec.gatling_image(), DEFAULT_GATLING_IMAGE);
        assert_eq!(spec.rclone_image(), DEFAULT_RCLONE_IMAGE);
        assert_eq!(spec.simulation_format(), SimulationFormat::Bundle);
        assert_eq!(
            spec.simulations_directory_path(),
            DEFAULT_SIMULATIONS_DIRECTORY_PATH
        );
        assert_eq!(
            spec.temp_simulations_directory_path(),
            "/opt/gatling/user-files/simulations-temp"
        );
        assert_eq!(spec.resources_directory_path(), DEFAULT_RESOURCES_DIRECTORY_PATH);
        assert_eq!(spec.results_directory_path(), DEFAULT_RESULTS_DIRECTORY_PATH);
        assert_eq!(spec.parallelism(), 1);
        assert_eq!(spec.start_time(), "");
        assert_eq!(spec.notification_provider(), "slack");
        assert!(spec.service_account_name().is_none());
    }

    #[test]
    fn empty_strings_count_as_unset() {
        let mut spec = GatlingSpec::default();
        spec.pod_spec.gatling_image = Some(String::new());
        spec.pod_spec.service_account_name = Some(String::new());
        spec.test_scenario_spec.results_directory_path = Some(String::new());
        assert_eq!(spec.gatling_image(), DEFAULT_GATLING_IMAGE);
        assert_eq!(spec.results_directory_path(), DEFAULT_RESULTS_DIRECTORY_PATH);
        assert!(spec.service_account_name().is_none());
    }

    #[test]
    fn aws_storage_requires_region() {
        let mut spec = GatlingSpec::default();
        assert!(!spec.has_storage_coordinates());

        spec.cloud_storage_spec.provider = "aws".to_string();
        spec.cloud_storage_spec.bucket = "reports".to_string();
        assert!(!spec.has_storage_coordinates());

        spec.cloud_storage_spec.region = "ap-northeast-1".to_string();
        assert!(spec.has_storage_coordinates());
    }

    #[test]
    fn gcp_storage_needs_only_provider_and_bucket() {
        let mut spec = GatlingSpec::default();
        spec.cloud_storage_spec.provider = "gcp".to_string();
        assert!(!spec.has_storage_coordinates());

        spec.cloud_storage_spec.bucket = "reports".to_string();
        assert!(spec.has_storage_coordinates());
        assert_eq!(spec.cloud_storage_region(), "");
    }

    #[test]
    fn runner_completions_uses_parallelism() {
        let mut spec = GatlingSpec::default();
        spec.test_scenario_spec.parallelism = 3;
        assert_eq!(spec.runner_completions(2), "2/3");
    }

    #[test]
    fn completion_depends_on_requested_phases() {
        let mut g = gatling(GatlingSpec::default());
        assert!(!g.is_completed());

        g.status = Some(GatlingStatus {
            runner_completed: true,
            ..Default::default()
        });
        assert!(g.is_completed());

        g.spec.generate_report = true;
        assert!(!g.is_completed());
        if let Some(s) = g.status.as_mut() {
            s.report_completed = true;
        }
        assert!(g.is_completed());

        g.spec.notify_report = true;
        assert!(!g.is_completed());
        if let Some(s) = g.status.as_mut() {
            s.notification_completed = true;
        }
        assert!(g.is_completed());
    }

    #[test]
    fn derived_names_follow_resource_name() {
        let g = gatling(GatlingSpec::default());
        assert_eq!(g.runner_job_name(), "load-test-runner");
        assert_eq!(g.reporter_job_name(), "load-test-reporter");
        assert_eq!(g.simulations_config_map_name(), "load-test-simulations-data");
        assert_eq!(g.resources_config_map_name(), "load-test-resources-data");
        assert_eq!(g.gatling_conf_config_map_name(), "load-test-gatling-conf");
    }

    #[test]
    fn spec_parses_from_camel_case_manifest() {
        let manifest = r#"
generateReport: true
notifyReport: false
cleanupAfterJobDone: true
podSpec:
  gatlingImage: example/gatling:3.9
  serviceAccountName: gatling-operator-worker
cloudStorageSpec:
  provider: gcp
  bucket: gatling-reports
  region: asia-northeast1
notificationServiceSpec:
  secretName: slack-webhook
testScenarioSpec:
  parallelism: 3
  simulationsFormat: gradle
  simulationClass: MyBasicSimulation
  simulationData:
    MyBasicSimulation.scala: "class MyBasicSimulation"
"#;
        let spec: GatlingSpec = serde_yaml::from_str(manifest).expect("manifest should parse");
        assert!(spec.generate_report);
        assert!(spec.cleanup_after_job_done);
        assert_eq!(spec.gatling_image(), "example/gatling:3.9");
        assert_eq!(spec.service_account_name(), Some("gatling-operator-worker"));
        assert!(spec.has_storage_coordinates());
        assert_eq!(spec.notification_service_spec.secret_name, "slack-webhook");
        assert_eq!(spec.parallelism(), 3);
        assert_eq!(spec.simulation_format(), SimulationFormat::Gradle);
        assert_eq!(spec.test_scenario_spec.simulation_data.len(), 1);
    }

    #[test]
    fn status_serializes_zero_values_for_merge_patches() {
        let value = serde_json::to_value(GatlingStatus::default()).expect("serialize");
        assert_eq!(value["runnerCompleted"], false);
        assert_eq!(value["reportCompleted"], false);
        assert_eq!(value["notificationCompleted"], false);
        assert_eq!(value["runnerJobName"], "");
        assert!(value["error"].is_null());
    }

    #[test]
    fn crd_exposes_print_columns() {
        let crd = Gatling::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("gatlings.gatling-operator.tech.zozo.com")
        );
        let columns: Vec<String> = crd.spec.versions[0]
            .additional_printer_columns
            .as_ref()
            .expect("print columns")
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(
            columns,
            vec!["Runned", "Reported", "Notified", "ReportURL", "Age"]
        );
    }
}
