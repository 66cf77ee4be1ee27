//! Gatling compiler: turns a `Gatling` into the Kubernetes objects it needs
//!
//! - ConfigMaps for inline simulation, resource and configuration files
//! - an optional PersistentVolume and PersistentVolumeClaim
//! - the runner Job (rendezvous init container, load-test container and,
//!   when reporting, a result-transfer sidecar)
//! - the reporter Job (aggregate, render, upload)
//!
//! Compilation is pure. Every namespaced object is labelled `app=<name>` and
//! owned by the Gatling so it is garbage-collected with it.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, DownwardAPIVolumeFile, DownwardAPIVolumeSource,
    EmptyDirVolumeSource, EnvVar, ObjectFieldSelector, PersistentVolume, PersistentVolumeClaim,
    PodSpec, PodTemplateSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::ResourceExt;

use gatling_common::crd::Gatling;
use gatling_common::kube_utils::{owner_reference, with_label};
use gatling_common::{LABEL_APP, LABEL_TYPE};
use gatling_providers::StorageProvider;

use crate::commands::{self, RunnerCommandArgs, POD_INFO_MOUNT_PATH, WAITER_IMAGE};
use crate::error::ControllerError;

/// Init container implementing the rendezvous barrier
pub const WAITER_CONTAINER: &str = "gatling-waiter";
/// Container running the load test
pub const RUNNER_CONTAINER: &str = "gatling-runner";
/// Sidecar uploading runner logs
pub const RESULT_TRANSFERER_CONTAINER: &str = "gatling-result-transferer";
/// Reporter init container downloading runner logs
pub const RESULT_AGGREGATOR_CONTAINER: &str = "gatling-result-aggregator";
/// Reporter init container rendering the report
pub const REPORT_GENERATOR_CONTAINER: &str = "gatling-report-generator";
/// Reporter container uploading the report
pub const REPORT_TRANSFERER_CONTAINER: &str = "gatling-report-transferer";

const SIMULATIONS_VOLUME: &str = "simulations-data-volume";
const RESOURCES_VOLUME: &str = "resources-data-volume";
const GATLING_CONF_VOLUME: &str = "gatling-conf-volume";
const RESULTS_VOLUME: &str = "results-data-volume";
const AGGREGATE_VOLUME: &str = "aggregate-data-volume";
const POD_INFO_VOLUME: &str = "pod-info";

/// Where the load-test tool reads `gatling.conf` and `logback.xml`
pub const GATLING_CONF_MOUNT_PATH: &str = "/opt/gatling/conf";

/// Pod template label value of runner pods
pub const RUNNER_POD_TYPE: &str = "runner";
/// Pod template label value of reporter pods
pub const REPORTER_POD_TYPE: &str = "reporter";

// =============================================================================
// Shared builders
// =============================================================================

fn namespace_of(gatling: &Gatling) -> Result<String, ControllerError> {
    gatling.namespace().ok_or(ControllerError::MissingNamespace)
}

/// Metadata of a namespaced object owned by the Gatling
fn owned_meta(gatling: &Gatling, name: String) -> Result<ObjectMeta, ControllerError> {
    let owner_references =
        owner_reference(gatling).ok_or_else(|| ControllerError::MissingUid(gatling.name_any()))?;
    Ok(ObjectMeta {
        name: Some(name),
        namespace: Some(namespace_of(gatling)?),
        labels: Some(BTreeMap::from([(
            LABEL_APP.to_string(),
            gatling.name_any(),
        )])),
        owner_references: Some(owner_references),
        ..Default::default()
    })
}

fn pod_meta(gatling: &Gatling, pod_type: &str) -> ObjectMeta {
    ObjectMeta {
        labels: Some(with_label(gatling.metadata.labels.as_ref(), LABEL_TYPE, pod_type)),
        annotations: gatling.metadata.annotations.clone(),
        ..Default::default()
    }
}

fn shell_container(name: &str, image: &str, script: String) -> Container {
    Container {
        name: name.to_string(),
        image: Some(image.to_string()),
        command: Some(vec!["/bin/sh".to_string(), "-c".to_string()]),
        args: Some(vec![script]),
        ..Default::default()
    }
}

fn mount(name: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: name.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}

fn config_map_volume(name: &str, config_map: String) -> Volume {
    Volume {
        name: name.to_string(),
        config_map: Some(ConfigMapVolumeSource {
            name: config_map,
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn empty_dir_volume(name: &str) -> Volume {
    Volume {
        name: name.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

fn non_empty(env: &[EnvVar]) -> Option<Vec<EnvVar>> {
    (!env.is_empty()).then(|| env.to_vec())
}

fn storage_provider(gatling: &Gatling) -> Option<StorageProvider> {
    StorageProvider::from_name(
        gatling.spec.cloud_storage_provider(),
        &gatling.spec.cloud_storage_spec.env,
    )
}

// =============================================================================
// ConfigMaps, PV, PVC
// =============================================================================

/// ConfigMaps for every non-empty inline data map of the scenario
pub fn compile_config_maps(gatling: &Gatling) -> Result<Vec<ConfigMap>, ControllerError> {
    let scenario = &gatling.spec.test_scenario_spec;
    let candidates = [
        (gatling.simulations_config_map_name(), &scenario.simulation_data),
        (gatling.resources_config_map_name(), &scenario.resource_data),
        (gatling.gatling_conf_config_map_name(), &scenario.gatling_conf),
    ];

    candidates
        .into_iter()
        .filter(|(_, data)| !data.is_empty())
        .map(|(name, data)| {
            Ok(ConfigMap {
                metadata: owned_meta(gatling, name)?,
                data: Some(data.clone()),
                ..Default::default()
            })
        })
        .collect()
}

/// PersistentVolume declared in the Gatling spec
///
/// Cluster-scoped, so it carries the `app` label but no owner reference; the
/// controller deletes it explicitly during cleanup.
pub fn compile_persistent_volume(gatling: &Gatling) -> Option<PersistentVolume> {
    gatling
        .spec
        .persistent_volume_spec
        .as_ref()
        .map(|pv| PersistentVolume {
            metadata: ObjectMeta {
                name: Some(pv.name.clone()),
                labels: Some(BTreeMap::from([(
                    LABEL_APP.to_string(),
                    gatling.name_any(),
                )])),
                ..Default::default()
            },
            spec: Some(pv.spec.clone()),
            ..Default::default()
        })
}

/// PersistentVolumeClaim declared in the Gatling spec
pub fn compile_persistent_volume_claim(
    gatling: &Gatling,
) -> Result<Option<PersistentVolumeClaim>, ControllerError> {
    gatling
        .spec
        .persistent_volume_claim_spec
        .as_ref()
        .map(|pvc| {
            Ok(PersistentVolumeClaim {
                metadata: owned_meta(gatling, pvc.name.clone())?,
                spec: Some(pvc.spec.clone()),
                ..Default::default()
            })
        })
        .transpose()
}

// =============================================================================
// Runner Job
// =============================================================================

fn runner_volume_mounts(gatling: &Gatling) -> Vec<VolumeMount> {
    let spec = &gatling.spec;
    let scenario = &spec.test_scenario_spec;
    let mut mounts = Vec::new();

    if !scenario.simulation_data.is_empty() {
        mounts.push(mount(
            SIMULATIONS_VOLUME,
            &spec.temp_simulations_directory_path(),
        ));
    }
    if !scenario.resource_data.is_empty() {
        mounts.push(mount(RESOURCES_VOLUME, spec.resources_directory_path()));
    }
    if !scenario.gatling_conf.is_empty() {
        mounts.push(mount(GATLING_CONF_VOLUME, GATLING_CONF_MOUNT_PATH));
    }
    if spec.generate_report {
        mounts.push(mount(RESULTS_VOLUME, spec.results_directory_path()));
    }
    mounts.extend(scenario.volume_mounts.iter().cloned());
    mounts
}

fn runner_volumes(gatling: &Gatling) -> Vec<Volume> {
    let spec = &gatling.spec;
    let scenario = &spec.test_scenario_spec;
    let mut volumes = Vec::new();

    if !scenario.simulation_data.is_empty() {
        volumes.push(config_map_volume(
            SIMULATIONS_VOLUME,
            gatling.simulations_config_map_name(),
        ));
    }
    if !scenario.resource_data.is_empty() {
        volumes.push(config_map_volume(
            RESOURCES_VOLUME,
            gatling.resources_config_map_name(),
        ));
    }
    if !scenario.gatling_conf.is_empty() {
        volumes.push(config_map_volume(
            GATLING_CONF_VOLUME,
            gatling.gatling_conf_config_map_name(),
        ));
    }
    if spec.generate_report {
        volumes.push(empty_dir_volume(RESULTS_VOLUME));
    }
    volumes.extend(spec.pod_spec.volumes.iter().cloned());
    volumes.push(Volume {
        name: POD_INFO_VOLUME.to_string(),
        downward_api: Some(DownwardAPIVolumeSource {
            items: Some(vec![DownwardAPIVolumeFile {
                path: "name".to_string(),
                field_ref: Some(ObjectFieldSelector {
                    field_path: "metadata.name".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    });
    volumes
}

/// Compile the runner Job
///
/// `storage_path` is where the transfer sidecar uploads logs; it is ignored
/// unless `generateReport` is set.
pub fn compile_runner_job(gatling: &Gatling, storage_path: &str) -> Result<Job, ControllerError> {
    let spec = &gatling.spec;
    let namespace = namespace_of(gatling)?;
    let parallelism = spec.parallelism();

    let waiter = Container {
        resources: spec.pod_spec.resources.clone(),
        volume_mounts: Some(vec![mount(POD_INFO_VOLUME, POD_INFO_MOUNT_PATH)]),
        ..shell_container(
            WAITER_CONTAINER,
            WAITER_IMAGE,
            commands::waiter_command(parallelism, &namespace, &gatling.name_any()),
        )
    };

    let temp_simulations_dir = spec.temp_simulations_directory_path();
    let runner_script = commands::runner_command(&RunnerCommandArgs {
        format: spec.simulation_format(),
        simulations_dir: spec.simulations_directory_path(),
        temp_simulations_dir: &temp_simulations_dir,
        resources_dir: spec.resources_directory_path(),
        results_dir: spec.results_directory_path(),
        start_time: spec.start_time(),
        simulation_class: &spec.test_scenario_spec.simulation_class,
        generate_local_report: spec.generate_local_report,
    });
    let runner = Container {
        env: non_empty(&spec.test_scenario_spec.env),
        resources: spec.pod_spec.resources.clone(),
        volume_mounts: Some(runner_volume_mounts(gatling)),
        security_context: spec.pod_spec.runner_container_security_context.clone(),
        ..shell_container(RUNNER_CONTAINER, spec.gatling_image(), runner_script)
    };

    let mut containers = vec![runner];
    if spec.generate_report {
        let script = commands::transfer_result_command(
            storage_provider(gatling).as_ref(),
            spec.results_directory_path(),
            spec.cloud_storage_region(),
            storage_path,
        );
        containers.push(Container {
            env: non_empty(&spec.cloud_storage_spec.env),
            volume_mounts: Some(vec![mount(RESULTS_VOLUME, spec.results_directory_path())]),
            ..shell_container(RESULT_TRANSFERER_CONTAINER, spec.rclone_image(), script)
        });
    }

    Ok(Job {
        metadata: owned_meta(gatling, gatling.runner_job_name())?,
        spec: Some(JobSpec {
            backoff_limit: Some(0),
            parallelism: Some(parallelism),
            completions: Some(parallelism),
            template: PodTemplateSpec {
                metadata: Some(pod_meta(gatling, RUNNER_POD_TYPE)),
                spec: Some(PodSpec {
                    affinity: spec.pod_spec.affinity.clone(),
                    tolerations: non_empty_tolerations(gatling),
                    service_account_name: spec.service_account_name().map(str::to_string),
                    security_context: spec.pod_spec.security_context.clone(),
                    init_containers: Some(vec![waiter]),
                    containers,
                    restart_policy: Some("Never".to_string()),
                    volumes: Some(runner_volumes(gatling)),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}

fn non_empty_tolerations(
    gatling: &Gatling,
) -> Option<Vec<k8s_openapi::api::core::v1::Toleration>> {
    let tolerations = &gatling.spec.pod_spec.tolerations;
    (!tolerations.is_empty()).then(|| tolerations.clone())
}

// =============================================================================
// Reporter Job
// =============================================================================

/// Compile the reporter Job
///
/// A single pod: download every runner log from `storage_path`, render the
/// report, upload it back next to the logs.
pub fn compile_reporter_job(
    gatling: &Gatling,
    storage_path: &str,
) -> Result<Job, ControllerError> {
    let spec = &gatling.spec;
    let provider = storage_provider(gatling);
    let results_dir = spec.results_directory_path();
    let region = spec.cloud_storage_region();
    let aggregate_mounts = vec![mount(AGGREGATE_VOLUME, results_dir)];

    let aggregator = Container {
        env: non_empty(&spec.cloud_storage_spec.env),
        volume_mounts: Some(aggregate_mounts.clone()),
        ..shell_container(
            RESULT_AGGREGATOR_CONTAINER,
            spec.rclone_image(),
            commands::aggregate_result_command(provider.as_ref(), results_dir, region, storage_path),
        )
    };
    let generator = Container {
        volume_mounts: Some(aggregate_mounts.clone()),
        ..shell_container(
            REPORT_GENERATOR_CONTAINER,
            spec.gatling_image(),
            commands::generate_report_command(results_dir),
        )
    };
    let transferer = Container {
        env: non_empty(&spec.cloud_storage_spec.env),
        volume_mounts: Some(aggregate_mounts),
        ..shell_container(
            REPORT_TRANSFERER_CONTAINER,
            spec.rclone_image(),
            commands::transfer_report_command(provider.as_ref(), results_dir, region, storage_path),
        )
    };

    Ok(Job {
        metadata: owned_meta(gatling, gatling.reporter_job_name())?,
        spec: Some(JobSpec {
            backoff_limit: Some(0),
            parallelism: Some(1),
            completions: Some(1),
            template: PodTemplateSpec {
                metadata: Some(pod_meta(gatling, REPORTER_POD_TYPE)),
                spec: Some(PodSpec {
                    affinity: spec.pod_spec.affinity.clone(),
                    tolerations: non_empty_tolerations(gatling),
                    service_account_name: spec.service_account_name().map(str::to_string),
                    init_containers: Some(vec![aggregator, generator]),
                    containers: vec![transferer],
                    restart_policy: Some("Never".to_string()),
                    volumes: Some(vec![empty_dir_volume(AGGREGATE_VOLUME)]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    })
}
