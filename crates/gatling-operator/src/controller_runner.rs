use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, Resource};

use gatling_common::crd::Gatling;
use gatling_controller::{error_policy, reconcile, Context};

/// Watcher timeout (seconds); must stay below the client read timeout (30s)
/// so idle watches are closed by the API server first.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Run the Gatling controller until a shutdown signal arrives
///
/// Changes to owned Jobs and ConfigMaps trigger a pass for the owning Gatling.
pub async fn run_gatling_controller(client: Client, ctx: Arc<Context>, namespace: Option<&str>) {
    let gatlings: Api<Gatling> = scoped_api(&client, namespace);
    let jobs: Api<Job> = scoped_api(&client, namespace);
    let config_maps: Api<ConfigMap> = scoped_api(&client, namespace);

    match namespace {
        Some(ns) => tracing::info!(namespace = %ns, "- Gatling controller"),
        None => tracing::info!("- Gatling controller (all namespaces)"),
    }

    Controller::new(gatlings, watcher_config())
        .owns(jobs, watcher_config())
        .owns(config_maps, watcher_config())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|result| {
            match result {
                Ok((object, action)) => {
                    tracing::debug!(gatling = %object.name, ?action, "Gatling reconciliation completed")
                }
                Err(e) => tracing::error!(error = ?e, "Gatling reconciliation error"),
            }
            std::future::ready(())
        })
        .await;
}

fn watcher_config() -> WatcherConfig {
    WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS)
}

fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    <K as Resource>::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}
