//! Kubernetes access for the Gatling controller
//!
//! Every API call the state machine makes goes through [`GatlingKubeClient`]
//! so phase handlers can be tested against mocks.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, PersistentVolume, PersistentVolumeClaim, Secret};
use kube::api::{Api, DeleteParams, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use gatling_common::crd::{Gatling, GatlingStatus};
use gatling_common::{Error, FIELD_MANAGER};

/// Trait abstracting Kubernetes client operations for Gatling
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GatlingKubeClient: Send + Sync {
    /// Get a Gatling by name, `None` if it no longer exists
    async fn get_gatling(&self, name: &str, namespace: &str) -> Result<Option<Gatling>, Error>;

    /// Replace the status of `gatling`
    ///
    /// The patch carries the resourceVersion that `gatling` was read at, so a
    /// concurrent writer makes it fail with a conflict. Returns the updated
    /// object so later writes in the same pass use the new version.
    async fn patch_status(&self, gatling: &Gatling, status: &GatlingStatus)
        -> Result<Gatling, Error>;

    /// Get a Job by name, `None` if it does not exist (yet)
    async fn get_job(&self, name: &str, namespace: &str) -> Result<Option<Job>, Error>;

    /// Create a Job unless one with the same name already exists
    async fn create_job(&self, job: &Job) -> Result<(), Error>;

    /// Delete a Job and its pods in the background; a missing Job is fine
    async fn delete_job(&self, name: &str, namespace: &str) -> Result<(), Error>;

    /// Create a ConfigMap unless it already exists
    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<(), Error>;

    /// Create a PersistentVolume unless it already exists
    async fn create_persistent_volume(&self, volume: &PersistentVolume) -> Result<(), Error>;

    /// Create a PersistentVolumeClaim unless it already exists
    async fn create_persistent_volume_claim(
        &self,
        claim: &PersistentVolumeClaim,
    ) -> Result<(), Error>;

    /// Delete a PersistentVolume; a missing volume is fine
    async fn delete_persistent_volume(&self, name: &str) -> Result<(), Error>;

    /// Delete a Gatling in the background; a missing Gatling is fine
    async fn delete_gatling(&self, name: &str, namespace: &str) -> Result<(), Error>;

    /// Data of a Secret, `None` if the Secret does not exist
    async fn get_secret_data(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, Error>;
}

/// Real Kubernetes client implementation
pub struct GatlingKubeClientImpl {
    client: Client,
}

impl GatlingKubeClientImpl {
    /// Create a new GatlingKubeClientImpl wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

async fn get_opt<K>(api: &Api<K>, name: &str) -> Result<Option<K>, Error>
where
    K: Clone + DeserializeOwned + std::fmt::Debug,
{
    match api.get(name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn create_if_absent<K>(api: &Api<K>, obj: &K) -> Result<(), Error>
where
    K: Resource + Clone + Serialize + DeserializeOwned + std::fmt::Debug,
{
    match api.create(&PostParams::default(), obj).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            debug!(name = %obj.name_any(), "object already exists");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn delete_in_background<K>(api: &Api<K>, name: &str) -> Result<(), Error>
where
    K: Clone + DeserializeOwned + std::fmt::Debug,
{
    match api.delete(name, &DeleteParams::background()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn namespace_of<K: Resource>(obj: &K) -> Result<String, Error> {
    obj.meta()
        .namespace
        .clone()
        .ok_or_else(|| Error::validation_for(obj.name_any(), "object has no namespace"))
}

#[async_trait]
impl GatlingKubeClient for GatlingKubeClientImpl {
    async fn get_gatling(&self, name: &str, namespace: &str) -> Result<Option<Gatling>, Error> {
        get_opt(&self.namespaced::<Gatling>(namespace), name).await
    }

    async fn patch_status(
        &self,
        gatling: &Gatling,
        status: &GatlingStatus,
    ) -> Result<Gatling, Error> {
        let api: Api<Gatling> = self.namespaced(&namespace_of(gatling)?);
        let patch = json!({
            "metadata": { "resourceVersion": gatling.resource_version() },
            "status": status,
        });
        let updated = api
            .patch_status(
                &gatling.name_any(),
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await?;
        Ok(updated)
    }

    async fn get_job(&self, name: &str, namespace: &str) -> Result<Option<Job>, Error> {
        get_opt(&self.namespaced::<Job>(namespace), name).await
    }

    async fn create_job(&self, job: &Job) -> Result<(), Error> {
        create_if_absent(&self.namespaced::<Job>(&namespace_of(job)?), job).await
    }

    async fn delete_job(&self, name: &str, namespace: &str) -> Result<(), Error> {
        delete_in_background(&self.namespaced::<Job>(namespace), name).await
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<(), Error> {
        let api = self.namespaced::<ConfigMap>(&namespace_of(config_map)?);
        create_if_absent(&api, config_map).await
    }

    async fn create_persistent_volume(&self, volume: &PersistentVolume) -> Result<(), Error> {
        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        create_if_absent(&api, volume).await
    }

    async fn create_persistent_volume_claim(
        &self,
        claim: &PersistentVolumeClaim,
    ) -> Result<(), Error> {
        let api = self.namespaced::<PersistentVolumeClaim>(&namespace_of(claim)?);
        create_if_absent(&api, claim).await
    }

    async fn delete_persistent_volume(&self, name: &str) -> Result<(), Error> {
        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        delete_in_background(&api, name).await
    }

    async fn delete_gatling(&self, name: &str, namespace: &str) -> Result<(), Error> {
        delete_in_background(&self.namespaced::<Gatling>(namespace), name).await
    }

    async fn get_secret_data(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<BTreeMap<String, Vec<u8>>>, Error> {
        let secret = get_opt(&self.namespaced::<Secret>(namespace), name).await?;
        Ok(secret.map(|s| {
            s.data
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, v.0))
                .collect()
        }))
    }
}
