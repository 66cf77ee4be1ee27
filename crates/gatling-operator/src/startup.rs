use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt, Resource};

use gatling_common::crd::Gatling;
use gatling_common::{API_GROUP, FIELD_MANAGER};

/// Name of the Gatling CRD object, `<plural>.<group>`
pub fn gatling_crd_name() -> String {
    format!("{}.{API_GROUP}", Gatling::plural(&()))
}

/// Gatling CRD manifest as YAML
pub fn crd_yaml() -> anyhow::Result<String> {
    serde_yaml::to_string(&Gatling::crd())
        .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))
}

/// Install or update the Gatling CRD with server-side apply
///
/// Keeps the stored CRD in step with the running operator version.
pub async fn ensure_crd_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    let name = gatling_crd_name();
    tracing::info!(crd = %name, "Installing Gatling CRD...");
    crds.patch(&name, &params, &Patch::Apply(&Gatling::crd()))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to install Gatling CRD: {}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crd_name_matches_generated_manifest() {
        let crd = Gatling::crd();
        assert_eq!(crd.metadata.name, Some(gatling_crd_name()));
        assert_eq!(crd.spec.group, API_GROUP);
    }

    #[test]
    fn yaml_carries_print_columns() {
        let yaml = crd_yaml().expect("yaml");
        assert!(yaml.contains("kind: CustomResourceDefinition"));
        assert!(yaml.contains("Runned"));
        assert!(yaml.contains("ReportURL"));
    }
}
