//! Where a run's logs and report live
//!
//! The storage path and report URL are derived once per Gatling from a
//! random sub-directory and then read back from status on every later pass.

use kube::ResourceExt;
use rand::Rng;
use tracing::debug;

use gatling_common::crd::Gatling;
use gatling_providers::StorageProvider;

use crate::controller::{persist_status, Context};
use crate::error::ControllerError;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a
fn fnv1a(data: &[u8]) -> u32 {
    data.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Sub-directory name for one run of `gatling_name`
pub fn sub_directory(gatling_name: &str, salt: i32) -> String {
    fnv1a(format!("{gatling_name}{salt}").as_bytes()).to_string()
}

/// Resolved storage addresses of a run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageInfo {
    /// rclone remote path runners upload to
    pub path: String,
    /// Public URL of the rendered report
    pub report_url: String,
}

/// Addresses for `gatling` under a fresh sub-directory
///
/// Both are empty when the provider is unknown.
pub fn assign_storage_info(gatling: &Gatling, sub_dir: &str) -> StorageInfo {
    let spec = &gatling.spec;
    match StorageProvider::from_name(spec.cloud_storage_provider(), &spec.cloud_storage_spec.env)
    {
        Some(provider) => {
            let bucket = spec.cloud_storage_bucket();
            let name = gatling.name_any();
            StorageInfo {
                path: provider.storage_path(bucket, &name, sub_dir),
                report_url: provider.report_url(bucket, &name, sub_dir),
            }
        }
        None => StorageInfo::default(),
    }
}

/// Storage addresses of `gatling`, assigning and persisting them on first use
///
/// On assignment `gatling` is replaced by the object returned from the
/// status write.
pub async fn ensure_storage_info(
    ctx: &Context,
    gatling: &mut Gatling,
) -> Result<StorageInfo, ControllerError> {
    let mut status = gatling.status_or_default();
    if status.has_storage_info() {
        return Ok(StorageInfo {
            path: status.report_storage_path,
            report_url: status.report_url,
        });
    }

    let salt = rand::thread_rng().gen_range(0..i32::MAX);
    let info = assign_storage_info(gatling, &sub_directory(&gatling.name_any(), salt));
    debug!(path = %info.path, url = %info.report_url, "assigned report storage");

    status.report_storage_path = info.path.clone();
    status.report_url = info.report_url.clone();
    persist_status(ctx, gatling, status).await?;
    Ok(info)
}
