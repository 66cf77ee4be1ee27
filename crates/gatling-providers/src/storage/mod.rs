//! Object storage backends
//!
//! Each provider knows two addresses for a run's output: the rclone remote
//! path runners upload to, and the public URL of the rendered report. It
//! also renders the shell bodies the transfer containers execute.
//!
//! Resolution is soft: an unknown provider name yields `None`, and callers
//! substitute empty commands so the transfer steps become no-ops.

mod azure;
mod gcs;
mod s3;

use k8s_openapi::api::core::v1::EnvVar;

pub use azure::AZUREBLOB_ACCOUNT_ENV;
pub use s3::{DEFAULT_S3_HOST, RCLONE_S3_ENDPOINT_ENV};

/// A storage backend for runner logs and reports
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageProvider {
    /// Amazon S3
    Aws,
    /// Google Cloud Storage, uniform bucket-level access
    Gcp,
    /// Azure Blob Storage
    Azure {
        /// Storage account hosting the container
        storage_account: String,
    },
    /// Any S3-compatible service
    S3 {
        /// Endpoint host without protocol, used in report URLs
        endpoint_host: String,
    },
}

impl StorageProvider {
    /// Resolve a provider by name, reading provider settings from `env`
    ///
    /// `env` is the cloud storage environment of the Gatling spec; azure
    /// takes its account from `AZUREBLOB_ACCOUNT` and s3 its endpoint from
    /// `RCLONE_S3_ENDPOINT`.
    pub fn from_name(name: &str, env: &[EnvVar]) -> Option<Self> {
        match name {
            "aws" => Some(Self::Aws),
            "gcp" => Some(Self::Gcp),
            "azure" => Some(Self::Azure {
                storage_account: env_value(env, AZUREBLOB_ACCOUNT_ENV)
                    .unwrap_or_default()
                    .to_string(),
            }),
            "s3" => Some(Self::S3 {
                endpoint_host: env_value(env, RCLONE_S3_ENDPOINT_ENV)
                    .filter(|v| !v.is_empty())
                    .map(s3::strip_protocol)
                    .unwrap_or(DEFAULT_S3_HOST)
                    .to_string(),
            }),
            _ => None,
        }
    }

    /// Provider name as written in the Gatling spec
    pub fn name(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
            Self::Gcp => "gcp",
            Self::Azure { .. } => "azure",
            Self::S3 { .. } => "s3",
        }
    }

    /// rclone remote path runners write to
    pub fn storage_path(&self, bucket: &str, gatling_name: &str, sub_dir: &str) -> String {
        match self {
            Self::Aws | Self::S3 { .. } => format!("s3:{bucket}/{gatling_name}/{sub_dir}"),
            Self::Gcp => format!("gs://{bucket}/{gatling_name}/{sub_dir}"),
            Self::Azure { .. } => format!("az:{bucket}/{gatling_name}/{sub_dir}"),
        }
    }

    /// Public URL of the rendered report
    pub fn report_url(&self, bucket: &str, gatling_name: &str, sub_dir: &str) -> String {
        match self {
            Self::Aws => format!(
                "https://{bucket}.{DEFAULT_S3_HOST}/{gatling_name}/{sub_dir}/index.html"
            ),
            Self::S3 { endpoint_host } => {
                format!("https://{bucket}.{endpoint_host}/{gatling_name}/{sub_dir}/index.html")
            }
            Self::Gcp => format!(
                "https://storage.googleapis.com/{bucket}/{gatling_name}/{sub_dir}/index.html"
            ),
            Self::Azure { storage_account } => format!(
                "https://{storage_account}.blob.core.windows.net/{bucket}/{gatling_name}/{sub_dir}/index.html"
            ),
        }
    }

    /// Sidecar body: wait for the runner to finish, then upload its log
    pub fn transfer_result_command(
        &self,
        results_dir: &str,
        region: &str,
        storage_path: &str,
    ) -> String {
        match self {
            Self::Aws | Self::S3 { .. } => {
                s3::transfer_result_command(results_dir, region, storage_path)
            }
            Self::Gcp => gcs::transfer_result_command(results_dir, storage_path),
            Self::Azure { .. } => azure::transfer_result_command(results_dir, storage_path),
        }
    }

    /// Reporter init body: download every runner log into `aggregate_dir`
    pub fn aggregate_result_command(
        &self,
        aggregate_dir: &str,
        region: &str,
        storage_path: &str,
    ) -> String {
        match self {
            Self::Aws | Self::S3 { .. } => {
                s3::aggregate_result_command(aggregate_dir, region, storage_path)
            }
            Self::Gcp => gcs::aggregate_result_command(aggregate_dir, storage_path),
            Self::Azure { .. } => azure::aggregate_result_command(aggregate_dir, storage_path),
        }
    }

    /// Reporter body: upload the rendered report, leaving the logs behind
    pub fn transfer_report_command(
        &self,
        aggregate_dir: &str,
        region: &str,
        storage_path: &str,
    ) -> String {
        match self {
            Self::Aws | Self::S3 { .. } => {
                s3::transfer_report_command(aggregate_dir, region, storage_path)
            }
            Self::Gcp => gcs::transfer_report_command(aggregate_dir, storage_path),
            Self::Azure { .. } => azure::transfer_report_command(aggregate_dir, storage_path),
        }
    }
}

impl std::fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn env_value<'a>(env: &'a [EnvVar], name: &str) -> Option<&'a str> {
    env.iter()
        .find(|e| e.name == name)
        .and_then(|e| e.value.as_deref())
}

/// Loop shared by every provider's transfer-results body.
///
/// Expects `RESULTS_DIR_PATH` to be set. Gives up quietly when the runner
/// left a `FAILED` marker.
fn copy_logs_when_completed(copy_flags: &str, storage_path: &str) -> String {
    format!(
        r#"while true; do
  if [ -f "${{RESULTS_DIR_PATH}}/FAILED" ]; then
    echo "Skip transfering gatling results"
    break
  fi
  if [ -f "${{RESULTS_DIR_PATH}}/COMPLETED" ]; then
    for source in $(find ${{RESULTS_DIR_PATH}} -type f -name *.log)
    do
      rclone copyto ${{source}} {copy_flags}{storage_path}/${{HOSTNAME}}.log
    done
    break
  fi
  sleep 1;
done
"#
    )
}
