//! rclone bodies for Azure Blob Storage
//!
//! Credentials come from the `AZUREBLOB_*` variables of the cloud storage
//! env and are re-exported under the names rclone reads.

/// Env var naming the storage account
pub const AZUREBLOB_ACCOUNT_ENV: &str = "AZUREBLOB_ACCOUNT";

const PRELUDE: &str = "export RCLONE_AZUREBLOB_ACCOUNT=${AZUREBLOB_ACCOUNT}
export RCLONE_AZUREBLOB_KEY=${AZUREBLOB_KEY}
export RCLONE_AZUREBLOB_SAS_URL=${AZUREBLOB_SAS_URL}";

const CONFIG_CREATE: &str = "rclone config create az azureblob env_auth=true";

pub(super) fn transfer_result_command(results_dir: &str, storage_path: &str) -> String {
    format!(
        "\n{PRELUDE}\nRESULTS_DIR_PATH={results_dir}\n{CONFIG_CREATE}\n{}",
        super::copy_logs_when_completed("", storage_path)
    )
}

pub(super) fn aggregate_result_command(aggregate_dir: &str, storage_path: &str) -> String {
    format!(
        "\n{PRELUDE}\nGATLING_AGGREGATE_DIR={aggregate_dir}\n{CONFIG_CREATE}\nrclone copy {storage_path} ${{GATLING_AGGREGATE_DIR}}\n"
    )
}

pub(super) fn transfer_report_command(aggregate_dir: &str, storage_path: &str) -> String {
    format!(
        "\n{PRELUDE}\nGATLING_AGGREGATE_DIR={aggregate_dir}\n{CONFIG_CREATE}\nrclone copy ${{GATLING_AGGREGATE_DIR}} --exclude \"*.log\" {storage_path}\n"
    )
}
