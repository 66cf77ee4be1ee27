//! rclone bodies for Google Cloud Storage
//!
//! Buckets are assumed to use uniform bucket-level access, so no region or
//! object ACL is passed.

const CONFIG_CREATE: &str =
    r#"rclone config create gs "google cloud storage" bucket_policy_only true --non-interactive"#;

pub(super) fn transfer_result_command(results_dir: &str, storage_path: &str) -> String {
    format!(
        "\nRESULTS_DIR_PATH={results_dir}\n{CONFIG_CREATE}\n{}",
        super::copy_logs_when_completed("", storage_path)
    )
}

pub(super) fn aggregate_result_command(aggregate_dir: &str, storage_path: &str) -> String {
    format!(
        "\nGATLING_AGGREGATE_DIR={aggregate_dir}\n{CONFIG_CREATE}\nrclone copy {storage_path} ${{GATLING_AGGREGATE_DIR}}\n"
    )
}

pub(super) fn transfer_report_command(aggregate_dir: &str, storage_path: &str) -> String {
    format!(
        "\nGATLING_AGGREGATE_DIR={aggregate_dir}\n{CONFIG_CREATE}\nrclone copy ${{GATLING_AGGREGATE_DIR}} --exclude \"*.log\" {storage_path}\n"
    )
}
