//! rclone bodies for Amazon S3 and S3-compatible services

/// Env var carrying a custom S3 endpoint
pub const RCLONE_S3_ENDPOINT_ENV: &str = "RCLONE_S3_ENDPOINT";

/// Public host of Amazon S3
pub const DEFAULT_S3_HOST: &str = "s3.amazonaws.com";

const COPY_FLAGS: &str = "--s3-no-check-bucket --s3-env-auth";

/// Drop a leading `scheme://` from an endpoint URL
pub(super) fn strip_protocol(url: &str) -> &str {
    match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    }
}

fn config_create(region: &str) -> String {
    format!("rclone config create s3 s3 env_auth=true region {region}")
}

pub(super) fn transfer_result_command(results_dir: &str, region: &str, storage_path: &str) -> String {
    format!(
        "\nRESULTS_DIR_PATH={results_dir}\n{}\n{}",
        config_create(region),
        super::copy_logs_when_completed(&format!("{COPY_FLAGS} "), storage_path)
    )
}

pub(super) fn aggregate_result_command(
    aggregate_dir: &str,
    region: &str,
    storage_path: &str,
) -> String {
    format!(
        "\nGATLING_AGGREGATE_DIR={aggregate_dir}\n{}\nrclone copy {COPY_FLAGS} {storage_path} ${{GATLING_AGGREGATE_DIR}}\n",
        config_create(region)
    )
}

pub(super) fn transfer_report_command(aggregate_dir: &str, region: &str, storage_path: &str) -> String {
    format!(
        "\nGATLING_AGGREGATE_DIR={aggregate_dir}\n{}\nrclone copy ${{GATLING_AGGREGATE_DIR}} --exclude \"*.log\" {COPY_FLAGS} {storage_path}\n",
        config_create(region)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_protocol_handles_bare_hosts() {
        assert_eq!(strip_protocol("https://minio:9000"), "minio:9000");
        assert_eq!(strip_protocol("http://minio"), "minio");
        assert_eq!(strip_protocol("minio.local"), "minio.local");
    }

    #[test]
    fn aggregate_command_downloads_from_storage() {
        let expected = "\nGATLING_AGGREGATE_DIR=/results\nrclone config create s3 s3 env_auth=true region us-east-1\nrclone copy --s3-no-check-bucket --s3-env-auth s3:b/n/1 ${GATLING_AGGREGATE_DIR}\n";
        assert_eq!(aggregate_result_command("/results", "us-east-1", "s3:b/n/1"), expected);
    }

    #[test]
    fn report_command_excludes_logs() {
        let expected = "\nGATLING_AGGREGATE_DIR=/results\nrclone config create s3 s3 env_auth=true region us-east-1\nrclone copy ${GATLING_AGGREGATE_DIR} --exclude \"*.log\" --s3-no-check-bucket --s3-env-auth s3:b/n/1\n";
        assert_eq!(transfer_report_command("/results", "us-east-1", "s3:b/n/1"), expected);
    }
}
