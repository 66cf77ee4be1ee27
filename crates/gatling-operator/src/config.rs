use std::time::Duration;

use clap::Parser;

use gatling_controller::ControllerConfig;

/// Gatling operator - runs distributed Gatling load tests as Kubernetes Jobs
#[derive(Parser, Debug, Clone)]
#[command(name = "gatling-operator", version, about, long_about = None)]
pub struct Cli {
    /// Print the Gatling CRD manifest and exit
    #[arg(long)]
    pub crd: bool,

    /// Seconds a created Job may take to appear before the run fails
    #[arg(long, env = "MAX_JOB_CREATION_WAIT_TIME", default_value_t = 600)]
    pub max_job_creation_wait_time: u64,

    /// Seconds a Job may run before the run fails
    #[arg(long, env = "MAX_JOB_RUN_WAIT_TIME", default_value_t = 10800)]
    pub max_job_run_wait_time: u64,

    /// Seconds between looks at a phase that is still in progress
    #[arg(long, env = "REQUEUE_INTERVAL", default_value_t = 5)]
    pub requeue_interval: u64,

    /// Only watch Gatling resources in this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,
}

impl Cli {
    /// Timing knobs for the controller
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            requeue_interval: Duration::from_secs(self.requeue_interval),
            job_creation_wait: Duration::from_secs(self.max_job_creation_wait_time),
            job_run_wait: Duration::from_secs(self.max_job_run_wait_time),
        }
    }

    /// Watched namespace, treating an empty value as "all namespaces"
    pub fn namespace(&self) -> Option<&str> {
        self.watch_namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_controller_defaults() {
        let cli = Cli::try_parse_from(["gatling-operator"]).expect("parse");
        assert!(!cli.crd);
        assert_eq!(cli.controller_config(), ControllerConfig::default());
    }

    #[test]
    fn flags_override_timings() {
        let cli = Cli::try_parse_from([
            "gatling-operator",
            "--max-job-creation-wait-time",
            "30",
            "--max-job-run-wait-time",
            "120",
            "--requeue-interval",
            "1",
        ])
        .expect("parse");
        let config = cli.controller_config();
        assert_eq!(config.job_creation_wait, Duration::from_secs(30));
        assert_eq!(config.job_run_wait, Duration::from_secs(120));
        assert_eq!(config.requeue_interval, Duration::from_secs(1));
    }

    #[test]
    fn empty_watch_namespace_means_all() {
        let cli = Cli::try_parse_from(["gatling-operator", "--watch-namespace", ""]).expect("parse");
        assert_eq!(cli.namespace(), None);

        let cli =
            Cli::try_parse_from(["gatling-operator", "--watch-namespace", "perf"]).expect("parse");
        assert_eq!(cli.namespace(), Some("perf"));
    }

    #[test]
    fn rejects_non_numeric_durations() {
        assert!(Cli::try_parse_from(["gatling-operator", "--requeue-interval", "soon"]).is_err());
    }
}
