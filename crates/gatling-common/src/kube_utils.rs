//! Small helpers over Kubernetes API types
//!
//! Condition checks on Jobs, label merging and owner references for the
//! objects the controller creates on behalf of a Gatling resource.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job, JobCondition};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;

/// Condition status value meaning "true"
pub const STATUS_TRUE: &str = "True";

/// Job condition type set once every completion succeeded
pub const JOB_COMPLETE: &str = "Complete";

/// Job condition type set once the backoff limit or deadline is hit
pub const JOB_FAILED: &str = "Failed";

/// Whether `conditions` holds a condition of `condition_type` with status True
pub fn has_condition(conditions: &[JobCondition], condition_type: &str) -> bool {
    conditions
        .iter()
        .any(|c| c.type_ == condition_type && c.status == STATUS_TRUE)
}

/// Whether a Job has reached a terminal state, successful or not
pub fn is_job_finished(job: &Job) -> bool {
    let conditions = job
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default();
    has_condition(conditions, JOB_COMPLETE) || has_condition(conditions, JOB_FAILED)
}

/// Active, succeeded and failed pod counts of a Job
pub fn job_counts(job: &Job) -> (i32, i32, i32) {
    job.status
        .as_ref()
        .map(|s| {
            (
                s.active.unwrap_or(0),
                s.succeeded.unwrap_or(0),
                s.failed.unwrap_or(0),
            )
        })
        .unwrap_or((0, 0, 0))
}

/// Copy `labels` and set `key` to `value`, overwriting any existing entry
pub fn with_label(
    labels: Option<&BTreeMap<String, String>>,
    key: &str,
    value: &str,
) -> BTreeMap<String, String> {
    let mut merged = labels.cloned().unwrap_or_default();
    merged.insert(key.to_string(), value.to_string());
    merged
}

/// Controller owner reference pointing at `owner`
///
/// Returns `None` while the owner has no uid (not yet persisted).
pub fn owner_reference<K>(owner: &K) -> Option<Vec<OwnerReference>>
where
    K: Resource<DynamicType = ()>,
{
    owner.controller_owner_ref(&()).map(|r| vec![r])
}

/// Current time as Unix epoch seconds
pub fn epoch_seconds() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{Gatling, GatlingSpec};
    use k8s_openapi::api::batch::v1::JobStatus;

    fn job_with(conditions: Vec<(&str, &str)>) -> Job {
        Job {
            status: Some(JobStatus {
                conditions: Some(
                    conditions
                        .into_iter()
                        .map(|(t, s)| JobCondition {
                            type_: t.to_string(),
                            status: s.to_string(),
                            ..Default::default()
                        })
                        .collect(),
                ),
                succeeded: Some(2),
                failed: Some(1),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn job_without_status_is_not_finished() {
        assert!(!is_job_finished(&Job::default()));
        assert_eq!(job_counts(&Job::default()), (0, 0, 0));
    }

    #[test]
    fn complete_or_failed_condition_finishes_job() {
        assert!(is_job_finished(&job_with(vec![(JOB_COMPLETE, "True")])));
        assert!(is_job_finished(&job_with(vec![(JOB_FAILED, "True")])));
        assert!(!is_job_finished(&job_with(vec![(JOB_FAILED, "False")])));
        assert!(!is_job_finished(&job_with(vec![("Suspended", "True")])));
    }

    #[test]
    fn has_condition_needs_matching_type_and_true_status() {
        let conditions = vec![
            JobCondition {
                type_: JOB_COMPLETE.to_string(),
                status: "False".to_string(),
                ..Default::default()
            },
            JobCondition {
                type_: JOB_FAILED.to_string(),
                status: STATUS_TRUE.to_string(),
                ..Default::default()
            },
        ];
        assert!(has_condition(&conditions, JOB_FAILED));
        assert!(!has_condition(&conditions, JOB_COMPLETE));
        assert!(!has_condition(&[], JOB_FAILED));
    }

    #[test]
    fn job_counts_default_missing_fields_to_zero() {
        assert_eq!(job_counts(&job_with(vec![])), (0, 2, 1));
    }

    #[test]
    fn with_label_overwrites_existing_value() {
        let mut labels = BTreeMap::new();
        labels.insert("type".to_string(), "user".to_string());
        labels.insert("team".to_string(), "perf".to_string());

        let merged = with_label(Some(&labels), "type", "runner");
        assert_eq!(merged.get("type").map(String::as_str), Some("runner"));
        assert_eq!(merged.get("team").map(String::as_str), Some("perf"));

        let fresh = with_label(None, "type", "runner");
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn owner_reference_requires_uid() {
        let mut gatling = Gatling::new("load-test", GatlingSpec::default());
        assert!(owner_reference(&gatling).is_none());

        gatling.metadata.uid = Some("1234".to_string());
        let refs = owner_reference(&gatling).expect("owner reference");
        assert_eq!(refs[0].kind, "Gatling");
        assert_eq!(refs[0].name, "load-test");
        assert_eq!(refs[0].controller, Some(true));
    }

    #[test]
    fn epoch_seconds_is_recent() {
        assert!(epoch_seconds() > 1_600_000_000);
    }
}
