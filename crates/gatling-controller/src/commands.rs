//! Shell bodies executed by the runner and reporter containers
//!
//! Every function is pure: it only interpolates resolved paths and names.
//! Containers run the result through `/bin/sh -c`.

use gatling_common::crd::SimulationFormat;
use gatling_providers::StorageProvider;

/// Image of the rendezvous init container
pub const WAITER_IMAGE: &str = "bitnami/kubectl:1.29.3";

/// Mount point of the downward-API volume exposing the pod name
pub const POD_INFO_MOUNT_PATH: &str = "/etc/pod-info";

/// Rendezvous barrier: label this pod, then block until every runner pod of
/// the job carries the same label.
pub fn waiter_command(parallelism: i32, namespace: &str, gatling_name: &str) -> String {
    format!(
        r#"
PARALLELISM={parallelism}
NAMESPACE={namespace}
JOB_NAME={gatling_name}
POD_NAME=$(cat {POD_INFO_MOUNT_PATH}/name)

kubectl label pods -n $NAMESPACE $POD_NAME gatling-waiter=initialized

while true; do
  READY_PODS=$(kubectl get pods -n $NAMESPACE --selector=job-name=$JOB_NAME-runner,gatling-waiter=initialized --no-headers | grep -c ".*");
  echo "$READY_PODS/$PARALLELISM pods are ready";
  if  [ $READY_PODS -eq $PARALLELISM ]; then
    break;
  fi;
  sleep 1;
done
"#
    )
}

/// Inputs of [`runner_command`]
#[derive(Clone, Debug, PartialEq)]
pub struct RunnerCommandArgs<'a> {
    /// Packaging of the simulations
    pub format: SimulationFormat,
    /// Directory the load-test tool reads simulations from
    pub simulations_dir: &'a str,
    /// Directory the simulations ConfigMap is mounted at
    pub temp_simulations_dir: &'a str,
    /// Directory holding simulation resources
    pub resources_dir: &'a str,
    /// Directory results and the status marker are written to
    pub results_dir: &'a str,
    /// UTC start time, empty to start immediately
    pub start_time: &'a str,
    /// Simulation class to run
    pub simulation_class: &'a str,
    /// Keep the per-pod HTML report
    pub generate_local_report: bool,
}

/// Runner body: wait for the start time, stage the simulations, run the
/// load test and leave a `COMPLETED` or `FAILED` marker in the results dir.
pub fn runner_command(args: &RunnerCommandArgs<'_>) -> String {
    let RunnerCommandArgs {
        format,
        simulations_dir,
        temp_simulations_dir,
        resources_dir,
        results_dir,
        start_time,
        simulation_class,
        generate_local_report,
    } = args;
    let local_report_option = if *generate_local_report { "" } else { "-nr" };
    let run_mode_option = "-rm local";

    format!(
        r#"
SIMULATIONS_FORMAT={format}
SIMULATIONS_DIR_PATH={simulations_dir}
TEMP_SIMULATIONS_DIR_PATH={temp_simulations_dir}
RESOURCES_DIR_PATH={resources_dir}
RESULTS_DIR_PATH={results_dir}
START_TIME="{start_time}"
SIMULATION_CLASS={simulation_class}
RUN_STATUS_FILE="${{RESULTS_DIR_PATH}}/COMPLETED"
if [ -z "${{START_TIME}}" ]; then
  START_TIME=$(date +"%Y-%m-%d %H:%M:%S" --utc)
fi
start_time_stamp=$(date -d "${{START_TIME}}" +"%s")
current_time_stamp=$(date +"%s")
echo "Wait until ${{START_TIME}}"
until [ ${{current_time_stamp}} -ge ${{start_time_stamp}} ];
do
  current_time_stamp=$(date +"%s")
  echo "it's ${{current_time_stamp}} now and waiting until ${{start_time_stamp}} ..."
  sleep 1;
done
if [ ! -d ${{SIMULATIONS_DIR_PATH}} ]; then
  mkdir -p ${{SIMULATIONS_DIR_PATH}}
fi
if [ -d ${{TEMP_SIMULATIONS_DIR_PATH}} ]; then
  cp -p ${{TEMP_SIMULATIONS_DIR_PATH}}/*.scala ${{SIMULATIONS_DIR_PATH}}
fi
if [ ! -d ${{RESOURCES_DIR_PATH}} ]; then
  mkdir -p ${{RESOURCES_DIR_PATH}}
fi
if [ ! -d ${{RESULTS_DIR_PATH}} ]; then
  mkdir -p ${{RESULTS_DIR_PATH}}
fi

if [ ${{SIMULATIONS_FORMAT}} = "bundle" ]; then
  gatling.sh -sf ${{SIMULATIONS_DIR_PATH}} -s ${{SIMULATION_CLASS}} -rsf ${{RESOURCES_DIR_PATH}} -rf ${{RESULTS_DIR_PATH}} {local_report_option} {run_mode_option}
elif [ ${{SIMULATIONS_FORMAT}} = "gradle" ]; then
  gradle -Dgatling.core.directory.results=${{RESULTS_DIR_PATH}} --simulation=${{SIMULATION_CLASS}}
fi

GATLING_EXIT_STATUS=$?
if [ $GATLING_EXIT_STATUS -ne 0 ]; then
  RUN_STATUS_FILE="${{RESULTS_DIR_PATH}}/FAILED"
  echo "gatling.sh has failed!" 1>&2
fi
touch ${{RUN_STATUS_FILE}}
exit $GATLING_EXIT_STATUS
"#
    )
}

/// Reporter body: render an HTML report from the aggregated logs in place
pub fn generate_report_command(results_dir: &str) -> String {
    format!(
        r#"
GATLING_AGGREGATE_DIR={results_dir}
DIR_NAME=$(dirname ${{GATLING_AGGREGATE_DIR}})
BASE_NAME=$(basename ${{GATLING_AGGREGATE_DIR}})
gatling.sh -rf ${{DIR_NAME}} -ro ${{BASE_NAME}}
"#
    )
}

/// Sidecar body uploading the runner log; empty without a known provider
pub fn transfer_result_command(
    provider: Option<&StorageProvider>,
    results_dir: &str,
    region: &str,
    storage_path: &str,
) -> String {
    provider
        .map(|p| p.transfer_result_command(results_dir, region, storage_path))
        .unwrap_or_default()
}

/// Reporter init body downloading runner logs; empty without a known provider
pub fn aggregate_result_command(
    provider: Option<&StorageProvider>,
    results_dir: &str,
    region: &str,
    storage_path: &str,
) -> String {
    provider
        .map(|p| p.aggregate_result_command(results_dir, region, storage_path))
        .unwrap_or_default()
}

/// Reporter body uploading the report; empty without a known provider
pub fn transfer_report_command(
    provider: Option<&StorageProvider>,
    results_dir: &str,
    region: &str,
    storage_path: &str,
) -> String {
    provider
        .map(|p| p.transfer_report_command(results_dir, region, storage_path))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(generate_local_report: bool) -> RunnerCommandArgs<'static> {
        RunnerCommandArgs {
            format: SimulationFormat::Bundle,
            simulations_dir: "testSimulationDirectoryPath",
            temp_simulations_dir: "testTempSimulationsDirectoryPath",
            resources_dir: "testResourcesDirectoryPath",
            results_dir: "testResultsDirectoryPath",
            start_time: "2021-09-10 08:45:31",
            simulation_class: "testSimulationClass",
            generate_local_report,
        }
    }

    #[test]
    fn waiter_counts_labelled_runner_pods() {
        let expected = r#"
PARALLELISM=1
NAMESPACE=gatling-system
JOB_NAME=testGatling
POD_NAME=$(cat /etc/pod-info/name)

kubectl label pods -n $NAMESPACE $POD_NAME gatling-waiter=initialized

while true; do
  READY_PODS=$(kubectl get pods -n $NAMESPACE --selector=job-name=$JOB_NAME-runner,gatling-waiter=initialized --no-headers | grep -c ".*");
  echo "$READY_PODS/$PARALLELISM pods are ready";
  if  [ $READY_PODS -eq $PARALLELISM ]; then
    break;
  fi;
  sleep 1;
done
"#;
        assert_eq!(waiter_command(1, "gatling-system", "testGatling"), expected);
    }

    #[test]
    fn runner_with_local_report() {
        let expected = r#"
SIMULATIONS_FORMAT=bundle
SIMULATIONS_DIR_PATH=testSimulationDirectoryPath
TEMP_SIMULATIONS_DIR_PATH=testTempSimulationsDirectoryPath
RESOURCES_DIR_PATH=testResourcesDirectoryPath
RESULTS_DIR_PATH=testResultsDirectoryPath
START_TIME="2021-09-10 08:45:31"
SIMULATION_CLASS=testSimulationClass
RUN_STATUS_FILE="${RESULTS_DIR_PATH}/COMPLETED"
if [ -z "${START_TIME}" ]; then
  START_TIME=$(date +"%Y-%m-%d %H:%M:%S" --utc)
fi
start_time_stamp=$(date -d "${START_TIME}" +"%s")
current_time_stamp=$(date +"%s")
echo "Wait until ${START_TIME}"
until [ ${current_time_stamp} -ge ${start_time_stamp} ];
do
  current_time_stamp=$(date +"%s")
  echo "it's ${current_time_stamp} now and waiting until ${start_time_stamp} ..."
  sleep 1;
done
if [ ! -d ${SIMULATIONS_DIR_PATH} ]; then
  mkdir -p ${SIMULATIONS_DIR_PATH}
fi
if [ -d ${TEMP_SIMULATIONS_DIR_PATH} ]; then
  cp -p ${TEMP_SIMULATIONS_DIR_PATH}/*.scala ${SIMULATIONS_DIR_PATH}
fi
if [ ! -d ${RESOURCES_DIR_PATH} ]; then
  mkdir -p ${RESOURCES_DIR_PATH}
fi
if [ ! -d ${RESULTS_DIR_PATH} ]; then
  mkdir -p ${RESULTS_DIR_PATH}
fi

if [ ${SIMULATIONS_FORMAT} = "bundle" ]; then
  gatling.sh -sf ${SIMULATIONS_DIR_PATH} -s ${SIMULATION_CLASS} -rsf ${RESOURCES_DIR_PATH} -rf ${RESULTS_DIR_PATH}  -rm local
elif [ ${SIMULATIONS_FORMAT} = "gradle" ]; then
  gradle -Dgatling.core.directory.results=${RESULTS_DIR_PATH} --simulation=${SIMULATION_CLASS}
fi

GATLING_EXIT_STATUS=$?
if [ $GATLING_EXIT_STATUS -ne 0 ]; then
  RUN_STATUS_FILE="${RESULTS_DIR_PATH}/FAILED"
  echo "gatling.sh has failed!" 1>&2
fi
touch ${RUN_STATUS_FILE}
exit $GATLING_EXIT_STATUS
"#;
        assert_eq!(runner_command(&args(true)), expected);
    }

    #[test]
    fn runner_without_local_report_passes_nr() {
        let command = runner_command(&args(false));
        assert!(command.contains("-rf ${RESULTS_DIR_PATH} -nr -rm local\n"));
    }

    #[test]
    fn runner_selects_gradle_format() {
        let mut gradle = args(false);
        gradle.format = SimulationFormat::Gradle;
        let command = runner_command(&gradle);
        assert!(command.starts_with("\nSIMULATIONS_FORMAT=gradle\n"));
    }

    #[test]
    fn empty_start_time_is_quoted() {
        let mut now = args(false);
        now.start_time = "";
        assert!(runner_command(&now).contains("START_TIME=\"\"\n"));
    }

    #[test]
    fn generate_report_splits_results_dir() {
        let expected = r#"
GATLING_AGGREGATE_DIR=testResultsDirectoryPath
DIR_NAME=$(dirname ${GATLING_AGGREGATE_DIR})
BASE_NAME=$(basename ${GATLING_AGGREGATE_DIR})
gatling.sh -rf ${DIR_NAME} -ro ${BASE_NAME}
"#;
        assert_eq!(generate_report_command("testResultsDirectoryPath"), expected);
    }

    #[test]
    fn provider_commands_are_empty_without_provider() {
        assert_eq!(transfer_result_command(None, "/r", "us", "s3:b/n/1"), "");
        assert_eq!(aggregate_result_command(None, "/r", "us", "s3:b/n/1"), "");
        assert_eq!(transfer_report_command(None, "/r", "us", "s3:b/n/1"), "");
    }

    #[test]
    fn provider_commands_delegate_to_provider() {
        let aws = StorageProvider::Aws;
        assert_eq!(
            transfer_report_command(Some(&aws), "/r", "us", "s3:b/n/1"),
            aws.transfer_report_command("/r", "us", "s3:b/n/1")
        );
        assert!(aggregate_result_command(Some(&aws), "/r", "us", "s3:b/n/1")
            .contains("region us"));
    }
}
