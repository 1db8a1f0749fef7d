use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use hostkeep_exec::{CommandOutput, CommandRunner, CommandSpec, ExecError};
use hostkeep_pkg::*;

// Mock runner: replays scripted results and records every spec it was given
#[derive(Default)]
struct ScriptedRunner {
    replies: Mutex<VecDeque<Result<CommandOutput, ExecError>>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    fn new(replies: Vec<Result<CommandOutput, ExecError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput, ExecError> {
        self.calls.lock().unwrap().push(cmd.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(CommandOutput::default()))
    }

    fn runner_type(&self) -> &'static str {
        "scripted"
    }
}

fn stdout(text: &str) -> Result<CommandOutput, ExecError> {
    Ok(CommandOutput {
        stdout: text.as_bytes().to_vec(),
        ..CommandOutput::default()
    })
}

fn exit(code: i32, stdout: &str, stderr: &str) -> Result<CommandOutput, ExecError> {
    Err(ExecError::ExitStatus {
        code,
        output: CommandOutput {
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            duration: Duration::ZERO,
        },
    })
}

#[tokio::test]
async fn test_dpkg_query_invocation() {
    let runner = ScriptedRunner::new(vec![stdout(
        r#"{"architecture":"amd64","package":"bash","source_name":"bash","source_version":"5.2","status":"installed","version":"5.2"}"#,
    )]);
    let dpkg = DpkgQuery::new(runner.clone()).with_timeout(Duration::from_secs(30));

    let packages = dpkg.installed_packages().await.unwrap();

    assert_eq!(packages, vec![PackageRecord::new("bash", "amd64", "5.2").with_source("bash", "5.2")]);
    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].program, "/usr/bin/dpkg-query");
    assert_eq!(calls[0].args[0], "-W");
    assert_eq!(calls[0].args[1], "-f");
    assert!(calls[0].args[2].starts_with("\\{\"architecture\""));
    assert_eq!(calls[0].timeout, Some(Duration::from_secs(30)));
    assert_eq!(dpkg.manager_type(), PackageManagerType::Deb);
}

#[tokio::test]
async fn test_command_failure_carries_output() {
    let runner = ScriptedRunner::new(vec![exit(2, "partial", "dpkg-query: error")]);
    let dpkg = DpkgQuery::new(runner);

    let err = dpkg.installed_packages().await.unwrap_err();

    assert!(matches!(err, PackageError::Command { .. }));
    assert_eq!(err.exec_error().and_then(ExecError::exit_code), Some(2));
    let message = err.to_string();
    assert!(message.starts_with("error running /usr/bin/dpkg-query with args [\"-W\", \"-f\""));
    assert!(message.contains(": exit status 2, stdout: \"partial\", stderr: \"dpkg-query: error\""));
}

#[tokio::test]
async fn test_missing_binary_is_not_found() {
    let runner = ScriptedRunner::new(vec![Err(ExecError::NotFound {
        program: "/usr/bin/rpmquery".to_string(),
    })]);
    let rpm = RpmQuery::new(runner);

    let err = rpm.installed_packages().await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_unparsable_output_is_not_not_found() {
    let runner = ScriptedRunner::new(vec![stdout("")]);
    let rpm = RpmQuery::new(runner);

    let err = rpm.package_info(Path::new("empty.rpm")).await.unwrap_err();

    assert!(!err.is_not_found());
    assert!(err.exec_error().is_none());
}

#[tokio::test]
async fn test_rpm_package_info_single() {
    let runner = ScriptedRunner::new(vec![stdout("foo x86_64 1.2.3-4\n")]);
    let rpm = RpmQuery::new(runner.clone());

    let record = rpm.package_info(Path::new("/tmp/foo.rpm")).await.unwrap();

    assert_eq!(record, PackageRecord::new("foo", "x86_64", "1.2.3-4"));
    let args = &runner.calls()[0].args;
    assert_eq!(args[2], "-p");
    assert_eq!(args[3], "/tmp/foo.rpm");
}

#[tokio::test]
async fn test_rpm_package_info_rejects_zero_or_many() {
    let runner = ScriptedRunner::new(vec![
        stdout(""),
        stdout("foo x86_64 1.2.3-4\nbar noarch 1.2.3-4\n"),
    ]);
    let rpm = RpmQuery::new(runner);

    let none = rpm.package_info(Path::new("a.rpm")).await.unwrap_err();
    let many = rpm.package_info(Path::new("b.rpm")).await.unwrap_err();

    assert!(matches!(none, PackageError::ParseError(_)));
    assert!(many.to_string().contains("unexpected number of parsed rpm packages 2"));
}

#[tokio::test]
async fn test_apt_refreshes_then_lists() {
    let runner = ScriptedRunner::new(vec![
        stdout(""),
        stdout("Listing...\ncurl/stable 7.88.1-10+deb12u5 amd64 [upgradable from: 7.88.1-10+deb12u4]\n"),
    ]);
    let apt = AptManager::new(runner.clone());

    let updates = apt.available_updates().await.unwrap();

    assert_eq!(updates, vec![PackageRecord::new("curl", "amd64", "7.88.1-10+deb12u5")]);
    let calls = runner.calls();
    assert_eq!(calls[0].to_string(), "/usr/bin/apt-get update -qq");
    assert_eq!(calls[1].to_string(), "/usr/bin/apt list --upgradable");
}

#[tokio::test]
async fn test_apt_refresh_failure_stops() {
    let runner = ScriptedRunner::new(vec![exit(100, "", "E: Could not get lock")]);
    let apt = AptManager::new(runner.clone());

    assert!(apt.available_updates().await.is_err());
    assert_eq!(runner.calls().len(), 1);
}

const YUM_TABLE: &str = "Upgrading:\n foo x86_64 2.0-1 baseos 10 k\n";

#[tokio::test]
async fn test_yum_no_updates_skips_pty() {
    let runner = ScriptedRunner::new(vec![stdout("")]);
    let pty = ScriptedRunner::new(vec![]);
    let yum = YumManager::new(runner.clone(), pty.clone());

    let updates = yum.available_updates().await.unwrap();

    assert!(updates.is_empty());
    assert_eq!(runner.calls()[0].to_string(), "/usr/bin/yum check-update --assumeyes");
    assert!(pty.calls().is_empty());
}

#[tokio::test]
async fn test_yum_updates_use_pty_runner() {
    let runner = ScriptedRunner::new(vec![exit(100, "", "")]);
    let pty = ScriptedRunner::new(vec![exit(1, YUM_TABLE, "")]);
    let yum = YumManager::new(runner, pty.clone()).with_security(true);

    let updates = yum.available_updates().await.unwrap();

    assert_eq!(updates, vec![PackageRecord::new("foo", "x86_64", "2.0-1")]);
    assert_eq!(
        pty.calls()[0].to_string(),
        "/usr/bin/yum update --assumeno --cacheonly --color=never --security"
    );
}

#[tokio::test]
async fn test_yum_minimal_and_clean_exit() {
    let runner = ScriptedRunner::new(vec![exit(100, "", "")]);
    let pty = ScriptedRunner::new(vec![stdout(YUM_TABLE)]);
    let yum = YumManager::new(runner, pty.clone()).with_minimal(true);

    let updates = yum.available_updates().await.unwrap();

    assert_eq!(updates.len(), 1);
    assert_eq!(pty.calls()[0].args[0], "update-minimal");
}

#[tokio::test]
async fn test_yum_check_update_failure() {
    let runner = ScriptedRunner::new(vec![exit(1, "", "repo error")]);
    let pty = ScriptedRunner::new(vec![]);
    let yum = YumManager::new(runner, pty.clone());

    let err = yum.available_updates().await.unwrap_err();

    assert!(err.to_string().contains("check-update"));
    assert!(pty.calls().is_empty());
}

#[tokio::test]
async fn test_yum_update_other_failure() {
    let runner = ScriptedRunner::new(vec![exit(100, "", "")]);
    let pty = ScriptedRunner::new(vec![Err(ExecError::Timeout {
        timeout: Duration::from_secs(5),
    })]);
    let yum = YumManager::new(runner, pty);

    let err = yum.available_updates().await.unwrap_err();
    assert!(matches!(
        err.exec_error(),
        Some(ExecError::Timeout { .. })
    ));
}
