use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const HISTORY: [&str; 36] = [
    "20040101", "20050101", "20060101", "20070101", "20080101", "20090101", "20100101",
    "20110101", "20120101", "20130101", "20140101", "20150101", "20160101", "20160201",
    "20160411", "20170101", "20170701", "20170801", "20170901", "20171001", "20171101",
    "20171201", "20180101", "20180201", "20180301", "20180401", "20180402", "20180403",
    "20180404", "20180405", "20180406", "20180407", "20180408", "20180409", "20180410",
    "20180411",
];

const KEPT: [&str; 26] = [
    "20080101", "20090101", "20100101", "20110101", "20120101", "20130101", "20140101",
    "20150101", "20160101", "20170101", "20171001", "20171101", "20171201", "20180101",
    "20180201", "20180301", "20180401", "20180402", "20180404", "20180405", "20180406",
    "20180407", "20180408", "20180409", "20180410", "20180411",
];

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new(config: &str) -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("causync_src/testdir1")).unwrap();
        fs::write(dir.path().join("causync_src/testdir1/testfile1"), "Lorem ipsum").unwrap();
        fs::write(dir.path().join("config.json"), config).unwrap();
        Self { dir }
    }

    fn with_history(self) -> Self {
        for name in HISTORY {
            fs::create_dir_all(self.dst().join(name)).unwrap();
        }
        self
    }

    fn src(&self) -> PathBuf {
        self.dir.path().join("causync_src")
    }

    fn dst(&self) -> PathBuf {
        self.dir.path().join("causync_dst")
    }

    fn marker(&self) -> PathBuf {
        self.dir.path().join("causync_src.lock")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("causync").unwrap();
        cmd.env("CAUSYNC_CONFIG", self.dir.path().join("config.json"))
            .env_remove("RUST_LOG")
            .arg("--no-color");
        cmd
    }
}

fn snapshot_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

const QUIET_CONFIG: &str = r#"{ "process_check": false }"#;

#[test]
fn test_version() {
    let sandbox = Sandbox::new(QUIET_CONFIG);
    let output = sandbox.cmd().arg("version").assert().success().get_output().stdout.clone();
    assert!(String::from_utf8(output).unwrap().starts_with("causync "));
}

#[test]
fn test_version_json() {
    let sandbox = Sandbox::new(QUIET_CONFIG);
    let output = sandbox
        .cmd()
        .args(["--json", "version"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[test]
fn test_cleanup_keeps_retention_set() {
    let sandbox = Sandbox::new(QUIET_CONFIG).with_history();

    sandbox
        .cmd()
        .args(["--now", "20180411", "cleanup"])
        .arg(sandbox.src())
        .arg(sandbox.dst())
        .assert()
        .success();

    assert_eq!(snapshot_names(&sandbox.dst()), KEPT);
    assert!(!sandbox.marker().exists());
}

#[test]
fn test_cleanup_dry_run_deletes_nothing() {
    let sandbox = Sandbox::new(QUIET_CONFIG).with_history();

    let output = sandbox
        .cmd()
        .args(["--dry-run", "--json", "--now", "20180411", "cleanup"])
        .arg(sandbox.src())
        .arg(sandbox.dst())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["dry_run"], true);
    assert_eq!(json["deleted"].as_array().unwrap().len(), 10);
    assert_eq!(snapshot_names(&sandbox.dst()).len(), 36);
}

#[test]
fn test_held_guard_exits_with_already_running() {
    let sandbox = Sandbox::new(QUIET_CONFIG).with_history();
    fs::write(sandbox.marker(), "").unwrap();

    sandbox
        .cmd()
        .args(["--now", "20180411", "cleanup"])
        .arg(sandbox.src())
        .arg(sandbox.dst())
        .assert()
        .code(3);

    assert_eq!(snapshot_names(&sandbox.dst()).len(), 36);
    assert!(sandbox.marker().exists());
}

#[test]
fn test_malformed_snapshot_exits_with_parse_error() {
    let sandbox = Sandbox::new(QUIET_CONFIG).with_history();
    fs::create_dir(sandbox.dst().join("2018-04-12")).unwrap();

    let output = sandbox
        .cmd()
        .args(["--json", "--now", "20180411", "cleanup"])
        .arg(sandbox.src())
        .arg(sandbox.dst())
        .assert()
        .code(2)
        .get_output()
        .stderr
        .clone();

    let stderr = String::from_utf8(output).unwrap();
    let last_line = stderr.lines().last().unwrap();
    let json: serde_json::Value = serde_json::from_str(last_line).unwrap();
    assert_eq!(json["error"]["code"], "PARSE_ERROR");
    assert_eq!(snapshot_names(&sandbox.dst()).len(), 37);
}

#[test]
fn test_bad_now_is_invalid_argument() {
    let sandbox = Sandbox::new(QUIET_CONFIG);
    sandbox
        .cmd()
        .args(["--now", "yesterday", "list"])
        .arg(sandbox.dst())
        .assert()
        .code(4);
}

#[test]
fn test_broken_config_exits_with_config_error() {
    let sandbox = Sandbox::new(r#"{ "date_format": "" }"#);
    sandbox.cmd().arg("list").arg(sandbox.dst()).assert().code(7);
}

#[test]
fn test_list_json() {
    let sandbox = Sandbox::new(QUIET_CONFIG).with_history();
    let output = sandbox
        .cmd()
        .args(["--json", "--now", "20180411", "list"])
        .arg(sandbox.dst())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let entries = json["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 36);
    assert_eq!(entries[0]["name"], "20180411");
    assert_eq!(entries[0]["kept_by"], "daily");
}

#[test]
fn test_dot_spelled_source_shares_the_marker() {
    let sandbox = Sandbox::new(QUIET_CONFIG).with_history();
    // The working directory comes back with symlinks resolved.
    let marker = sandbox.src().canonicalize().unwrap().with_extension("lock");
    fs::write(&marker, "").unwrap();

    sandbox
        .cmd()
        .current_dir(sandbox.src())
        .args(["--now", "20180411", "cleanup", "."])
        .arg(sandbox.dst())
        .assert()
        .code(3);

    assert_eq!(snapshot_names(&sandbox.dst()).len(), 36);
    assert!(!sandbox.src().join("..lock").exists());
}

#[test]
fn test_check_and_unlock() {
    let sandbox = Sandbox::new(QUIET_CONFIG);
    fs::write(sandbox.marker(), "").unwrap();

    let output = sandbox
        .cmd()
        .args(["--json", "check"])
        .arg(sandbox.src())
        .arg(sandbox.dst())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["state"], "held");

    sandbox.cmd().arg("unlock").arg(sandbox.src()).assert().success();
    assert!(!sandbox.marker().exists());
}

#[cfg(unix)]
#[test]
fn test_sync_with_stand_in_transfer_tool() {
    // `true` accepts any arguments and succeeds without copying anything.
    let sandbox = Sandbox::new(r#"{ "process_check": false, "rsync": { "program": "true" } }"#)
        .with_history();

    let output = sandbox
        .cmd()
        .args(["--json", "--now", "20180412", "sync"])
        .arg(sandbox.src())
        .arg(sandbox.dst())
        .args(["--exclude", "testfile2"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert!(json["destination"].as_str().unwrap().ends_with("causync_dst/20180412"));
    assert_eq!(json["link_dest"].as_array().unwrap().len(), 5);
    assert!(!sandbox.marker().exists());
}

#[test]
fn test_no_log_file_unless_configured() {
    let sandbox = Sandbox::new(QUIET_CONFIG);
    sandbox
        .cmd()
        .current_dir(sandbox.dir.path())
        .args(["--now", "20180411", "list"])
        .arg(sandbox.dst())
        .assert()
        .success();

    assert!(!sandbox.dir.path().join("causync.log").exists());
}

#[test]
fn test_log_file_receives_run_records() {
    let sandbox = Sandbox::new(QUIET_CONFIG);
    let log = sandbox.dir.path().join("causync.log");

    sandbox
        .cmd()
        .arg("-q")
        .arg("--log-file")
        .arg(&log)
        .args(["--now", "20180411", "list"])
        .arg(sandbox.dst())
        .assert()
        .success();

    let contents = fs::read_to_string(&log).unwrap();
    assert!(contents.contains("causync started"));
    assert!(contents.contains("causync finished"));
}
