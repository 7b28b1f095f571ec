use assert_cmd::Command;
use httpmock::MockServer;
use predicates::{prelude::*, str::contains};
use serde_json::Value;

fn serve_shell(server: &MockServer, broken: Option<&str>) {
    for path in ["/", "/logo.png", "/manifest.json"] {
        let status = if broken == Some(path) { 500 } else { 200 };
        server.mock(|when, then| {
            when.method("GET").path(path);
            then.status(status).body(format!("asset {path}"));
        });
    }
}

fn install_cmd(server: &MockServer) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("precache"));
    cmd.env("RUST_LOG", "off")
        .env_remove("PRECACHE_CONFIG_FILE")
        .arg("install")
        .arg("--upstream-origin")
        .arg(server.base_url());
    cmd
}

#[test]
fn install_prints_report_as_json() {
    let server = MockServer::start();
    serve_shell(&server, None);

    let assert = install_cmd(&server).assert().success();

    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    let report: Value = serde_json::from_str(&output).expect("json report");
    assert_eq!(report["cache_name"], "v1");
    assert_eq!(report["policy"], "fail-fast");
    assert_eq!(
        report["cached"],
        serde_json::json!(["/", "/logo.png", "/manifest.json"])
    );
    assert_eq!(report["failed"], serde_json::json!([]));
}

#[test]
fn fail_fast_install_exits_non_zero() {
    let server = MockServer::start();
    serve_shell(&server, Some("/logo.png"));

    install_cmd(&server)
        .assert()
        .failure()
        .stdout(contains("cache_name").not());
}

#[test]
fn best_effort_install_reports_failures_and_exits_non_zero() {
    let server = MockServer::start();
    serve_shell(&server, Some("/logo.png"));

    let assert = install_cmd(&server)
        .arg("--install-policy")
        .arg("best-effort")
        .assert()
        .failure();

    let output = String::from_utf8_lossy(&assert.get_output().stdout);
    let report: Value = serde_json::from_str(&output).expect("json report");
    assert_eq!(report["policy"], "best-effort");
    assert_eq!(report["cached"], serde_json::json!(["/", "/manifest.json"]));
    assert_eq!(report["failed"][0]["url"], "/logo.png");
}

#[test]
fn unknown_install_policy_is_rejected() {
    let server = MockServer::start();

    install_cmd(&server)
        .arg("--install-policy")
        .arg("sometimes")
        .assert()
        .failure();
}
