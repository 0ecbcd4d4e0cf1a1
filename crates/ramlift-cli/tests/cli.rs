use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const API: &str = "#%RAML 1.0
title: Library API
version: v2
uses:
  lib: lib/types.raml
/books:
  get:
    responses:
      200:
        body:
          application/json:
            type: lib.Book[]
  /{isbn}:
    get:
";

const LIB: &str = "#%RAML 1.0 Library
types:
  Book:
    properties:
      title: string
      isbn: string
";

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("lib")).unwrap();
    fs::write(dir.path().join("api.raml"), API).unwrap();
    fs::write(dir.path().join("lib/types.raml"), LIB).unwrap();
    dir
}

fn ramlift(dir: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("ramlift").unwrap();
    cmd.current_dir(dir).env_remove("RAMLIFT_LOG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn compile_writes_openapi_json() {
    let dir = workspace();
    let out = dir.path().join("out/openapi.json");

    ramlift(dir.path())
        .args(["compile", "api.raml", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("wrote"));

    let doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(doc["openapi"], "3.0.3");
    assert_eq!(doc["info"]["version"], "v2");
    assert_eq!(
        doc["paths"]["/books"]["get"]["responses"]["200"]["content"]["application/json"]["schema"]["items"]["$ref"],
        "#/components/schemas/lib.Book"
    );
    assert!(doc["paths"]["/books/{isbn}"].is_object());
}

#[test]
fn compile_to_stdout_in_yaml() {
    let dir = workspace();
    ramlift(dir.path())
        .args(["compile", "api.raml", "--format", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("openapi:").and(predicate::str::contains("title: Library API")));
}

#[test]
fn compile_output_is_byte_identical_across_runs() {
    let dir = workspace();
    let run = || {
        ramlift(dir.path())
            .args(["compile", "api.raml", "--plugin", "builtin.operation-ids"])
            .output()
            .unwrap()
            .stdout
    };
    let first = run();
    assert!(!first.is_empty());
    assert_eq!(first, run());
}

#[test]
fn plugins_from_flags_and_config() {
    let dir = workspace();
    fs::write(
        dir.path().join("ramlift.json"),
        r#"{"plugins":["builtin.tags"],"builtin":{"tags":{"describe":false}}}"#,
    )
    .unwrap();

    let output = ramlift(dir.path())
        .args(["--config", "ramlift.json", "compile", "api.raml"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["paths"]["/books"]["get"]["tags"], serde_json::json!(["books"]));
    assert!(doc.get("tags").is_none());

    // --plugin replaces the configured list
    let output = ramlift(dir.path())
        .args(["--config", "ramlift.json", "compile", "api.raml", "--plugin", "builtin.operation-ids"])
        .output()
        .unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(doc["paths"]["/books"]["get"].get("tags").is_none());
    assert_eq!(doc["paths"]["/books/{isbn}"]["get"]["operationId"], "getBooksByIsbn");
}

#[test]
fn yaml_config_file() {
    let dir = workspace();
    fs::write(
        dir.path().join("ramlift.yaml"),
        "plugins:\n  - builtin.tags\nbuiltin:\n  tags:\n    describe: false\n",
    )
    .unwrap();

    let output = ramlift(dir.path())
        .args(["--config", "ramlift.yaml", "compile", "api.raml"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["paths"]["/books"]["get"]["tags"], serde_json::json!(["books"]));

    fs::write(dir.path().join("broken.yml"), "plugins: [unterminated\n").unwrap();
    ramlift(dir.path())
        .args(["--config", "broken.yml", "compile", "api.raml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid yaml in"));
}

#[test]
fn unknown_plugin_fails() {
    let dir = workspace();
    ramlift(dir.path())
        .args(["compile", "api.raml", "--plugin", "builtin.nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("plugin not found: builtin.nope"));
}

#[test]
fn check_reports_stats_as_json() {
    let dir = workspace();
    let output = ramlift(dir.path())
        .args(["--json", "check", "api.raml"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["ok"], true);
    assert_eq!(report["title"], "Library API");
    assert_eq!(report["stats"]["documents"], 2);
    assert_eq!(report["stats"]["methods"], 2);
}

#[test]
fn check_human_summary() {
    let dir = workspace();
    ramlift(dir.path())
        .args(["check", "api.raml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok: Library API"));
}

#[test]
fn overlay_flag_applies_overlays() {
    let dir = workspace();
    fs::write(
        dir.path().join("docs.raml"),
        "#%RAML 1.0 Overlay\nextends: api.raml\ndescription: Browse the catalogue\n",
    )
    .unwrap();
    let output = ramlift(dir.path())
        .args(["compile", "api.raml", "--overlay", "docs.raml"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["info"]["description"], "Browse the catalogue");
}

#[test]
fn strict_mode_fails_on_unsupported_constructs() {
    let dir = workspace();
    fs::write(
        dir.path().join("legacy.raml"),
        "#%RAML 1.0\ntitle: Legacy\n/search:\n  get:\n    body:\n      application/json:\n        type: object\n",
    )
    .unwrap();

    ramlift(dir.path())
        .args(["compile", "legacy.raml"])
        .assert()
        .success()
        .stderr(predicate::str::contains("build.unsupported"));

    ramlift(dir.path())
        .args(["--json", "compile", "legacy.raml", "--strict"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("UnsupportedConstructError"));
}

#[test]
fn missing_input_fails() {
    let dir = workspace();
    ramlift(dir.path())
        .args(["compile", "nope.raml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.raml"));
}

#[test]
fn plugins_lists_builtins() {
    let dir = workspace();
    ramlift(dir.path())
        .arg("plugins")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("builtin.annotations")
                .and(predicate::str::contains("builtin.operation-ids"))
                .and(predicate::str::contains("builtin.tags")),
        );
}
