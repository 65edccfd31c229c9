//! Integration tests for kpipe

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn kpipe_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("kpipe");
    cmd.env("KPIPE_CONFIG", config_dir.path().join("kpipe.toml"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn temp_dir() -> TempDir {
    match TempDir::new() {
        Ok(dir) => dir,
        Err(e) => panic!("temp dir should be created: {e}"),
    }
}

fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        assert!(fs::create_dir_all(parent).is_ok());
    }
    assert!(fs::write(path, content).is_ok());
}

#[test]
fn test_version() {
    let config = temp_dir();
    kpipe_cmd(&config)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("kpipe"));
}

#[test]
fn test_help() {
    let config = temp_dir();
    kpipe_cmd(&config)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("kpipe reads YAML resource documents"));
}

#[test]
fn test_invalid_command() {
    let config = temp_dir();
    kpipe_cmd(&config).arg("invalid").assert().failure();
}

#[test]
fn test_cat_stdin_unwraps_resource_list() {
    let config = temp_dir();
    kpipe_cmd(&config)
        .arg("cat")
        .write_stdin("kind: ResourceList\napiVersion: kyaml.kustomize.dev/v1alpha1\nitems:\n- a: 1\n- b: 2\n")
        .assert()
        .success()
        .stdout("a: 1\n---\nb: 2\n");
}

#[test]
fn test_cat_package_skips_subpackages() {
    let config = temp_dir();
    let pkg = temp_dir();
    write_file(pkg.path(), "a.yaml", "kind: A\n");
    write_file(pkg.path(), "b.yaml", "kind: B\n");
    write_file(pkg.path(), "sub/Kptfile", "kind: Kptfile\n");
    write_file(pkg.path(), "sub/c.yaml", "kind: C\n");

    kpipe_cmd(&config)
        .arg("cat")
        .arg(pkg.path())
        .args(["--package-file", "Kptfile"])
        .assert()
        .success()
        .stdout("kind: A\n---\nkind: B\n");

    kpipe_cmd(&config)
        .arg("cat")
        .arg(pkg.path())
        .args(["--package-file", "Kptfile", "--include-subpackages"])
        .assert()
        .success()
        .stdout("kind: A\n---\nkind: B\n---\nkind: C\n");
}

#[test]
fn test_cat_uses_configured_package_file() {
    let config = temp_dir();
    let pkg = temp_dir();
    write_file(pkg.path(), "a.yaml", "kind: A\n");
    write_file(pkg.path(), "sub/Kptfile", "kind: Kptfile\n");
    write_file(pkg.path(), "sub/c.yaml", "kind: C\n");

    kpipe_cmd(&config)
        .args(["config", "set", "package-file-name", "Kptfile"])
        .assert()
        .success();

    kpipe_cmd(&config)
        .arg("cat")
        .arg(pkg.path())
        .assert()
        .success()
        .stdout("kind: A\n");
}

#[test]
fn test_grep_by_annotation() {
    let config = temp_dir();
    kpipe_cmd(&config)
        .args(["grep", "--annotation", "team=blue"])
        .write_stdin("kind: A\nmetadata:\n  annotations:\n    team: blue\n---\nkind: B\n")
        .assert()
        .success()
        .stdout("kind: A\nmetadata:\n  annotations:\n    team: blue\n");
}

#[test]
fn test_grep_requires_selector() {
    let config = temp_dir();
    kpipe_cmd(&config).arg("grep").assert().failure();
}

#[test]
fn test_run_updates_package_and_stdin() {
    let config = temp_dir();
    let work = temp_dir();
    write_file(
        work.path(),
        "pipeline.yaml",
        "variables:\n  suffix: -prod\nfilters:\n  - kind: PathGetter\n    path: [metadata, name]\n  - kind: SuffixSetter\n    value: ${suffix}\n",
    );
    write_file(work.path(), "pkg/app.yaml", "kind: App\nmetadata:\n  name: web\n");
    let pipeline = work.path().join("pipeline.yaml");

    kpipe_cmd(&config)
        .arg("run")
        .arg(&pipeline)
        .arg(work.path().join("pkg"))
        .assert()
        .success();
    let app = fs::read_to_string(work.path().join("pkg/app.yaml")).unwrap_or_default();
    assert_eq!(app, "kind: App\nmetadata:\n  name: web-prod\n");

    kpipe_cmd(&config)
        .arg("run")
        .arg(&pipeline)
        .write_stdin("kind: App\nmetadata:\n  name: api\n")
        .assert()
        .success()
        .stdout("kind: App\nmetadata:\n  name: api-prod\n");
}

#[test]
fn test_run_unknown_filter_kind_fails() {
    let config = temp_dir();
    let work = temp_dir();
    write_file(work.path(), "pipeline.yaml", "filters:\n  - kind: Bogus\n");

    kpipe_cmd(&config)
        .arg("run")
        .arg(work.path().join("pipeline.yaml"))
        .write_stdin("a: 1\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported filter kind Bogus"));
}

#[test]
fn test_init_then_run_dry_run() {
    let config = temp_dir();
    let work = temp_dir();
    let pipeline = work.path().join("pipeline.yaml");
    write_file(
        work.path(),
        "pkg/deploy.yaml",
        "kind: Deployment\nspec:\n  template:\n    spec:\n      containers:\n      - name: nginx\n        image: nginx:1.7\n",
    );

    kpipe_cmd(&config).arg("init").arg(&pipeline).assert().success();
    kpipe_cmd(&config).arg("init").arg(&pipeline).assert().failure();

    kpipe_cmd(&config)
        .arg("run")
        .arg(&pipeline)
        .arg(work.path().join("pkg"))
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("image: nginx:1.8"))
        .stdout(predicate::str::contains("example.com/team: platform"));

    let deploy = fs::read_to_string(work.path().join("pkg/deploy.yaml")).unwrap_or_default();
    assert!(deploy.contains("nginx:1.7"));
}

#[test]
fn test_config_set_get_show_reset() {
    let config = temp_dir();
    kpipe_cmd(&config)
        .args(["config", "set", "no-delete-files", "true"])
        .assert()
        .success();
    kpipe_cmd(&config)
        .args(["config", "get", "no-delete-files"])
        .assert()
        .success()
        .stdout("true\n");
    kpipe_cmd(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no-delete-files"));
    kpipe_cmd(&config)
        .args(["config", "reset"])
        .assert()
        .success();
    kpipe_cmd(&config)
        .args(["config", "get", "no-delete-files"])
        .assert()
        .success()
        .stdout("");
}

#[test]
fn test_config_unknown_key_fails() {
    let config = temp_dir();
    kpipe_cmd(&config)
        .args(["config", "set", "colour", "red"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key: colour"));
}

#[test]
fn test_config_path_honors_env() {
    let config = temp_dir();
    kpipe_cmd(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kpipe.toml"));
}
