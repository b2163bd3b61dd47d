//! Kernel management integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn install_local_binary_records_default() {
  let env = TestEnv::new();
  let binary = env.write_file("downloads/my-kernel", "binary");

  env
    .runkit_cmd()
    .args(["kernel", "install", "custom", "--version", "2.0.0", "--path"])
    .arg(&binary)
    .assert()
    .success()
    .stdout(predicate::str::contains("Installed kernel 'custom' (2.0.0)"));

  let manifest = env.manifest();
  assert_eq!(manifest["defaultKernel"], "custom");
  assert_eq!(manifest["installedKernels"][0]["version"], "2.0.0");
  assert!(env.bin_path().join("custom").is_file());
}

#[test]
fn reinstall_same_version_is_a_noop() {
  let env = TestEnv::new();
  let binary = env.write_file("native", "binary");

  env
    .runkit_cmd()
    .args(["kernel", "install", "native", "--version", "1.0.0", "--path"])
    .arg(&binary)
    .assert()
    .success();

  env
    .runkit_cmd()
    .args(["kernel", "install", "native", "--version", "1.0.0", "--path"])
    .arg(&binary)
    .assert()
    .success()
    .stdout(predicate::str::contains("already installed"));

  assert_eq!(env.manifest()["installedKernels"].as_array().unwrap().len(), 1);
}

#[test]
fn install_different_version_requires_force() {
  let env = TestEnv::new();
  let binary = env.write_file("native", "binary");
  env
    .runkit_cmd()
    .args(["kernel", "install", "native", "--version", "1.0.0", "--path"])
    .arg(&binary)
    .assert()
    .success();

  env
    .runkit_cmd()
    .args(["kernel", "install", "native", "--version", "1.1.0", "--path"])
    .arg(&binary)
    .assert()
    .failure()
    .stderr(predicate::str::contains("already installed"));

  env
    .runkit_cmd()
    .args(["kernel", "install", "native", "--version", "1.1.0", "--force", "--path"])
    .arg(&binary)
    .assert()
    .success();
  assert_eq!(env.manifest()["installedKernels"][0]["version"], "1.1.0");
}

#[test]
fn install_missing_path_fails() {
  let env = TestEnv::new();

  env
    .runkit_cmd()
    .args(["kernel", "install", "native", "--path"])
    .arg(env.temp.path().join("nope"))
    .assert()
    .failure();

  assert!(!env.manifest_path().exists() || env.manifest()["installedKernels"].as_array().unwrap().is_empty());
}

#[test]
fn install_custom_kernel_from_release_is_rejected() {
  let env = TestEnv::new();

  env
    .runkit_cmd()
    .args(["kernel", "install", "custom", "--from-release"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("custom"));
}

#[test]
fn install_jvm_from_release() {
  let mut server = mockito::Server::new();
  let env = TestEnv::with_server(&server.url());
  let manifest = server
    .mock("GET", "/runkit-dev/runkit/releases/download/v0.3.0/release-manifest.json")
    .with_status(200)
    .with_body(format!(
      r#"{{"kernels":{{"jvm":{{"assets":[{{"name":"jvm-kernel.jar","download_url":"{}/files/jvm-kernel.jar"}}]}}}}}}"#,
      server.url()
    ))
    .create();
  let jar = server
    .mock("GET", "/files/jvm-kernel.jar")
    .with_status(200)
    .with_body("PK-jar")
    .create();

  env
    .runkit_cmd()
    .args(["kernel", "install", "jvm", "--from-release", "--version", "0.3.0"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Installed kernel 'jvm' (0.3.0)"));

  manifest.assert();
  jar.assert();
  assert_eq!(std::fs::read(env.bin_path().join("jvm.jar")).unwrap(), b"PK-jar");
}

#[test]
fn install_rejects_unknown_platform() {
  let env = TestEnv::new();

  env
    .runkit_cmd()
    .args(["kernel", "install", "native", "--platform", "sparc-solaris"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("--platform"));
}

#[test]
fn ls_lists_kernels_and_marks_default() {
  let env = TestEnv::new();
  env.install_local("native", &env.write_file("a", "a"));
  env.install_local("custom", &env.write_file("b", "b"));

  env
    .runkit_cmd()
    .args(["kernel", "ls"])
    .assert()
    .success()
    .stdout(predicate::str::contains("* native"))
    .stdout(predicate::str::contains("custom"));
}

#[test]
fn ls_json_output() {
  let env = TestEnv::new();
  env.install_local("native", &env.write_file("a", "a"));

  let output = env.runkit_cmd().args(["kernel", "ls", "-o", "json"]).output().unwrap();
  assert!(output.status.success());

  let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(json["defaultKernel"], "native");
  assert_eq!(json["kernels"][0]["id"], "native");
  assert_eq!(json["kernels"][0]["default"], true);
}

#[test]
fn ls_empty() {
  let env = TestEnv::new();

  env
    .runkit_cmd()
    .args(["kernel", "ls"])
    .assert()
    .success()
    .stdout(predicate::str::contains("No kernels installed"));
}

#[test]
fn remove_reassigns_default_and_deletes_file() {
  let env = TestEnv::new();
  env.install_local("native", &env.write_file("a", "a"));
  env.install_local("custom", &env.write_file("b", "b"));

  env
    .runkit_cmd()
    .args(["kernel", "remove", "native"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Removed kernel 'native'"));

  assert_eq!(env.manifest()["defaultKernel"], "custom");
  assert!(!env.bin_path().join("native").exists());
  assert!(env.temp.path().join("a").exists());
}

#[test]
fn remove_unknown_kernel_fails() {
  let env = TestEnv::new();

  env
    .runkit_cmd()
    .args(["kernel", "remove", "ghost"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("ghost"));
}

#[test]
fn default_switches_kernel() {
  let env = TestEnv::new();
  env.install_local("native", &env.write_file("a", "a"));
  env.install_local("custom", &env.write_file("b", "b"));

  env.runkit_cmd().args(["kernel", "default", "custom"]).assert().success();
  assert_eq!(env.manifest()["defaultKernel"], "custom");

  env
    .runkit_cmd()
    .args(["kernel", "default", "ghost"])
    .assert()
    .failure();
  assert_eq!(env.manifest()["defaultKernel"], "custom");
}

#[test]
fn corrupt_manifest_is_healed_with_warning() {
  let env = TestEnv::new();
  std::fs::write(env.manifest_path(), "{not json").unwrap();

  env
    .runkit_cmd()
    .args(["kernel", "ls"])
    .assert()
    .success()
    .stderr(predicate::str::contains("reset to defaults"));

  assert_eq!(env.manifest()["installedKernels"], serde_json::json!([]));
}
