//! Run command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn run_without_kernels_fails() {
  let env = TestEnv::new();

  env
    .runkit_cmd()
    .args(["run", "demo.yaml"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no default kernel"));
}

#[test]
fn run_unknown_kernel_fails() {
  let env = TestEnv::new();

  env
    .runkit_cmd()
    .args(["run", "--kernel", "ghost", "demo.yaml"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("'ghost' is not registered"));
}

#[cfg(unix)]
#[test]
fn run_projects_json_result() {
  let env = TestEnv::new();
  let kernel = env.write_script(
    "src/native",
    "echo starting\necho '{\"value\":1,\"error\":null,\"warnings\":[]}'\necho done\n",
  );
  env.install_local("native", &kernel);

  env
    .runkit_cmd()
    .args(["run", "demo.yaml"])
    .assert()
    .success()
    .stdout("{\n  \"value\": 1,\n  \"error\": null,\n  \"warnings\": []\n}\n")
    .stderr("starting\ndone\n");
}

#[cfg(unix)]
#[test]
fn run_passes_translated_arguments() {
  let env = TestEnv::new();
  let kernel = env.write_script("src/native", "printf '%s\\n' \"$@\" > \"$0.args\"\n");
  env.install_local("native", &kernel);

  env
    .runkit_cmd()
    .args(["run", "--", "demo.yaml", "text={\"success\":true}", "--output", "out/"])
    .assert()
    .success();

  let args = std::fs::read_to_string(env.bin_path().join("native.args")).unwrap();
  assert_eq!(args, "--compose\ndemo.yaml\n--output\nout/\n--args\n{\"text\":{\"success\":true}}\n");
}

#[cfg(unix)]
#[test]
fn run_python_kernel_uses_args_json() {
  let env = TestEnv::new();
  let kernel = env.write_script("src/python.sh", "printf '%s\\n' \"$@\" > \"$0.args\"\n");
  env.install_local("python", &kernel);

  env
    .runkit_cmd()
    .args(["run", "--kernel", "python", "demo.yaml", "n=3"])
    .assert()
    .success();

  let args = std::fs::read_to_string(env.bin_path().join("python.sh.args")).unwrap();
  assert_eq!(args, "--compose\ndemo.yaml\n--args-json\n{\"n\":3}\n");
}

#[cfg(unix)]
#[test]
fn run_propagates_kernel_exit_code() {
  let env = TestEnv::new();
  let kernel = env.write_script("src/native", "echo 'not json'\nexit 7\n");
  env.install_local("native", &kernel);

  env
    .runkit_cmd()
    .args(["run", "demo.yaml"])
    .assert()
    .code(7)
    .stdout("not json\n");
}

#[cfg(unix)]
#[test]
fn run_invalid_json_argument_fails() {
  let env = TestEnv::new();
  let kernel = env.write_script("src/native", "exit 0\n");
  env.install_local("native", &kernel);

  env
    .runkit_cmd()
    .args(["run", "demo.yaml", "bad=json:{nope"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("not valid JSON"));
}

#[cfg(unix)]
#[test]
fn run_honors_timeout() {
  let env = TestEnv::new();
  let kernel = env.write_script("src/native", "exec sleep 10\n");
  env.install_local("native", &kernel);

  env
    .runkit_cmd()
    .env("RUNKIT_RUN_TIMEOUT", "1")
    .args(["run", "demo.yaml"])
    .assert()
    .code(1)
    .stderr(predicate::str::contains("did not finish"));
}
