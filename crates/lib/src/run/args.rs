//! Translating `runkit run` arguments into a kernel command line.
//!
//! ```text
//! demo.yaml text={"success":true} --output out/
//!   => --compose demo.yaml --output out/ --args {"text":{"success":true}}
//! ```

use serde_json::{Map, Value};

use super::RunError;

/// Flags whose following token is their value.
pub const VALUE_FLAGS: &[&str] = &[
  "--compose",
  "-c",
  "--args",
  "--args-json",
  "--output",
  "-o",
  "--workdir",
  "-w",
  "--log-level",
  "--timeout",
  "--env",
  "-e",
  "--profile",
];

const COMPOSE_FLAGS: &[&str] = &["--compose", "-c"];

/// Prefix forcing a value to be parsed as JSON.
const JSON_PREFIX: &str = "json:";

fn names_compose(arg: &str) -> bool {
  COMPOSE_FLAGS.contains(&arg) || arg.starts_with("--compose=")
}

/// Translate user arguments for a kernel taking inline arguments under `args_flag`.
pub fn translate_args(args: &[String], args_flag: &str) -> Result<Vec<String>, RunError> {
  let mut compose_set = args.iter().any(|a| names_compose(a));
  let mut out = Vec::with_capacity(args.len() + 2);
  let mut inline = Map::new();

  let mut iter = args.iter();
  while let Some(arg) = iter.next() {
    if arg == "--" {
      continue;
    }

    if arg.starts_with('-') && arg.len() > 1 {
      out.push(arg.clone());
      if VALUE_FLAGS.contains(&arg.as_str())
        && let Some(value) = iter.next()
      {
        out.push(value.clone());
      }
      continue;
    }

    if !compose_set {
      out.push("--compose".to_string());
      out.push(arg.clone());
      compose_set = true;
      continue;
    }

    match arg.split_once('=') {
      Some((key, raw)) if !key.is_empty() => {
        inline.insert(key.to_string(), parse_value(key, raw)?);
      }
      _ => out.push(arg.clone()),
    }
  }

  if !inline.is_empty() {
    out.push(args_flag.to_string());
    out.push(Value::Object(inline).to_string());
  }

  Ok(out)
}

/// `json:` forces JSON; otherwise non-string JSON is taken as-is and
/// everything else stays a string.
fn parse_value(key: &str, raw: &str) -> Result<Value, RunError> {
  if let Some(json) = raw.strip_prefix(JSON_PREFIX) {
    return serde_json::from_str(json)
      .map_err(|e| RunError::InvalidArgument(format!("value of '{}' is not valid JSON: {}", key, e)));
  }

  match serde_json::from_str::<Value>(raw) {
    Ok(value) if !value.is_string() => Ok(value),
    _ => Ok(Value::String(raw.to_string())),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::kernel::{ARGS_FLAG, SCRIPT_ARGS_FLAG};

  fn args(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(|s| s.to_string()).collect()
  }

  fn translate(tokens: &[&str]) -> Vec<String> {
    translate_args(&args(tokens), ARGS_FLAG).unwrap()
  }

  #[test]
  fn inline_json_object_value() {
    assert_eq!(
      translate(&["demo.yaml", r#"text={"success":true}"#]),
      args(&["--compose", "demo.yaml", "--args", r#"{"text":{"success":true}}"#])
    );
  }

  #[test]
  fn script_kernels_use_args_json() {
    let out = translate_args(&args(&["demo.yaml", "n=3"]), SCRIPT_ARGS_FLAG).unwrap();
    assert_eq!(out, args(&["--compose", "demo.yaml", "--args-json", r#"{"n":3}"#]));
  }

  #[test]
  fn values_keep_insertion_order_and_types() {
    let out = translate(&["c.yaml", "z=1", "a=true", "m=null", "s=hello", "q=\"quoted\"", "l=[1,2]"]);
    assert_eq!(
      out.last().unwrap(),
      r#"{"z":1,"a":true,"m":null,"s":"hello","q":"\"quoted\"","l":[1,2]}"#
    );
  }

  #[test]
  fn json_prefix_forces_parsing() {
    let out = translate(&["c.yaml", r#"name=json:"text""#]);
    assert_eq!(out.last().unwrap(), r#"{"name":"text"}"#);

    let err = translate_args(&args(&["c.yaml", "bad=json:{nope"]), ARGS_FLAG).unwrap_err();
    assert!(matches!(err, RunError::InvalidArgument(_)));
  }

  #[test]
  fn explicit_compose_flag_is_respected() {
    assert_eq!(
      translate(&["-c", "demo.yaml", "extra", "k=v"]),
      args(&["-c", "demo.yaml", "extra", "--args", r#"{"k":"v"}"#])
    );
    assert_eq!(
      translate(&["--compose=demo.yaml", "positional"]),
      args(&["--compose=demo.yaml", "positional"])
    );
  }

  #[test]
  fn value_flags_keep_their_values() {
    assert_eq!(
      translate(&["--output", "out=dir", "demo.yaml", "--log-level", "debug", "--verbose"]),
      args(&["--output", "out=dir", "--compose", "demo.yaml", "--log-level", "debug", "--verbose"])
    );
  }

  #[test]
  fn separator_is_dropped_and_no_inline_flag_without_pairs() {
    assert_eq!(translate(&["--", "demo.yaml"]), args(&["--compose", "demo.yaml"]));
    assert!(translate(&[]).is_empty());
  }
}
