//! Separating a kernel's JSON result from the rest of its stdout.
//!
//! Kernels print log lines and a single JSON result object to stdout. The
//! result is the longest-reaching object in the output: for every `{` a
//! parse is attempted, the success ending furthest wins, and among equal
//! ends the earliest start wins (the enclosing object, not a nested one).

use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
  Json {
    value: Value,
    /// Output outside the object, for stderr.
    residue: Vec<u8>,
  },
  /// No JSON object found; passed through untouched.
  Raw(Vec<u8>),
}

impl Projection {
  /// Bytes destined for stdout.
  pub fn stdout(&self) -> Vec<u8> {
    match self {
      Self::Json { value, .. } => {
        let mut pretty = serde_json::to_vec_pretty(value).unwrap_or_default();
        pretty.push(b'\n');
        pretty
      }
      Self::Raw(raw) => raw.clone(),
    }
  }

  /// Bytes destined for stderr.
  pub fn stderr(&self) -> &[u8] {
    match self {
      Self::Json { residue, .. } => residue,
      Self::Raw(_) => &[],
    }
  }
}

/// Byte span `[start, end)` of the result object in `raw`, if any.
pub fn find_result_span(raw: &[u8]) -> Option<(usize, usize, Value)> {
  let mut best: Option<(usize, usize, Value)> = None;

  for start in raw.iter().enumerate().filter(|(_, b)| **b == b'{').map(|(i, _)| i) {
    let mut stream = serde_json::Deserializer::from_slice(&raw[start..]).into_iter::<Value>();
    let Some(Ok(value)) = stream.next() else {
      continue;
    };
    if !value.is_object() {
      continue;
    }

    let end = start + stream.byte_offset();
    if best.as_ref().is_none_or(|(_, e, _)| end > *e) {
      best = Some((start, end, value));
    }
  }

  best
}

/// Split `raw` kernel output into the result object and everything else.
pub fn project_output(raw: &[u8]) -> Projection {
  let Some((start, end, value)) = find_result_span(raw) else {
    return Projection::Raw(raw.to_vec());
  };

  let after = &raw[end..];
  let after = after
    .strip_prefix(b"\r\n")
    .or_else(|| after.strip_prefix(b"\n"))
    .unwrap_or(after);

  let mut residue = Vec::with_capacity(start + after.len());
  residue.extend_from_slice(&raw[..start]);
  residue.extend_from_slice(after);

  Projection::Json { value, residue }
}
