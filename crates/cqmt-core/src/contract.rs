//! CQ contracts and the pure validator that turns a result summary into a
//! verdict.

use std::{fmt, num::NonZeroU64};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─── Contract ────────────────────────────────────────────────────────────────

/// Expected shape of a competency question's results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contract {
  /// Columns that must appear in the result, in declaration order.
  pub require_columns: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub min_rows:        Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_latency_ms:  Option<NonZeroU64>,
}

#[derive(Debug, Error)]
pub enum ContractError {
  #[error("malformed contract: {0}")]
  Malformed(#[from] serde_json::Error),

  #[error("malformed contract: empty column name in require_columns")]
  EmptyColumn,
}

impl Contract {
  /// Parse and check a contract supplied as loose JSON.
  ///
  /// Rejects missing `require_columns`, wrong types, negative `min_rows`,
  /// a zero `max_latency_ms`, and blank column names. Repeated column names
  /// are collapsed to their first occurrence.
  pub fn from_value(value: serde_json::Value) -> Result<Self, ContractError> {
    let mut contract: Contract = serde_json::from_value(value)?;
    if contract.require_columns.iter().any(|c| c.trim().is_empty()) {
      return Err(ContractError::EmptyColumn);
    }
    let mut seen = std::collections::HashSet::new();
    contract.require_columns.retain(|c| seen.insert(c.clone()));
    Ok(contract)
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// What the validator needs to know about an executed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSummary {
  pub columns:    Vec<String>,
  pub row_count:  u64,
  pub latency_ms: u64,
}

/// Why a result failed its contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractViolation {
  MissingRequiredColumns(Vec<String>),
  MinRowsNotMet { expected: u64, got: u64 },
  LatencyBudgetExceeded { expected: u64, got: u64 },
}

impl fmt::Display for ContractViolation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::MissingRequiredColumns(cols) => {
        write!(f, "missing_required_columns: {}", cols.join(", "))
      }
      Self::MinRowsNotMet { expected, got } => {
        write!(f, "min_rows_not_met: expected {expected}, got {got}")
      }
      Self::LatencyBudgetExceeded { expected, got } => {
        write!(f, "latency_budget_exceeded: expected<={expected}ms, got {got}ms")
      }
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
  Pass,
  Fail(ContractViolation),
}

impl Verdict {
  pub fn passed(&self) -> bool { matches!(self, Self::Pass) }

  /// Machine-readable reason code persisted with a run.
  pub fn reason(&self) -> String { self.to_string() }
}

impl fmt::Display for Verdict {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Pass => f.write_str("pass"),
      Self::Fail(violation) => violation.fmt(f),
    }
  }
}

/// Check `result` against `contract`: required columns, then row floor,
/// then latency ceiling. The first failing check wins.
pub fn validate(result: &ResultSummary, contract: &Contract) -> Verdict {
  let missing: Vec<String> = contract
    .require_columns
    .iter()
    .filter(|col| !result.columns.contains(col))
    .cloned()
    .collect();
  if !missing.is_empty() {
    return Verdict::Fail(ContractViolation::MissingRequiredColumns(missing));
  }

  if let Some(min) = contract.min_rows
    && result.row_count < min
  {
    return Verdict::Fail(ContractViolation::MinRowsNotMet {
      expected: min,
      got:      result.row_count,
    });
  }

  if let Some(max) = contract.max_latency_ms
    && result.latency_ms > max.get()
  {
    return Verdict::Fail(ContractViolation::LatencyBudgetExceeded {
      expected: max.get(),
      got:      result.latency_ms,
    });
  }

  Verdict::Pass
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn contract(cols: &[&str], min_rows: Option<u64>, max_ms: Option<u64>) -> Contract {
    Contract {
      require_columns: cols.iter().map(|c| (*c).to_owned()).collect(),
      min_rows,
      max_latency_ms: max_ms.and_then(NonZeroU64::new),
    }
  }

  fn summary(cols: &[&str], rows: u64, ms: u64) -> ResultSummary {
    ResultSummary {
      columns:    cols.iter().map(|c| (*c).to_owned()).collect(),
      row_count:  rows,
      latency_ms: ms,
    }
  }

  #[test]
  fn passes_when_everything_holds() {
    let verdict = validate(
      &summary(&["aircraft", "label"], 3, 20),
      &contract(&["aircraft", "label"], Some(1), Some(100)),
    );
    assert_eq!(verdict, Verdict::Pass);
    assert_eq!(verdict.reason(), "pass");
  }

  #[test]
  fn missing_columns_reported_in_order() {
    let verdict = validate(
      &summary(&["aircraft"], 5, 1),
      &contract(&["aircraft", "label"], Some(1), None),
    );
    assert!(!verdict.passed());
    assert_eq!(verdict.reason(), "missing_required_columns: label");

    let verdict = validate(&summary(&[], 5, 1), &contract(&["b", "a"], None, None));
    assert_eq!(verdict.reason(), "missing_required_columns: b, a");
  }

  #[test]
  fn row_floor() {
    let verdict = validate(
      &summary(&["aircraft", "label"], 0, 1),
      &contract(&["aircraft", "label"], Some(1), None),
    );
    assert_eq!(verdict.reason(), "min_rows_not_met: expected 1, got 0");
  }

  #[test]
  fn latency_ceiling() {
    let verdict = validate(&summary(&["a"], 1, 731), &contract(&["a"], None, Some(500)));
    assert_eq!(
      verdict.reason(),
      "latency_budget_exceeded: expected<=500ms, got 731ms"
    );
    let verdict = validate(&summary(&["a"], 1, 500), &contract(&["a"], None, Some(500)));
    assert!(verdict.passed());
  }

  #[test]
  fn checks_short_circuit_in_order() {
    let verdict = validate(&summary(&[], 0, 10_000), &contract(&["a"], Some(1), Some(1)));
    assert!(verdict.reason().starts_with("missing_required_columns"));
    let verdict = validate(&summary(&["a"], 0, 10_000), &contract(&["a"], Some(1), Some(1)));
    assert!(verdict.reason().starts_with("min_rows_not_met"));
  }

  #[test]
  fn validation_is_deterministic() {
    let s = summary(&["x"], 2, 40);
    let c = contract(&["x", "y"], Some(3), Some(10));
    assert_eq!(validate(&s, &c), validate(&s, &c));
  }

  #[test]
  fn parses_well_formed_contracts() {
    let c = Contract::from_value(json!({
      "require_columns": ["a", "b", "a"],
      "min_rows": 1,
      "max_latency_ms": 250
    }))
    .unwrap();
    assert_eq!(c.require_columns, vec!["a", "b"]);
    assert_eq!(c.min_rows, Some(1));
    assert_eq!(c.max_latency_ms.map(NonZeroU64::get), Some(250));

    let c = Contract::from_value(json!({ "require_columns": [] })).unwrap();
    assert_eq!(c.min_rows, None);
  }

  #[test]
  fn rejects_malformed_contracts() {
    for bad in [
      json!({}),
      json!({ "require_columns": "a" }),
      json!({ "require_columns": [1, 2] }),
      json!({ "require_columns": ["a"], "min_rows": -1 }),
      json!({ "require_columns": ["a"], "min_rows": "3" }),
      json!({ "require_columns": ["a"], "max_latency_ms": 0 }),
      json!({ "require_columns": [""] }),
      json!("not an object"),
    ] {
      assert!(Contract::from_value(bad.clone()).is_err(), "{bad}");
    }
  }
}
