//! Scenario suites: named write requests with an expected outcome.
//!
//! ```json
//! {
//!   "cases": [
//!     {
//!       "name": "owner creates profile",
//!       "auth": { "uid": "alice" },
//!       "request": {
//!         "operation": "create",
//!         "path": "users/alice",
//!         "newDocument": { "hello": 1 }
//!       },
//!       "expect": "allow"
//!     }
//!   ]
//! }
//! ```
//!
//! Every case is evaluated on its own; nothing carries over between cases.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use docrules_core::{AuthContext, WriteRequest};
use docrules_policy::{Decision, PolicyEvaluator};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expectation {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Case {
    pub name: String,
    /// Absent or `null` means unauthenticated.
    #[serde(default)]
    pub auth: AuthContext,
    pub request: WriteRequest,
    pub expect: Expectation,
    /// Expected deny code, checked only when set.
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Suite {
    pub cases: Vec<Case>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    pub name: String,
    pub expected: Expectation,
    pub decision: Decision,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteReport {
    pub policy_version: u64,
    pub results: Vec<CaseResult>,
}

impl SuiteReport {
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    pub fn passed(&self) -> usize {
        self.results.len() - self.failed()
    }
}

pub fn load_suite(path: &Path) -> Result<Suite> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Cannot read suite {}", path.display()))?;

    let suite: Suite = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Invalid suite {}", path.display()))?,
        Some("toml") => {
            toml::from_str(&content).with_context(|| format!("Invalid suite {}", path.display()))?
        }
        _ => bail!("Unsupported suite format: {} (expected .json or .toml)", path.display()),
    };
    Ok(suite)
}

fn matches(case: &Case, decision: &Decision) -> bool {
    match (case.expect, decision) {
        (Expectation::Allow, Decision::Allow) => true,
        (Expectation::Deny, Decision::Deny(reason)) => {
            case.code.as_deref().is_none_or(|code| code == reason.code())
        }
        _ => false,
    }
}

pub fn run_suite(evaluator: &PolicyEvaluator, suite: &Suite) -> SuiteReport {
    let results = suite
        .cases
        .iter()
        .map(|case| {
            let decision = evaluator.evaluate(&case.request, &case.auth);
            CaseResult {
                name: case.name.clone(),
                expected: case.expect,
                passed: matches(case, &decision),
                decision,
            }
        })
        .collect();

    SuiteReport {
        policy_version: evaluator.store().version(),
        results,
    }
}
