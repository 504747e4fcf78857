use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use docrules_core::{AuthContext, WriteRequest};
use docrules_policy::PolicyEvaluator;

use crate::cli::OutputFormat;
use crate::commands::load_store;
use crate::output::{print_evaluation, print_json};

/// Exit status when the request is denied.
pub const DENY_EXIT_CODE: i32 = 2;

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Cannot read {what} {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid {what} {}", path.display()))
}

/// Evaluate one request. Returns the process exit status.
pub fn eval(
    policy: &Path,
    request: &Path,
    auth: Option<&Path>,
    format: OutputFormat,
) -> Result<i32> {
    let store = load_store(policy)?;
    let request: WriteRequest = read_json(request, "request")?;
    let auth = match auth {
        Some(path) => read_json(path, "auth context")?,
        None => AuthContext::unauthenticated(),
    };

    let result = PolicyEvaluator::new(store).evaluate_with_audit(&request, &auth);

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => print_evaluation(&result),
    }

    Ok(if result.decision.is_allowed() {
        0
    } else {
        DENY_EXIT_CODE
    })
}
