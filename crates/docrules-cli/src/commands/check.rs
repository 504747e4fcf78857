use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::commands::load_store;
use crate::output::{print_json, print_rules, print_success};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckSummary<'a> {
    loaded_at: String,
    rules: Vec<RuleSummary<'a>>,
}

#[derive(Serialize)]
struct RuleSummary<'a> {
    id: &'a str,
    #[serde(rename = "match")]
    pattern: &'a str,
    operations: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

pub fn check(policy: &Path, format: OutputFormat) -> Result<()> {
    let store = load_store(policy)?;
    let rules = store.snapshot();

    match format {
        OutputFormat::Json => {
            let summary: Vec<_> = rules
                .rules()
                .iter()
                .map(|rule| RuleSummary {
                    id: &rule.id,
                    pattern: rule.pattern.as_str(),
                    operations: rule.operations().iter().map(|op| op.as_str()).collect(),
                    description: rule.description.as_deref(),
                })
                .collect();
            print_json(&CheckSummary {
                loaded_at: rules.loaded_at().to_string(),
                rules: summary,
            })?;
        }
        OutputFormat::Table => {
            print_rules(&rules);
            print_success(&format!(
                "{} is valid ({} rules, loaded {})",
                policy.display(),
                rules.len(),
                rules.loaded_at()
            ));
        }
    }
    Ok(())
}
