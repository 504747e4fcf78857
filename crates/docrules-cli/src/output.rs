use anyhow::Result;
use colored::Colorize;
use docrules_policy::{Decision, EvaluationResult, RuleSet};
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::suite::{Expectation, SuiteReport};

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", "•".cyan(), msg);
}

pub fn print_rules(rules: &RuleSet) {
    if rules.is_empty() {
        println!("No rules defined.");
        return;
    }

    let mut builder = Builder::default();
    builder.push_record(["ID", "Match", "Operations", "Description"]);
    for rule in rules.rules() {
        let operations = rule
            .operations()
            .iter()
            .map(|op| op.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        builder.push_record([
            rule.id.as_str(),
            rule.pattern.as_str(),
            operations.as_str(),
            rule.description.as_deref().unwrap_or("-"),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}

pub fn print_evaluation(result: &EvaluationResult) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    builder.push_record(["Rule", result.rule_id.as_deref().unwrap_or("-")]);

    let bindings = result
        .bindings
        .as_ref()
        .map(|b| {
            b.iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default();
    builder.push_record(["Bindings", bindings.as_str()]);
    builder.push_record(["Affected keys", result.affected_keys.join(", ").as_str()]);
    builder.push_record(["Policy version", result.policy_version.to_string().as_str()]);

    if let Decision::Deny(reason) = &result.decision {
        builder.push_record(["Code", reason.code()]);
        builder.push_record(["Reason", reason.message.as_str()]);
        if let Some(violation) = &reason.violation {
            builder.push_record(["Failed check", violation.predicate.as_str()]);
        }
    }
    println!("{}", builder.build().with(Style::rounded()));

    match &result.decision {
        Decision::Allow => print_success("ALLOW"),
        Decision::Deny(_) => println!("{} {}", "✗".red(), "DENY".red().bold()),
    }
}

pub fn print_report(report: &SuiteReport) {
    for result in &report.results {
        let expected = match result.expected {
            Expectation::Allow => "allow",
            Expectation::Deny => "deny",
        };
        if result.passed {
            println!("{} {}", "✓".green(), result.name);
        } else {
            println!(
                "{} {} (expected {expected}, got {})",
                "✗".red(),
                result.name.bold(),
                result.decision
            );
        }
    }

    let summary = format!(
        "{} passed, {} failed (policy version {})",
        report.passed(),
        report.failed(),
        report.policy_version
    );
    if report.failed() == 0 {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.red());
    }
}
