use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use docrules_policy::{PolicyEvaluator, PolicyFileWatcher, PolicyStore, ReloadOutcome};
use tokio::sync::broadcast::error::RecvError;

use crate::cli::OutputFormat;
use crate::output::{print_error, print_info, print_json, print_report};
use crate::suite::{Suite, load_suite, run_suite};

fn run_once(evaluator: &PolicyEvaluator, suite: &Suite, format: OutputFormat) -> Result<()> {
    let report = run_suite(evaluator, suite);
    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => print_report(&report),
    }
    Ok(())
}

/// Run the suite, then again after every accepted reload, until Ctrl-C.
pub async fn watch(
    policy: &Path,
    suite: &Path,
    debounce: Duration,
    format: OutputFormat,
) -> Result<()> {
    let suite = load_suite(suite)?;
    let store = Arc::new(PolicyStore::new());
    let evaluator = PolicyEvaluator::new(store.clone());
    let watcher = PolicyFileWatcher::new(store, policy).with_debounce(debounce);

    watcher
        .reload_now()
        .with_context(|| format!("Policy {} is invalid", policy.display()))?;
    run_once(&evaluator, &suite, format)?;

    let mut outcomes = watcher.subscribe();
    let handle = watcher.start()?;
    print_info(&format!(
        "Watching {} (Ctrl-C to stop)",
        watcher.path().display()
    ));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            outcome = outcomes.recv() => match outcome {
                Ok(ReloadOutcome::Reloaded { version }) => {
                    print_info(&format!("Reloaded policy (version {version})"));
                    run_once(&evaluator, &suite, format)?;
                }
                Ok(ReloadOutcome::Rejected { error }) => {
                    print_error(&format!("Reload rejected, keeping previous rules: {error}"));
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.stop().await;
    let stats = watcher.stats();
    print_info(&format!(
        "Stopped after {} reloads ({} rejected)",
        stats.successes, stats.failures
    ));
    Ok(())
}
