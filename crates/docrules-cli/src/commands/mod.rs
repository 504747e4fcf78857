pub mod check;
pub mod eval;
pub mod watch;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use docrules_policy::{PolicyStore, load_definition_file};
use tracing::debug;

/// Load and validate a policy file into a fresh store.
pub fn load_store(policy: &Path) -> Result<Arc<PolicyStore>> {
    let definition = load_definition_file(policy)?;
    let store = PolicyStore::from_definition(&definition)
        .with_context(|| format!("Policy {} is invalid", policy.display()))?;
    debug!(
        path = %policy.display(),
        rules = store.snapshot().len(),
        "Loaded policy definition"
    );
    Ok(Arc::new(store))
}
