//! The active rule set, swappable at runtime.
//!
//! Readers take an `Arc<RuleSet>` snapshot per evaluation with a single atomic
//! load and never block. A reload compiles the new definition completely
//! before publishing it, so readers see either the old set or the new one and
//! a failed reload changes nothing.
//!
//! # Usage
//!
//! ```ignore
//! use docrules_policy::{PolicyStore, PolicyDefinition};
//!
//! let store = PolicyStore::new();
//! store.load_policy(&PolicyDefinition::from_json_str(&json)?)?;
//!
//! let rules = store.snapshot();
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use tracing::{info, warn};

use crate::definition::PolicyDefinition;
use crate::error::ConfigError;
use crate::rule_set::RuleSet;

/// Holder of the active [`RuleSet`].
#[derive(Debug)]
pub struct PolicyStore {
    /// Active set (lock-free reads).
    current: ArcSwap<RuleSet>,
    /// Number of successful loads.
    version: AtomicU64,
    /// Serializes loads so versions are published in order.
    load_lock: Mutex<()>,
}

impl PolicyStore {
    /// A store with no rules. Every request is denied until a policy is loaded.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RuleSet::empty()),
            version: AtomicU64::new(0),
            load_lock: Mutex::new(()),
        }
    }

    /// A store with `definition` already loaded.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] that rejected the definition.
    pub fn from_definition(definition: &PolicyDefinition) -> Result<Self, ConfigError> {
        let store = Self::new();
        store.load_policy(definition)?;
        Ok(store)
    }

    /// Replace the active rule set with `definition`.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] that rejected the definition. The previously
    /// active rule set stays in effect.
    pub fn load_policy(&self, definition: &PolicyDefinition) -> Result<(), ConfigError> {
        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let next_version = self.version.load(Ordering::Acquire) + 1;
        let rule_set = match RuleSet::compile(definition, next_version) {
            Ok(rule_set) => rule_set,
            Err(e) => {
                warn!(
                    error = %e,
                    active_version = next_version - 1,
                    "Rejected policy definition, keeping active rules"
                );
                return Err(e);
            }
        };

        let rule_count = rule_set.len();
        self.current.store(Arc::new(rule_set));
        self.version.store(next_version, Ordering::Release);

        info!(
            version = next_version,
            rules = rule_count,
            "Policy rules loaded"
        );
        Ok(())
    }

    /// The rule set to evaluate one request against.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.current.load_full()
    }

    /// Number of successful loads so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}

impl Default for PolicyStore {
    fn default() -> Self {
        Self::new()
    }
}
