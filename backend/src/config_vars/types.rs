//! Config var data types

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Config var name to value
pub type ConfigMap = BTreeMap<String, String>;

/// Requested changes: `Some(value)` sets a var, `None` deletes it
pub type DesiredChanges = BTreeMap<String, Option<String>>;

static VALID_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("config var key pattern is valid"));

/// Whether `key` is an acceptable config var name
pub fn is_valid_key(key: &str) -> bool {
    VALID_KEY.is_match(key)
}

/// Kind of change applied to a single var
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// Var did not exist
    Create,
    /// Var existed and was overwritten
    Update,
    /// Var was removed
    Delete,
}

/// One applied change, as reported to callers and in notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigChange {
    /// Kind of change
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    /// Var name
    pub name: String,
}

/// Mutation sent to the platform for one var
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigMutation {
    /// Add a new var with this value
    Create(String),
    /// Overwrite an existing var
    Update(String),
    /// Remove the var
    Delete,
}

impl ConfigMutation {
    /// Classify a desired value against the current user state
    pub fn classify(current: &ConfigMap, key: &str, desired: Option<String>) -> Self {
        match desired {
            None => ConfigMutation::Delete,
            Some(value) if current.contains_key(key) => ConfigMutation::Update(value),
            Some(value) => ConfigMutation::Create(value),
        }
    }

    /// Change kind reported for this mutation
    pub fn change_type(&self) -> ChangeType {
        match self {
            ConfigMutation::Create(_) => ChangeType::Create,
            ConfigMutation::Update(_) => ChangeType::Update,
            ConfigMutation::Delete => ChangeType::Delete,
        }
    }
}

/// Result of a successful reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Applied changes, in key order
    pub changes: Vec<ConfigChange>,
    /// Merged user and service state, redacted for compliance apps
    pub config_vars: ConfigMap,
}
