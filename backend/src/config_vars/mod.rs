//! Config var management
//!
//! Validation, reconciliation against the platform, compliance redaction and
//! the ordered notify/redeploy follow-up.

pub mod effects;
pub mod reconcile;
pub mod redact;
pub mod types;

pub use effects::{finish as finish_side_effects, SideEffect, SideEffectQueue};
pub use reconcile::{ConfigReconciler, CONFIG_CHANGE_EVENT, REDEPLOY_REASON};
pub use redact::{Redactor, ALWAYS_REDACTED, REDACTED};
pub use types::{
    is_valid_key, ChangeType, ConfigChange, ConfigMap, ConfigMutation, DesiredChanges,
    Reconciliation,
};
