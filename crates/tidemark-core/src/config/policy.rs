use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What a run does when a step's own action fails.
///
/// Transaction and commit failures always stop the run; this only governs
/// failures reported by the step itself or by the ledger write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failing step and return its error.
    Abort,
    /// Log the failure, discard that step's transaction and move on.
    Continue,
}

/// Failure handling for forward and reverse runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Policy for `migrate_all`.
    #[serde(default = "default_forward")]
    pub forward: FailurePolicy,

    /// Policy for `rollback_all`.
    #[serde(default = "default_reverse")]
    pub reverse: FailurePolicy,

    /// Skip up-steps whose name already has a ledger row.
    #[serde(default)]
    pub skip_applied: bool,

    /// Deadline for a single step's action, in milliseconds.
    #[serde(default)]
    pub step_timeout_ms: Option<u64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            forward: default_forward(),
            reverse: default_reverse(),
            skip_applied: false,
            step_timeout_ms: None,
        }
    }
}

impl PolicyConfig {
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_ms.map(Duration::from_millis)
    }
}

fn default_forward() -> FailurePolicy {
    FailurePolicy::Abort
}

fn default_reverse() -> FailurePolicy {
    FailurePolicy::Continue
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_asymmetric() {
        let policy = PolicyConfig::default();
        assert_eq!(policy.forward, FailurePolicy::Abort);
        assert_eq!(policy.reverse, FailurePolicy::Continue);
        assert!(!policy.skip_applied);
        assert!(policy.step_timeout().is_none());
    }

    #[test]
    fn test_parse_policy() {
        let toml = r#"
            forward = "continue"
            reverse = "abort"
            step_timeout_ms = 1500
        "#;

        let policy: PolicyConfig = toml::from_str(toml).unwrap();
        assert_eq!(policy.forward, FailurePolicy::Continue);
        assert_eq!(policy.reverse, FailurePolicy::Abort);
        assert_eq!(policy.step_timeout(), Some(Duration::from_millis(1500)));
    }
}
