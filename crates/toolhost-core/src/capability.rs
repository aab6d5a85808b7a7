use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use toolhost_plugin_sdk::CapabilitySet;

/// Host-side capability policy. Enforcement is declarative only.
///
/// With an allow-list configured, every declared capability must appear in it.
/// The deny-list is applied afterwards and wins over the allow-list.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CapabilityPolicy {
    pub allow: Option<BTreeSet<String>>,
    pub deny: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyMode {
    AllowList,
    DenyList,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("plugin '{plugin_id}' requests capability '{capability}' which is not permitted ({mode:?})")]
pub struct CapabilityViolation {
    pub plugin_id: String,
    pub capability: String,
    pub mode: PolicyMode,
}

impl CapabilityPolicy {
    pub fn allow_list<I, S>(caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow: Some(caps.into_iter().map(Into::into).collect()),
            deny: BTreeSet::new(),
        }
    }

    pub fn deny_list<I, S>(caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allow: None,
            deny: caps.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_permissive(&self) -> bool {
        self.allow.is_none() && self.deny.is_empty()
    }

    /// Which list, if any, forbids `capability`.
    pub fn check(&self, capability: &str) -> Option<PolicyMode> {
        if let Some(allow) = &self.allow {
            if !allow.contains(capability) {
                return Some(PolicyMode::AllowList);
            }
        }
        self.deny
            .contains(capability)
            .then_some(PolicyMode::DenyList)
    }
}

/// Fails on the first declared capability the policy does not permit.
pub fn enforce(
    policy: &CapabilityPolicy,
    plugin_id: &str,
    declared: &CapabilitySet,
) -> Result<(), CapabilityViolation> {
    for capability in declared.iter() {
        if let Some(mode) = policy.check(capability) {
            return Err(CapabilityViolation {
                plugin_id: plugin_id.to_string(),
                capability: capability.to_string(),
                mode,
            });
        }
    }
    Ok(())
}
