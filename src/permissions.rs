use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A capability the preview frame may be granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    /// Run scripts
    Scripts,
    /// alert/confirm/prompt
    Modals,
    /// Submit forms
    Forms,
    /// Open new windows
    Popups,
    /// Share the host origin (storage, cookies)
    SameOrigin,
}

impl Capability {
    /// Token used in the frame's `sandbox` attribute
    pub fn token(&self) -> &'static str {
        match self {
            Capability::Scripts => "allow-scripts",
            Capability::Modals => "allow-modals",
            Capability::Forms => "allow-forms",
            Capability::Popups => "allow-popups",
            Capability::SameOrigin => "allow-same-origin",
        }
    }
}

/// Isolation level of a preview frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationLevel {
    /// No capabilities at all
    #[default]
    Locked,
    /// Scripts run, but the host origin stays out of reach
    Isolated,
    /// Shares the host origin
    Relaxed,
}

/// Capability grant for a preview frame
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SandboxPolicy {
    pub name: String,
    granted: BTreeSet<Capability>,
}

impl SandboxPolicy {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            granted: BTreeSet::new(),
        }
    }

    /// Grant for single-file previews
    pub fn isolated() -> Self {
        Self::new("isolated")
            .grant(Capability::Scripts)
            .grant(Capability::Modals)
    }

    /// Grant for full-project HTML previews. Shares the host origin so richer
    /// demos (storage, forms, popups) work; this boundary is looser.
    pub fn project() -> Self {
        Self::new("project")
            .grant(Capability::Scripts)
            .grant(Capability::Modals)
            .grant(Capability::Forms)
            .grant(Capability::Popups)
            .grant(Capability::SameOrigin)
    }

    pub fn grant(mut self, capability: Capability) -> Self {
        self.granted.insert(capability);
        self
    }

    pub fn revoke(mut self, capability: Capability) -> Self {
        self.granted.remove(&capability);
        self
    }

    pub fn allows(&self, capability: Capability) -> bool {
        self.granted.contains(&capability)
    }

    pub fn level(&self) -> IsolationLevel {
        if self.allows(Capability::SameOrigin) {
            IsolationLevel::Relaxed
        } else if self.granted.is_empty() {
            IsolationLevel::Locked
        } else {
            IsolationLevel::Isolated
        }
    }

    /// Value of the frame's `sandbox` attribute. Empty means fully locked.
    pub fn attribute(&self) -> String {
        self.granted
            .iter()
            .map(Capability::token)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for SandboxPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.attribute())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolated_grant_keeps_host_origin_out() {
        let policy = SandboxPolicy::isolated();
        assert_eq!(policy.attribute(), "allow-scripts allow-modals");
        assert!(!policy.allows(Capability::SameOrigin));
        assert_eq!(policy.level(), IsolationLevel::Isolated);
    }

    #[test]
    fn project_grant_is_relaxed() {
        let policy = SandboxPolicy::project();
        assert!(policy.allows(Capability::SameOrigin));
        assert_eq!(policy.level(), IsolationLevel::Relaxed);
        assert!(policy.attribute().ends_with("allow-same-origin"));
    }

    #[test]
    fn revoking_everything_locks_the_frame() {
        let policy = SandboxPolicy::isolated()
            .revoke(Capability::Scripts)
            .revoke(Capability::Modals);
        assert_eq!(policy.attribute(), "");
        assert_eq!(policy.level(), IsolationLevel::Locked);
        assert_eq!(IsolationLevel::default(), IsolationLevel::Locked);
    }

    #[test]
    fn policy_round_trips_through_json() {
        let json = serde_json::to_string(&SandboxPolicy::isolated()).unwrap();
        assert!(json.contains("\"scripts\""));
        let back: SandboxPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SandboxPolicy::isolated());
    }
}
