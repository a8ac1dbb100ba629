use crate::error::{PreviewError, PreviewResult};
use crate::permissions::SandboxPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Runtime URLs loaded by the component shims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CdnConfig {
    /// In-browser JSX/TypeScript transpiler
    pub babel: String,
    /// Global (non-module) build exposing `Vue`
    pub vue_global: String,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            babel: "https://unpkg.com/@babel/standalone@7/babel.min.js".to_string(),
            vue_global: "https://unpkg.com/vue@3/dist/vue.global.js".to_string(),
        }
    }
}

/// Capability grants for the two kinds of preview frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Single-file previews: stylesheet demo, script runner, component shims
    pub isolated: SandboxPolicy,
    /// Full-project HTML previews
    pub project: SandboxPolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            isolated: SandboxPolicy::isolated(),
            project: SandboxPolicy::project(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Conventional HTML entry point of a project
    pub entry_name: String,
    /// Bare import specifier -> ES module URL
    pub bare_modules: BTreeMap<String, String>,
    pub cdn: CdnConfig,
    pub policies: PolicyConfig,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        let bare_modules = [
            ("lodash", "https://esm.sh/lodash@4.17.21"),
            ("react", "https://esm.sh/react@18.3.1"),
            ("react-dom", "https://esm.sh/react-dom@18.3.1"),
            ("react-dom/client", "https://esm.sh/react-dom@18.3.1/client"),
            ("vue", "https://esm.sh/vue@3"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            entry_name: "index.html".to_string(),
            bare_modules,
            cdn: CdnConfig::default(),
            policies: PolicyConfig::default(),
        }
    }
}

impl PreviewConfig {
    /// Load a JSON config file; missing keys keep their defaults
    pub fn load(path: &Path) -> PreviewResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| PreviewError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> PreviewResult<()> {
        if self.entry_name.trim().is_empty() {
            return Err(PreviewError::ConfigError("entry_name is empty".to_string()));
        }
        if let Some((name, _)) = self.bare_modules.iter().find(|(_, url)| url.trim().is_empty()) {
            return Err(PreviewError::ConfigError(format!(
                "bare module '{}' has no URL",
                name
            )));
        }
        Ok(())
    }

    /// `<script type="importmap">` element for the bare-module table
    pub fn import_map_tag(&self) -> String {
        let map = serde_json::json!({ "imports": self.bare_modules });
        format!("<script type=\"importmap\">{}</script>", map)
    }
}
