//! `package.json` handling: installed packages and changes reported by the
//! simulated terminal.

use crate::error::{PreviewError, PreviewResult};
use crate::virtual_fs::VirtualFilesystem;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

pub const MANIFEST_NAME: &str = "package.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageAction {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageChange {
    pub action: PackageAction,
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// `dependencies` followed by `devDependencies`
pub fn parse_packages(content: &str) -> PreviewResult<Vec<Package>> {
    let manifest = parse_object(content)?;
    let mut packages = Vec::new();
    for section in ["dependencies", "devDependencies"] {
        if let Some(Value::Object(deps)) = manifest.get(section) {
            packages.extend(deps.iter().map(|(name, version)| Package {
                name: name.clone(),
                version: version.as_str().unwrap_or_default().to_string(),
            }));
        }
    }
    Ok(packages)
}

/// Packages of the first `package.json` in the tree. A missing or unreadable
/// manifest yields an empty list.
pub fn packages(tree: &VirtualFilesystem) -> Vec<Package> {
    let Some(file) = tree.find_by_name(MANIFEST_NAME) else {
        return Vec::new();
    };
    parse_packages(&file.content).unwrap_or_else(|e| {
        warn!("Ignoring {}: {}", MANIFEST_NAME, e);
        Vec::new()
    })
}

/// Rewrite manifest `content` with `changes` applied to `dependencies`
pub fn apply_changes(content: &str, changes: &[PackageChange]) -> PreviewResult<String> {
    let mut manifest = parse_object(content)?;
    let deps = manifest
        .entry("dependencies")
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(deps) = deps else {
        return Err(PreviewError::ManifestError(
            "\"dependencies\" is not an object".to_string(),
        ));
    };

    for change in changes {
        match change.action {
            PackageAction::Add => {
                deps.insert(change.name.clone(), Value::String(change.version.clone()));
            }
            PackageAction::Remove => {
                deps.shift_remove(&change.name);
            }
        }
    }
    Ok(serde_json::to_string_pretty(&Value::Object(manifest))?)
}

/// Apply `changes` to the tree's manifest. Without a manifest the tree is
/// returned unchanged.
pub fn apply_to_tree(
    tree: &VirtualFilesystem,
    changes: &[PackageChange],
) -> PreviewResult<VirtualFilesystem> {
    if changes.is_empty() {
        return Ok(tree.clone());
    }
    let Some(file) = tree.find_by_name(MANIFEST_NAME) else {
        warn!("No {} to record {} package change(s)", MANIFEST_NAME, changes.len());
        return Ok(tree.clone());
    };
    let updated = apply_changes(&file.content, changes)?;
    info!("Applied {} package change(s) to {}", changes.len(), MANIFEST_NAME);
    tree.try_update_content(&file.id, &updated)
}

/// `npm install` line for every declared package, `None` when there are none
pub fn install_command(content: &str) -> PreviewResult<Option<String>> {
    let names: Vec<String> = parse_packages(content)?.into_iter().map(|p| p.name).collect();
    if names.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!("npm install {}", names.join(" "))))
}

fn parse_object(content: &str) -> PreviewResult<Map<String, Value>> {
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(PreviewError::ManifestError(
            "manifest is not a JSON object".to_string(),
        )),
        Err(e) => Err(PreviewError::ManifestError(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::virtual_fs::{FileNode, FolderNode};

    const MANIFEST: &str = r#"{
  "name": "demo",
  "dependencies": { "lodash": "^4.17.21" },
  "devDependencies": { "vitest": "^1.0.0" }
}"#;

    #[test]
    fn lists_runtime_then_dev_packages() {
        let packages = parse_packages(MANIFEST).unwrap();
        assert_eq!(
            packages,
            vec![
                Package { name: "lodash".into(), version: "^4.17.21".into() },
                Package { name: "vitest".into(), version: "^1.0.0".into() },
            ]
        );
    }

    #[test]
    fn changes_preserve_key_order() {
        let out = apply_changes(
            MANIFEST,
            &[
                PackageChange { action: PackageAction::Add, name: "dayjs".into(), version: "1.11.10".into() },
                PackageChange { action: PackageAction::Remove, name: "lodash".into(), version: String::new() },
            ],
        )
        .unwrap();
        assert!(out.starts_with("{\n  \"name\": \"demo\",\n  \"dependencies\": {\n    \"dayjs\": \"1.11.10\"\n  }"));
        assert!(!out.contains("lodash"));
    }

    #[test]
    fn missing_dependencies_section_is_created() {
        let out = apply_changes(
            "{}",
            &[PackageChange { action: PackageAction::Add, name: "a".into(), version: "1".into() }],
        )
        .unwrap();
        assert_eq!(parse_packages(&out).unwrap().len(), 1);
    }

    #[test]
    fn malformed_manifest_is_an_error_but_listing_tolerates_it() {
        assert!(matches!(parse_packages("{oops"), Err(PreviewError::ManifestError(_))));
        assert!(apply_changes("[]", &[]).is_err());
        let tree = VirtualFilesystem::from_nodes(vec![FileNode::new(MANIFEST_NAME, "{oops").into()]);
        assert!(packages(&tree).is_empty());
    }

    #[test]
    fn tree_manifest_is_rewritten_in_place() {
        let tree = VirtualFilesystem::from_nodes(vec![FolderNode::new("My Project")
            .with_children(vec![FileNode::new(MANIFEST_NAME, MANIFEST).into()])
            .into()]);
        let next = apply_to_tree(
            &tree,
            &[PackageChange { action: PackageAction::Add, name: "axios".into(), version: "1.6.0".into() }],
        )
        .unwrap();
        assert!(packages(&next).iter().any(|p| p.name == "axios"));
        assert!(apply_to_tree(&VirtualFilesystem::new(), &[]).unwrap().is_empty());
    }

    #[test]
    fn install_command_lists_everything() {
        assert_eq!(
            install_command(MANIFEST).unwrap().as_deref(),
            Some("npm install lodash vitest")
        );
        assert_eq!(install_command("{}").unwrap(), None);
    }
}
