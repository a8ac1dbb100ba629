use crate::virtual_fs::{Dialect, FileNode, FileOrigin, VirtualFilesystem};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution harness for the active file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShimKind {
    /// Project HTML with inlined references and an import map
    PlainHtml,
    /// Stylesheet applied to a fixed demo page
    PlainCss,
    /// Script run under a console-capturing page
    PlainScript,
    /// JSX component transpiled in the page and mounted into a root element
    ComponentFrameworkA,
    /// Options-object component mounted with the global runtime build
    ComponentFrameworkB,
}

impl fmt::Display for ShimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShimKind::PlainHtml => "plain-html",
            ShimKind::PlainCss => "plain-css",
            ShimKind::PlainScript => "plain-script",
            ShimKind::ComponentFrameworkA => "component-framework-a",
            ShimKind::ComponentFrameworkB => "component-framework-b",
        };
        f.write_str(name)
    }
}

const COMPONENT_SCRIPT_EXTENSIONS: &[&str] = &["jsx", "tsx"];
const PLAIN_SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs"];
const STYLESHEET_EXTENSIONS: &[&str] = &["css"];
const HTML_EXTENSIONS: &[&str] = &["html", "htm"];

/// Everything the selection depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShimInput {
    pub extension: String,
    pub origin: FileOrigin,
    pub has_html_entry: bool,
}

impl ShimInput {
    /// `preview_tree` is the tree the preview resolves against, if any
    pub fn new(file: &FileNode, preview_tree: Option<&VirtualFilesystem>) -> Self {
        Self {
            extension: file.extension(),
            origin: file.origin,
            has_html_entry: preview_tree.is_some_and(has_html_file),
        }
    }
}

pub fn is_html_name(name: &str) -> bool {
    HTML_EXTENSIONS.contains(&crate::virtual_fs::extension_of(name).as_str())
}

fn has_html_file(tree: &VirtualFilesystem) -> bool {
    tree.files().iter().any(|f| is_html_name(&f.name))
}

/// Decision table, first match wins
pub fn select(input: &ShimInput) -> ShimKind {
    let ext = input.extension.as_str();
    match input.origin.dialect() {
        Some(Dialect::ReactLike) if COMPONENT_SCRIPT_EXTENSIONS.contains(&ext) => {
            return ShimKind::ComponentFrameworkA;
        }
        Some(Dialect::VueLike) if PLAIN_SCRIPT_EXTENSIONS.contains(&ext) => {
            return ShimKind::ComponentFrameworkB;
        }
        _ => {}
    }

    if input.has_html_entry || HTML_EXTENSIONS.contains(&ext) {
        ShimKind::PlainHtml
    } else if STYLESHEET_EXTENSIONS.contains(&ext) {
        ShimKind::PlainCss
    } else {
        ShimKind::PlainScript
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(ext: &str, dialect: Option<Dialect>, lesson: bool, entry: bool) -> ShimInput {
        ShimInput {
            extension: ext.to_string(),
            origin: if lesson {
                FileOrigin::Lesson { dialect }
            } else {
                FileOrigin::User
            },
            has_html_entry: entry,
        }
    }

    #[test]
    fn decision_table() {
        let cases = [
            (input("jsx", Some(Dialect::ReactLike), true, true), ShimKind::ComponentFrameworkA),
            (input("tsx", Some(Dialect::ReactLike), true, false), ShimKind::ComponentFrameworkA),
            (input("js", Some(Dialect::VueLike), true, true), ShimKind::ComponentFrameworkB),
            // dialect with the wrong extension falls through
            (input("js", Some(Dialect::ReactLike), true, false), ShimKind::PlainScript),
            (input("jsx", Some(Dialect::VueLike), true, false), ShimKind::PlainScript),
            (input("css", None, false, true), ShimKind::PlainHtml),
            (input("html", None, true, false), ShimKind::PlainHtml),
            (input("css", None, true, false), ShimKind::PlainCss),
            (input("ts", None, false, false), ShimKind::PlainScript),
            (input("", None, false, false), ShimKind::PlainScript),
        ];
        for (case, expected) in cases {
            assert_eq!(select(&case), expected, "{:?}", case);
        }
    }

    #[test]
    fn user_files_never_get_component_shims() {
        // a user file cannot carry a dialect
        let file = FileNode::new("App.jsx", "");
        assert_eq!(select(&ShimInput::new(&file, None)), ShimKind::PlainScript);
    }

    #[test]
    fn html_entry_is_detected_in_the_preview_tree() {
        let tree = VirtualFilesystem::from_nodes(vec![FileNode::new("INDEX.HTM", "").into()]);
        let css = FileNode::new("style.css", "");
        assert!(ShimInput::new(&css, Some(&tree)).has_html_entry);
        assert!(!ShimInput::new(&css, None).has_html_entry);
    }

    #[test]
    fn selection_is_stable() {
        let case = input("css", None, false, false);
        assert_eq!(select(&case), select(&case.clone()));
    }
}
